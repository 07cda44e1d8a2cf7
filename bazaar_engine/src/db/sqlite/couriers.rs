use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Courier, CourierAvailability, NewCourier},
    traits::MarketplaceError,
};

pub async fn insert_courier(courier: NewCourier, conn: &mut SqliteConnection) -> Result<Courier, MarketplaceError> {
    let record = sqlx::query_as(
        r#"
            INSERT INTO couriers (name, availability, verified, rating, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(courier.name)
    .bind(courier.availability)
    .bind(courier.verified)
    .bind(courier.rating)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(record)
}

pub async fn fetch_courier(courier_id: i64, conn: &mut SqliteConnection) -> Result<Option<Courier>, MarketplaceError> {
    let record =
        sqlx::query_as("SELECT * FROM couriers WHERE id = $1").bind(courier_id).fetch_optional(conn).await?;
    Ok(record)
}

/// Verified couriers that are online and free to take a job.
pub async fn fetch_available_couriers(conn: &mut SqliteConnection) -> Result<Vec<Courier>, MarketplaceError> {
    let records = sqlx::query_as("SELECT * FROM couriers WHERE availability = $1 AND verified = TRUE")
        .bind(CourierAvailability::Online)
        .fetch_all(conn)
        .await?;
    Ok(records)
}

/// Changes the courier's availability if it is currently `from`. Returns `None` if it was not.
pub async fn update_availability_if(
    courier_id: i64,
    from: CourierAvailability,
    to: CourierAvailability,
    conn: &mut SqliteConnection,
) -> Result<Option<Courier>, MarketplaceError> {
    let record = sqlx::query_as(
        "UPDATE couriers SET availability = $1, updated_at = $2 WHERE id = $3 AND availability = $4 RETURNING *",
    )
    .bind(to)
    .bind(Utc::now())
    .bind(courier_id)
    .bind(from)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(record)
}

/// Marks a busy courier as online again, optionally counting a completed delivery.
pub async fn release_courier(
    courier_id: i64,
    count_delivery: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Courier>, MarketplaceError> {
    let increment = i64::from(count_delivery);
    let record = sqlx::query_as(
        r#"
            UPDATE couriers SET availability = $1, total_deliveries = total_deliveries + $2, updated_at = $3
            WHERE id = $4 AND availability = $5
            RETURNING *
        "#,
    )
    .bind(CourierAvailability::Online)
    .bind(increment)
    .bind(Utc::now())
    .bind(courier_id)
    .bind(CourierAvailability::Busy)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(record)
}
