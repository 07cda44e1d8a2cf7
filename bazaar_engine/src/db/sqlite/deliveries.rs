use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{DeliveryEvent, NewDeliveryEvent, OrderId},
    traits::MarketplaceError,
};

pub async fn insert_event(
    order_id: &OrderId,
    event: NewDeliveryEvent,
    conn: &mut SqliteConnection,
) -> Result<DeliveryEvent, MarketplaceError> {
    let record = sqlx::query_as(
        r#"
            INSERT INTO delivery_events (order_id, courier_id, status, actor, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(event.courier_id)
    .bind(event.status)
    .bind(event.actor)
    .bind(event.note)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(record)
}

pub async fn fetch_events(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<DeliveryEvent>, MarketplaceError> {
    let records = sqlx::query_as("SELECT * FROM delivery_events WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(records)
}
