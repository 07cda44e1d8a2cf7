use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{PayoutStatus, Vendor},
    traits::MarketplaceError,
};

pub async fn insert_vendor(name: &str, conn: &mut SqliteConnection) -> Result<Vendor, MarketplaceError> {
    let now = Utc::now();
    let vendor = sqlx::query_as(
        "INSERT INTO vendors (name, payout_status, created_at, updated_at) VALUES ($1, $2, $3, $3) RETURNING *",
    )
    .bind(name)
    .bind(PayoutStatus::NotConnected)
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(vendor)
}

pub async fn fetch_vendor(vendor_id: i64, conn: &mut SqliteConnection) -> Result<Option<Vendor>, MarketplaceError> {
    let vendor = sqlx::query_as("SELECT * FROM vendors WHERE id = $1").bind(vendor_id).fetch_optional(conn).await?;
    Ok(vendor)
}

pub async fn update_payout(
    vendor_id: i64,
    payout_account: Option<String>,
    status: PayoutStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Vendor>, MarketplaceError> {
    let vendor = sqlx::query_as(
        "UPDATE vendors SET payout_account = $1, payout_status = $2, updated_at = $3 WHERE id = $4 RETURNING *",
    )
    .bind(payout_account)
    .bind(status)
    .bind(Utc::now())
    .bind(vendor_id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(vendor)
}
