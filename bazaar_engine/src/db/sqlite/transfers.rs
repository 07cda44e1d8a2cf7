use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewVendorTransfer, OrderId, TransferStatus, VendorTransfer},
    traits::{MarketplaceError, TransferResult},
};

/// Writes a payout ledger entry. The (payment reference, vendor) pair is unique, so a settlement can never create two
/// entries for the same vendor.
pub async fn insert_transfer(
    order_id: &OrderId,
    payment_reference: &str,
    currency: &str,
    transfer: NewVendorTransfer,
    conn: &mut SqliteConnection,
) -> Result<VendorTransfer, MarketplaceError> {
    let record = sqlx::query_as(
        r#"
            INSERT INTO vendor_transfers (
                order_id, payment_reference, vendor_id, amount, currency, status, last_error, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(payment_reference)
    .bind(transfer.vendor_id)
    .bind(transfer.amount)
    .bind(currency)
    .bind(transfer.status)
    .bind(transfer.last_error)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(record)
}

pub async fn fetch_transfer(id: i64, conn: &mut SqliteConnection) -> Result<Option<VendorTransfer>, MarketplaceError> {
    let record = sqlx::query_as("SELECT * FROM vendor_transfers WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(record)
}

pub async fn fetch_transfers_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<VendorTransfer>, MarketplaceError> {
    let records = sqlx::query_as("SELECT * FROM vendor_transfers WHERE order_id = $1 ORDER BY vendor_id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(records)
}

pub async fn fetch_transfers_with_status(
    status: TransferStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<VendorTransfer>, MarketplaceError> {
    let records = sqlx::query_as("SELECT * FROM vendor_transfers WHERE status = $1 ORDER BY created_at ASC, id ASC")
        .bind(status)
        .fetch_all(conn)
        .await?;
    Ok(records)
}

/// Records a payout attempt. A transfer that has already been sent is never modified.
pub async fn record_result(
    id: i64,
    result: TransferResult,
    conn: &mut SqliteConnection,
) -> Result<Option<VendorTransfer>, MarketplaceError> {
    let (status, transfer_id, error) = match result {
        TransferResult::Sent(transfer_id) => (TransferStatus::Sent, Some(transfer_id), None),
        TransferResult::Failed(reason) => (TransferStatus::Failed, None, Some(reason)),
    };
    let record = sqlx::query_as(
        r#"
            UPDATE vendor_transfers SET
                status = $1,
                processor_transfer_id = $2,
                last_error = $3,
                attempts = attempts + 1,
                updated_at = $4
            WHERE id = $5 AND status != $6
            RETURNING *
        "#,
    )
    .bind(status)
    .bind(transfer_id)
    .bind(error)
    .bind(Utc::now())
    .bind(id)
    .bind(TransferStatus::Sent)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(record)
}
