use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Money, OrderId, PaymentRecord, SettlementState},
    traits::MarketplaceError,
};

pub async fn insert_payment(
    reference: &str,
    order_id: &OrderId,
    amount: Money,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<PaymentRecord, MarketplaceError> {
    let record = sqlx::query_as(
        r#"
            INSERT INTO payments (reference, order_id, amount, currency, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(order_id)
    .bind(amount)
    .bind(currency)
    .bind(SettlementState::Initiated)
    .bind(Utc::now())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(record)
}

pub async fn fetch_payment(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, MarketplaceError> {
    let record =
        sqlx::query_as("SELECT * FROM payments WHERE reference = $1").bind(reference).fetch_optional(conn).await?;
    Ok(record)
}

/// Moves the payment from `from` to `to`. Returns `None` if the payment was not in the `from` state.
pub async fn update_state_if(
    reference: &str,
    from: SettlementState,
    to: SettlementState,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentRecord>, MarketplaceError> {
    let record = sqlx::query_as(
        "UPDATE payments SET state = $1, updated_at = $2 WHERE reference = $3 AND state = $4 RETURNING *",
    )
    .bind(to)
    .bind(Utc::now())
    .bind(reference)
    .bind(from)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(record)
}
