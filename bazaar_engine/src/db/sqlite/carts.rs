use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CartLine, OwnerKey},
    traits::MarketplaceError,
};

pub async fn set_line(
    owner: &OwnerKey,
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    if quantity <= 0 {
        sqlx::query("DELETE FROM cart_lines WHERE owner_key = $1 AND product_id = $2")
            .bind(owner)
            .bind(product_id)
            .execute(conn)
            .await?;
        return Ok(());
    }
    sqlx::query(
        r#"
            INSERT INTO cart_lines (owner_key, product_id, quantity, updated_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (owner_key, product_id) DO UPDATE SET quantity = excluded.quantity, updated_at = excluded.updated_at
        "#,
    )
    .bind(owner)
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_cart(owner: &OwnerKey, conn: &mut SqliteConnection) -> Result<Vec<CartLine>, MarketplaceError> {
    let lines = sqlx::query_as("SELECT * FROM cart_lines WHERE owner_key = $1 ORDER BY product_id")
        .bind(owner)
        .fetch_all(conn)
        .await?;
    Ok(lines)
}

pub async fn clear_cart(owner: &OwnerKey, conn: &mut SqliteConnection) -> Result<u64, MarketplaceError> {
    let result = sqlx::query("DELETE FROM cart_lines WHERE owner_key = $1").bind(owner).execute(conn).await?;
    Ok(result.rows_affected())
}
