use chrono::Utc;
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewProduct, Product, ProductUpdate},
    traits::MarketplaceError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, MarketplaceError> {
    let now = Utc::now();
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (vendor_id, name, price, quantity_available, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(product.vendor_id)
    .bind(product.name)
    .bind(product.price)
    .bind(product.quantity_available)
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, MarketplaceError> {
    let product =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn update_product(
    product_id: i64,
    update: ProductUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, MarketplaceError> {
    let mut builder = QueryBuilder::new("UPDATE products SET updated_at = ");
    builder.push_bind(Utc::now());
    if let Some(name) = update.name {
        builder.push(", name = ");
        builder.push_bind(name);
    }
    if let Some(price) = update.price {
        builder.push(", price = ");
        builder.push_bind(price);
    }
    if let Some(quantity) = update.quantity_available {
        builder.push(", quantity_available = ");
        builder.push_bind(quantity);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(product_id);
    builder.push(" RETURNING *");
    trace!("🗃️ Executing query: {}", builder.sql());
    let product = builder.build_query_as::<Product>().fetch_all(conn).await?.into_iter().next();
    Ok(product)
}

/// Removes `quantity` units from the product's available stock, but only if that many units remain.
///
/// Returns false, leaving the row untouched, if there is not enough stock.
pub async fn reserve_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, MarketplaceError> {
    let result = sqlx::query(
        r#"
            UPDATE products SET quantity_available = quantity_available - $1, updated_at = $2
            WHERE id = $3 AND quantity_available >= $1
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Returns `quantity` units to the product's available stock.
pub async fn release_stock(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), MarketplaceError> {
    sqlx::query("UPDATE products SET quantity_available = quantity_available + $1, updated_at = $2 WHERE id = $3")
        .bind(quantity)
        .bind(Utc::now())
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(())
}
