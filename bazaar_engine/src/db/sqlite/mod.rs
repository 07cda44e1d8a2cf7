pub mod db;

pub mod carts;
pub mod couriers;
pub mod deliveries;
pub mod orders;
pub mod payments;
pub mod products;
pub mod transfers;
pub mod vendors;

use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};

use crate::traits::MarketplaceError;

const SQLITE_DB_URL: &str = "sqlite://data/bazaar.db";

pub fn db_url() -> String {
    let result = env::var("BZR_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ BZR_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

/// Builds the connection pool.
///
/// Queries with a `RETURNING` clause must be read with `fetch_all`. A statement that is not stepped to completion keeps
/// its write lock after the connection goes back to the pool, and every other writer then sees `database is locked`.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, MarketplaceError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
