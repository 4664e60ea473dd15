pub mod form_queue;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::QueueError;

/// Open the queue database and create the queue table on first use.
///
/// Safe to call against an existing database. An in-memory URL keeps a single
/// connection alive for the life of the pool so its contents are not lost.
pub async fn open(database_url: &str) -> Result<SqlitePool, QueueError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| QueueError::StorageUnavailable(format!("Invalid database URL: {e}")))?
        .create_if_missing(true);

    let pool_options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| QueueError::StorageUnavailable(format!("Failed to open queue database: {e}")))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| QueueError::StorageUnavailable(format!("Failed to run migrations: {e}")))?;

    Ok(pool)
}
