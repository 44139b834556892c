//! `SQLite` connection bootstrap.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::{AppError, Result};

use super::schema;

/// Open (creating if needed) the database file and apply the schema.
///
/// # Errors
///
/// Returns `AppError::Db` if the connection or schema application fails.
pub async fn connect(path: impl AsRef<Path>) -> Result<SqlitePool> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|err| AppError::Db(format!("failed to create db dir: {err}")))?;
        }
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    schema::bootstrap_schema(&pool).await?;
    Ok(pool)
}

/// Open an in-memory database for tests and apply the schema.
///
/// # Errors
///
/// Returns `AppError::Db` if the connection or schema application fails.
pub async fn connect_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new().in_memory(true);
    // A single long-lived connection: every new in-memory connection would
    // otherwise start from an empty database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    schema::bootstrap_schema(&pool).await?;
    Ok(pool)
}
