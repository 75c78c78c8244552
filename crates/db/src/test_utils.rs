//! Test utilities for database operations.
//!
//! Provides a migrated in-memory SQLite database for integration tests.

use std::sync::Arc;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::debug;

/// Connect to a fresh in-memory SQLite database and run all migrations.
///
/// The pool is pinned to a single connection so every query sees the same
/// in-memory database.
pub async fn memory_database() -> Result<Arc<DatabaseConnection>, DbErr> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    db.execute_unprepared("PRAGMA foreign_keys = ON").await?;

    crate::migrate(&db)
        .await
        .map_err(|e| DbErr::Migration(e.to_string()))?;
    debug!("in-memory test database ready");

    Ok(Arc::new(db))
}
