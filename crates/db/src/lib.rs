//! Persistence and reconciliation of data annotations.
//!
//! Classification values and object annotations are stored in two
//! independent tables. [`coordinator::AnnotationCoordinator`] saves both in
//! one unit of work and joins them back per data record on read.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod models;
pub mod object_store;
pub mod postgres;
pub mod reconciler;
pub mod repositories;
pub mod store;

pub use config::DbConfig;
pub use coordinator::AnnotationCoordinator;
pub use error::{StoreError, StoreResult};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from the loaded configuration.
pub async fn create_pool(config: &DbConfig) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.database_url)
        .await
}

/// Verify the pool can reach the database.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
