//! Postgres persistence for the back office.
//!
//! - [`repository::Repo`] is the generic data-access layer, parameterized by
//!   an [`entity::Entity`] description of each table.
//! - [`service::CrudService`] wraps a repository with output shaping,
//!   optimistic locking, transactions, and export streaming.
//! - [`models`] holds the row structs and DTOs; [`repositories`] adds the
//!   few table-specific queries the generic layer does not cover.

use sqlx::postgres::PgPoolOptions;

pub mod eager;
pub mod entity;
pub mod error;
pub mod models;
pub mod repositories;
pub mod repository;
pub mod service;
pub mod sql;
pub mod values;

pub type DbPool = sqlx::PgPool;

/// Default pool size when `DB_MAX_CONNECTIONS` is not set.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify the pool can reach the server.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
