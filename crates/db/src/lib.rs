//! Persistence layer: sqlx/PostgreSQL models and repositories.
//!
//! Repositories are stateless structs taking `&PgPool`; multi-step
//! writes own their transaction so a failure on any step rolls the
//! whole aggregate back.

pub mod models;
pub mod pg;
pub mod repositories;

/// Shared connection pool handle.
pub type DbPool = sqlx::PgPool;

/// Embedded schema migrations (`db/migrations` at the workspace root).
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../db/migrations");

/// Open a pool against the given database URL.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
