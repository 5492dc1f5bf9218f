//! Persistence layer for the Imprint render service.
//!
//! - [`models`] -- `FromRow` row types and DTOs.
//! - [`repositories`] -- zero-sized repos with async SQL methods on `&PgPool`.
//! - [`store`] -- the traits the API layer depends on, implemented by
//!   [`store::PgStore`] and the in-process [`memory::MemoryStore`].

use sqlx::postgres::PgPoolOptions;

pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use memory::MemoryStore;
pub use store::{PgStore, Store};

pub type DbPool = sqlx::PgPool;

/// Maximum number of pooled connections.
const MAX_CONNECTIONS: u32 = 20;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Apply the embedded migrations in `./migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
