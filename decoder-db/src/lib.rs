//! Persistence layer of the decoder service.
//!
//! Entities are content addressed where it matters (`abi.abi_hash`) and all
//! writes are idempotent `get_or_create` operations, so callers never need
//! cross-entity transactions. Large result sets are exposed as streams over
//! server-side cursors.

#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]

use sqlx::postgres::{PgPool, PgPoolOptions};

pub mod models;

pub use models::{Abi, AbiSource, Contract, ContractQuery, Project};
pub use sqlx::Error as DbError;

/// Connect a pool to the given database.
pub async fn connect(database_url: &str, pool_size: u32) -> sqlx::Result<PgPool> {
    PgPoolOptions::new().max_connections(pool_size).connect(database_url).await
}

/// Apply pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
