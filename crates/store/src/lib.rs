//! Shared TTL key-value store.
//!
//! Every piece of short-lived state in the workspace — session keys, user
//! locks, webhook dedup claims — lives behind the [`KvStore`] trait. The
//! production backend is SQLite, where each primitive is a single atomic
//! statement, so the store is safe for concurrent access from arbitrarily
//! many worker processes.

pub mod error;
pub mod kv;
pub mod memory;
pub mod sqlite;

pub use {
    error::{Error, Result},
    kv::KvStore,
    memory::MemoryKv,
    sqlite::SqliteKv,
};

/// Run database migrations for the store crate.
///
/// Creates the `kv_entries` table. Call at application startup before
/// handing the pool to [`SqliteKv::with_pool`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
