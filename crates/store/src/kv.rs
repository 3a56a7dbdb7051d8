//! The TTL key-value contract.

use std::time::Duration;

use {async_trait::async_trait, serde_json::Value};

use crate::Result;

/// A shared, process-external key-value store with per-key expiry.
///
/// No ordering or atomicity guarantees across keys; each individual
/// operation is atomic. Implementations must be safe to share between
/// worker processes, not just tasks — the lock manager is built on
/// [`set_if_absent`](KvStore::set_if_absent) /
/// [`delete_if_value`](KvStore::delete_if_value) and depends on it.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Upsert `key` with a fresh TTL.
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()>;

    /// Read a key. Absent and expired keys both come back as `None`;
    /// a store failure is an error, never `None`.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Remove a key. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every key starting with `prefix`. Returns how many went.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    /// List the live keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Atomic claim: write only if no live entry exists under `key`.
    ///
    /// The building block for leases and idempotency keys. An expired
    /// entry counts as absent and is overwritten.
    async fn set_if_absent(&self, key: &str, value: &Value, ttl: Duration) -> Result<bool>;

    /// Compare-and-delete: remove `key` only while its stored value still
    /// equals `value`. Lets a lock holder release without ever clobbering
    /// a lease that expired and was re-acquired by someone else.
    async fn delete_if_value(&self, key: &str, value: &Value) -> Result<bool>;

    /// Physically drop expired rows. Reads already filter on expiry, so
    /// this is housekeeping; returns the number of rows removed.
    async fn purge_expired(&self) -> Result<u64>;
}
