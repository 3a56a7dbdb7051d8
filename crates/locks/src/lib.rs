//! Per-user mutual exclusion with bounded wait and bounded lease.
//!
//! Locks live in the shared TTL store, not in process memory, so mutual
//! exclusion holds across worker processes. Each acquisition writes a
//! fencing token under `confab:lock:<user_id>` with the lease as TTL;
//! release is a compare-and-delete on that token. A holder that crashes
//! simply lets the lease expire, after which the key is reclaimable.
//!
//! This is what turns "possibly-concurrent, possibly-reordered background
//! job execution" into "at most one in-flight processing step per user".

pub mod error;

pub use error::{Error, Result};

use std::{sync::Arc, time::Duration};

use {
    serde_json::Value,
    tokio::time::{Instant, sleep},
    tracing::debug,
    uuid::Uuid,
};

use confab_store::KvStore;

const LOCK_PREFIX: &str = "confab:lock:";
const DEFAULT_POLL: Duration = Duration::from_millis(50);

/// Outcome of an acquisition attempt.
#[derive(Debug)]
pub enum Acquire {
    /// Exclusive ownership until release or lease expiry.
    Acquired(UserLock),
    /// Another holder survived the whole wait window. Per the backpressure
    /// policy the caller must drop its work, not queue it.
    TimedOut,
}

impl Acquire {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }
}

/// Hands out per-user leases backed by the shared store.
pub struct UserLockManager {
    store: Arc<dyn KvStore>,
    poll: Duration,
}

impl UserLockManager {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_poll_interval(store, DEFAULT_POLL)
    }

    pub fn with_poll_interval(store: Arc<dyn KvStore>, poll: Duration) -> Self {
        Self { store, poll }
    }

    /// Block up to `wait` trying to become the exclusive holder for
    /// `user_id`. The lease auto-expires after `lease` even if the lock is
    /// never released.
    ///
    /// Always makes at least one attempt, so `wait == 0` is a try-lock.
    pub async fn acquire(&self, user_id: &str, lease: Duration, wait: Duration) -> Result<Acquire> {
        let key = format!("{LOCK_PREFIX}{user_id}");
        let token = Value::from(Uuid::new_v4().to_string());
        let deadline = Instant::now() + wait;

        loop {
            if self.store.set_if_absent(&key, &token, lease).await? {
                debug!(user_id, "user lock acquired");
                return Ok(Acquire::Acquired(UserLock {
                    store: Arc::clone(&self.store),
                    key,
                    token,
                }));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Acquire::TimedOut);
            }
            sleep(self.poll.min(remaining)).await;
        }
    }
}

/// A held lease.
///
/// Dropping the guard without calling [`release`](UserLock::release) is
/// safe: the lease expires on its own. Because release compares the
/// fencing token, releasing after the lease expired (and possibly after
/// another worker re-acquired the key) is a no-op.
pub struct UserLock {
    store: Arc<dyn KvStore>,
    key: String,
    token: Value,
}

impl std::fmt::Debug for UserLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserLock")
            .field("key", &self.key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl UserLock {
    /// Give the lock up. Returns false when the lease had already expired
    /// or was otherwise gone — double release is a no-op.
    pub async fn release(self) -> Result<bool> {
        let released = self.store.delete_if_value(&self.key, &self.token).await?;
        if !released {
            debug!(key = %self.key, "release found no matching lease");
        }
        Ok(released)
    }
}
