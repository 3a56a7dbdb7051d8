//! Scoped session handles and the store they hang off.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    serde::{Serialize, de::DeserializeOwned},
    serde_json::Value,
};

use confab_store::KvStore;

use crate::{GLOBAL_SCOPE, KEY_PREFIX, Result};

/// TTL policy for the two scopes.
///
/// User state is conversational and short; global state is shared
/// reference data and lives longer.
#[derive(Debug, Clone, Copy)]
pub struct SessionTtl {
    pub user: Duration,
    pub global: Duration,
}

impl Default for SessionTtl {
    fn default() -> Self {
        Self {
            user: Duration::from_secs(600),
            global: Duration::from_secs(1800),
        }
    }
}

/// Factory for scoped session handles over one shared [`KvStore`].
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KvStore>,
    ttl: SessionTtl,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KvStore>, ttl: SessionTtl) -> Self {
        Self { store, ttl }
    }

    /// Handle on one user's namespace.
    pub fn session(&self, user_id: &str) -> ScopedSession {
        ScopedSession {
            store: Arc::clone(&self.store),
            scope: user_id.to_string(),
            ttl: self.ttl.user,
        }
    }

    /// Handle on the single shared namespace.
    pub fn global(&self) -> ScopedSession {
        ScopedSession {
            store: Arc::clone(&self.store),
            scope: GLOBAL_SCOPE.to_string(),
            ttl: self.ttl.global,
        }
    }
}

/// One scope's keyspace. Cheap to clone; every write refreshes the key's
/// TTL to the scope default.
///
/// Not transactional across keys: writers on different keys never
/// conflict, writers on the same key race last-write-wins.
#[derive(Clone)]
pub struct ScopedSession {
    store: Arc<dyn KvStore>,
    scope: String,
    ttl: Duration,
}

impl ScopedSession {
    fn prefixed(&self, key: &str) -> String {
        format!("{KEY_PREFIX}:{}:{key}", self.scope)
    }

    fn prefix(&self) -> String {
        format!("{KEY_PREFIX}:{}:", self.scope)
    }

    pub async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.store.set(&self.prefixed(key), &value, self.ttl).await?;
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(&self.prefixed(key)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.get(&self.prefixed(key)).await?.is_some())
    }

    /// Save multiple key-value pairs. Each key is an independent write;
    /// there is no cross-key atomicity.
    pub async fn save_all(&self, entries: &HashMap<String, Value>) -> Result<()> {
        for (key, value) in entries {
            self.store.set(&self.prefixed(key), value, self.ttl).await?;
        }
        Ok(())
    }

    /// Remove a key. Returns whether it existed.
    pub async fn evict(&self, key: &str) -> Result<bool> {
        Ok(self.store.delete(&self.prefixed(key)).await?)
    }

    pub async fn evict_all(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.store.delete(&self.prefixed(key)).await?;
        }
        Ok(())
    }

    /// Drop every key in this scope. Returns how many went.
    pub async fn clear(&self) -> Result<u64> {
        Ok(self.store.delete_prefix(&self.prefix()).await?)
    }

    /// Drop every key in this scope whose name is not in `retain`.
    pub async fn clear_retaining(&self, retain: &[&str]) -> Result<u64> {
        let prefix = self.prefix();
        let mut evicted = 0;
        for full_key in self.store.keys(&prefix).await? {
            let name = &full_key[prefix.len()..];
            if !retain.contains(&name) && self.store.delete(&full_key).await? {
                evicted += 1;
            }
        }
        Ok(evicted)
    }
}
