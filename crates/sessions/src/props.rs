//! Read-modify-write helpers over the single `props` session key.
//!
//! The whole map is fetched, mutated, and saved back, so two concurrent
//! property writers can lose an update. Writers triggered from one user's
//! webhook stream are serialized by the per-user lock; writers outside
//! that stream (an administrative edit during a webhook) are not covered.

use {
    serde::{Serialize, de::DeserializeOwned},
    serde_json::{Map, Value},
};

use crate::{PROPS_KEY, Result, scope::ScopedSession};

impl ScopedSession {
    /// The full properties map. Absent reads as empty.
    pub async fn props(&self) -> Result<Map<String, Value>> {
        Ok(self.get::<Map<String, Value>>(PROPS_KEY).await?.unwrap_or_default())
    }

    pub async fn get_prop<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let props = self.props().await?;
        match props.get(name) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub async fn save_prop<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let mut props = self.props().await?;
        props.insert(name.to_string(), serde_json::to_value(value)?);
        self.save(PROPS_KEY, &props).await
    }

    /// Remove one property. Returns false when it was not set; the rest of
    /// the map is untouched either way.
    pub async fn evict_prop(&self, name: &str) -> Result<bool> {
        let mut props = self.props().await?;
        if props.remove(name).is_none() {
            return Ok(false);
        }
        self.save(PROPS_KEY, &props).await?;
        Ok(true)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use confab_store::MemoryKv;

    use {
        super::*,
        crate::scope::{SessionStore, SessionTtl},
    };

    fn user_session() -> ScopedSession {
        SessionStore::new(Arc::new(MemoryKv::new()), SessionTtl::default()).session("u1")
    }

    #[tokio::test]
    async fn save_and_read_back_a_prop() {
        let user = user_session();
        user.save_prop("language", &"en").await.unwrap();
        assert_eq!(
            user.get_prop::<String>("language").await.unwrap().as_deref(),
            Some("en")
        );
    }

    #[tokio::test]
    async fn missing_prop_reads_as_none() {
        let user = user_session();
        assert!(user.get_prop::<String>("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn evict_prop_false_when_absent() {
        let user = user_session();
        assert!(!user.evict_prop("nope").await.unwrap());
    }

    #[tokio::test]
    async fn evict_prop_removes_only_its_target() {
        let user = user_session();
        user.save_prop("a", &1).await.unwrap();
        user.save_prop("b", &2).await.unwrap();

        assert!(user.evict_prop("a").await.unwrap());
        assert!(user.get_prop::<i64>("a").await.unwrap().is_none());
        // Unaffected properties survive.
        assert_eq!(user.get_prop::<i64>("b").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn props_live_under_one_session_key() {
        let user = user_session();
        user.save_prop("a", &1).await.unwrap();

        let raw = user.props().await.unwrap();
        assert_eq!(raw.len(), 1);
        assert!(user.exists(PROPS_KEY).await.unwrap());
    }
}
