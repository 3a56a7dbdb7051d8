//! Typed configuration schema.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfabConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub whatsapp: WhatsAppConfig,
    pub session: SessionConfig,
    pub lock: LockConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8378,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL. The database is the shared TTL store and the ticket
    /// repository, so every worker process must point at the same file.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://confab.db?mode=rwc".into(),
        }
    }
}

/// Cloud API credentials. Typically filled from the environment via
/// `${VAR}` placeholders in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Token echoed back during webhook subscription (GET handshake).
    pub verify_token: String,
    /// Shared secret keying the `X-Hub-Signature-256` HMAC.
    pub app_secret: String,
    /// Bearer token for outbound Cloud API calls.
    pub access_token: String,
    pub phone_number_id: String,
    pub api_base: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            verify_token: String::new(),
            app_secret: String::new(),
            access_token: String::new(),
            phone_number_id: String::new(),
            api_base: "https://graph.facebook.com/v21.0".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub user_ttl_secs: u64,
    pub global_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_ttl_secs: 600,
            global_ttl_secs: 1800,
        }
    }
}

impl SessionConfig {
    pub fn user_ttl(&self) -> Duration {
        Duration::from_secs(self.user_ttl_secs)
    }

    pub fn global_ttl(&self) -> Duration {
        Duration::from_secs(self.global_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Auto-release safety net if a holder crashes mid-job.
    pub lease_secs: u64,
    /// How long a second message waits for the first to finish before
    /// being dropped.
    pub wait_secs: u64,
    pub poll_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_secs: 30,
            wait_secs: 5,
            poll_ms: 50,
        }
    }
}

impl LockConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}

/// Where webhook jobs execute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Spawn the job and ack the provider immediately.
    #[default]
    Background,
    /// Await the job in-request. For tests and single-user deployments.
    Inline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub mode: DispatchMode,
    /// How long a `(user_id, message_id)` claim shields against provider
    /// redelivery.
    pub dedup_ttl_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            dedup_ttl_secs: 3600,
        }
    }
}

impl DispatchConfig {
    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }
}
