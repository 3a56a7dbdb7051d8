//! The per-user live-mode record.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
};

/// Session key the record lives under.
pub const LIVE_MODE_KEY: &str = "live_mode";

/// An absent record and `is_active == false` both read as bot handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveState {
    pub is_active: bool,
    /// The open support ticket carrying this conversation.
    pub ticket_ref: String,
    pub started_at_ms: i64,
    /// Arbitrary context recorded at handover (source, reason, ...).
    #[serde(default)]
    pub context: Map<String, Value>,
}
