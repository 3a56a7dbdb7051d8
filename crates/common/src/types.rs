//! The inbound message model threaded through the dispatch pipeline.
//!
//! Handlers receive this struct explicitly; there is no ambient
//! "current request" state anywhere in the workspace.

use serde::{Deserialize, Serialize};

/// What the user sent, as far as routing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    /// Tap on an interactive button.
    ButtonReply,
    /// Selection from an interactive list.
    ListReply,
    /// Image, audio, video, document or sticker.
    Media,
    Location,
    Unknown,
}

/// One inbound user message, already validated and flattened out of the
/// provider's webhook envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Stable end-user identifier (the provider's `wa_id`).
    pub user_id: String,
    /// Provider message id; `(user_id, message_id)` is the idempotency key.
    pub message_id: String,
    /// Computed textual input. Empty for media-only messages.
    pub text: String,
    pub kind: MessageKind,
    pub sender_name: Option<String>,
    /// Provider send time, epoch seconds.
    pub timestamp: Option<i64>,
}

impl InboundMessage {
    /// Dedup key for the execution facility.
    pub fn job_key(&self) -> String {
        format!("wh:{}:{}", self.user_id, self.message_id)
    }
}
