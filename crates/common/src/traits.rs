//! Collaborator seams consumed by the dispatch pipeline.

use async_trait::async_trait;

use crate::types::InboundMessage;

/// The automated conversation engine. External collaborator: confab only
/// decides *whether* a message reaches it, never what it does with one.
#[async_trait]
pub trait FlowEngine: Send + Sync {
    /// Process one inbound message while the user is in bot mode.
    ///
    /// Called under the user's lock, so invocations for one user never
    /// overlap. Errors are caught and logged at the job boundary.
    async fn process_inbound(&self, msg: &InboundMessage) -> anyhow::Result<()>;
}

/// Deliver a message to an end user through the messaging provider.
#[async_trait]
pub trait OutboundSender: Send + Sync {
    async fn send_text(&self, user_id: &str, body: &str) -> anyhow::Result<()>;
}
