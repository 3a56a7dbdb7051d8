//! Conversation ticket entity and its typed repository.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
    Resolved,
}

impl TicketStatus {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// One human-operator conversation with one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportTicket {
    pub ticket_ref: String,
    pub user_id: String,
    pub status: TicketStatus,
    pub assigned_agent: Option<String>,
    pub opened_at_ms: i64,
    pub closed_at_ms: Option<i64>,
}

/// An entry in a ticket's conversation log: forwarded user messages,
/// operator replies, and audit markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketNote {
    pub ticket_ref: String,
    pub author: String,
    pub body: String,
    pub created_at_ms: i64,
}

/// Persistence for tickets. Exactly the operations the live-mode path
/// needs — no generic document access.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Open a fresh ticket for `user_id`.
    async fn create(&self, user_id: &str) -> Result<SupportTicket>;

    async fn get(&self, ticket_ref: &str) -> Result<Option<SupportTicket>>;

    /// The user's open ticket, if any. At most one per user by
    /// construction: `start` never creates a second one.
    async fn find_open_by_user(&self, user_id: &str) -> Result<Option<SupportTicket>>;

    async fn assign(&self, ticket_ref: &str, agent: &str) -> Result<()>;

    /// Move an open ticket to `Closed` or `Resolved`.
    async fn close(&self, ticket_ref: &str, status: TicketStatus) -> Result<()>;

    async fn append_note(&self, note: &TicketNote) -> Result<()>;

    /// Most recent notes first.
    async fn notes(&self, ticket_ref: &str, limit: usize) -> Result<Vec<TicketNote>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [TicketStatus::Open, TicketStatus::Closed, TicketStatus::Resolved] {
            assert_eq!(TicketStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TicketStatus::parse("bogus"), None);
    }
}
