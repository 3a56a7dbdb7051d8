//! Live mode: handing a user's conversation from the bot to a human
//! operator and back.
//!
//! Per-user state is a session record under the `live_mode` key; the
//! conversation itself is tracked as a support ticket in a typed
//! repository. While live, inbound messages bypass the flow engine and
//! land on the ticket; operator replies go straight back to the user.

pub mod error;
pub mod repo_memory;
pub mod repo_sqlite;
pub mod service;
pub mod state;
pub mod ticket;

pub use {
    error::{Error, Result},
    repo_memory::MemoryTicketRepo,
    repo_sqlite::SqliteTicketRepo,
    service::{ClaimOutcome, LiveInboundHandler, LiveModeService, NoopInboundHandler},
    state::{LIVE_MODE_KEY, LiveState},
    ticket::{SupportTicket, TicketNote, TicketRepository, TicketStatus},
};

/// Run database migrations for the live crate.
///
/// Creates the `support_tickets` and `ticket_notes` tables. Call at
/// application startup when using [`SqliteTicketRepo`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}

pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
