//! SQLite-backed ticket repository using sqlx.

use {
    async_trait::async_trait,
    sqlx::SqlitePool,
    uuid::Uuid,
};

use crate::{
    Result, now_ms,
    ticket::{SupportTicket, TicketNote, TicketRepository, TicketStatus},
};

pub struct SqliteTicketRepo {
    pool: SqlitePool,
}

impl SqliteTicketRepo {
    /// Wrap an existing pool. Run [`crate::run_migrations`] first.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    ticket_ref: String,
    user_id: String,
    status: String,
    assigned_agent: Option<String>,
    opened_at_ms: i64,
    closed_at_ms: Option<i64>,
}

impl From<TicketRow> for SupportTicket {
    fn from(r: TicketRow) -> Self {
        Self {
            ticket_ref: r.ticket_ref,
            user_id: r.user_id,
            status: TicketStatus::parse(&r.status).unwrap_or(TicketStatus::Closed),
            assigned_agent: r.assigned_agent,
            opened_at_ms: r.opened_at_ms,
            closed_at_ms: r.closed_at_ms,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NoteRow {
    ticket_ref: String,
    author: String,
    body: String,
    created_at_ms: i64,
}

impl From<NoteRow> for TicketNote {
    fn from(r: NoteRow) -> Self {
        Self {
            ticket_ref: r.ticket_ref,
            author: r.author,
            body: r.body,
            created_at_ms: r.created_at_ms,
        }
    }
}

const TICKET_COLUMNS: &str =
    "ticket_ref, user_id, status, assigned_agent, opened_at_ms, closed_at_ms";

#[async_trait]
impl TicketRepository for SqliteTicketRepo {
    async fn create(&self, user_id: &str) -> Result<SupportTicket> {
        let ticket = SupportTicket {
            ticket_ref: format!("TCK-{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            status: TicketStatus::Open,
            assigned_agent: None,
            opened_at_ms: now_ms(),
            closed_at_ms: None,
        };
        sqlx::query(
            "INSERT INTO support_tickets (ticket_ref, user_id, status, opened_at_ms)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&ticket.ticket_ref)
        .bind(&ticket.user_id)
        .bind(ticket.status.as_str())
        .bind(ticket.opened_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn get(&self, ticket_ref: &str) -> Result<Option<SupportTicket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets WHERE ticket_ref = ?"
        ))
        .bind(ticket_ref)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_open_by_user(&self, user_id: &str) -> Result<Option<SupportTicket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {TICKET_COLUMNS} FROM support_tickets
             WHERE user_id = ? AND status = 'open'
             ORDER BY opened_at_ms DESC"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn assign(&self, ticket_ref: &str, agent: &str) -> Result<()> {
        sqlx::query("UPDATE support_tickets SET assigned_agent = ? WHERE ticket_ref = ?")
            .bind(agent)
            .bind(ticket_ref)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self, ticket_ref: &str, status: TicketStatus) -> Result<()> {
        sqlx::query(
            "UPDATE support_tickets SET status = ?, closed_at_ms = ?
             WHERE ticket_ref = ? AND status = 'open'",
        )
        .bind(status.as_str())
        .bind(now_ms())
        .bind(ticket_ref)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn append_note(&self, note: &TicketNote) -> Result<()> {
        sqlx::query(
            "INSERT INTO ticket_notes (ticket_ref, author, body, created_at_ms)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&note.ticket_ref)
        .bind(&note.author)
        .bind(&note.body)
        .bind(note.created_at_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn notes(&self, ticket_ref: &str, limit: usize) -> Result<Vec<TicketNote>> {
        let rows = sqlx::query_as::<_, NoteRow>(
            "SELECT ticket_ref, author, body, created_at_ms FROM ticket_notes
             WHERE ticket_ref = ?
             ORDER BY created_at_ms DESC, id DESC
             LIMIT ?",
        )
        .bind(ticket_ref)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
