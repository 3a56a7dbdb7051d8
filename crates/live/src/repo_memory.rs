//! In-memory ticket repository for testing.

use std::{collections::HashMap, sync::Mutex};

use {async_trait::async_trait, uuid::Uuid};

use crate::{
    Result, now_ms,
    ticket::{SupportTicket, TicketNote, TicketRepository, TicketStatus},
};

/// `HashMap`-backed repository. No persistence — for tests only.
#[derive(Default)]
pub struct MemoryTicketRepo {
    tickets: Mutex<HashMap<String, SupportTicket>>,
    notes: Mutex<Vec<TicketNote>>,
}

impl MemoryTicketRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TicketRepository for MemoryTicketRepo {
    async fn create(&self, user_id: &str) -> Result<SupportTicket> {
        let ticket = SupportTicket {
            ticket_ref: format!("TCK-{}", Uuid::new_v4()),
            user_id: user_id.to_string(),
            status: TicketStatus::Open,
            assigned_agent: None,
            opened_at_ms: now_ms(),
            closed_at_ms: None,
        };
        let mut tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        tickets.insert(ticket.ticket_ref.clone(), ticket.clone());
        Ok(ticket)
    }

    async fn get(&self, ticket_ref: &str) -> Result<Option<SupportTicket>> {
        let tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tickets.get(ticket_ref).cloned())
    }

    async fn find_open_by_user(&self, user_id: &str) -> Result<Option<SupportTicket>> {
        let tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tickets
            .values()
            .find(|t| t.user_id == user_id && t.status.is_open())
            .cloned())
    }

    async fn assign(&self, ticket_ref: &str, agent: &str) -> Result<()> {
        let mut tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ticket) = tickets.get_mut(ticket_ref) {
            ticket.assigned_agent = Some(agent.to_string());
        }
        Ok(())
    }

    async fn close(&self, ticket_ref: &str, status: TicketStatus) -> Result<()> {
        let mut tickets = self.tickets.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ticket) = tickets.get_mut(ticket_ref)
            && ticket.status.is_open()
        {
            ticket.status = status;
            ticket.closed_at_ms = Some(now_ms());
        }
        Ok(())
    }

    async fn append_note(&self, note: &TicketNote) -> Result<()> {
        let mut notes = self.notes.lock().unwrap_or_else(|e| e.into_inner());
        notes.push(note.clone());
        Ok(())
    }

    async fn notes(&self, ticket_ref: &str, limit: usize) -> Result<Vec<TicketNote>> {
        let notes = self.notes.lock().unwrap_or_else(|e| e.into_inner());
        Ok(notes
            .iter()
            .filter(|n| n.ticket_ref == ticket_ref)
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}
