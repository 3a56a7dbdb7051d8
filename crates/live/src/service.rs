//! Live-mode transitions and the operator-side message flow.

use std::sync::Arc;

use {
    async_trait::async_trait,
    serde_json::{Map, Value},
    tracing::{info, warn},
};

use {
    confab_common::{InboundMessage, OutboundSender},
    confab_sessions::SessionStore,
};

use crate::{
    Error, Result, now_ms,
    state::{LIVE_MODE_KEY, LiveState},
    ticket::{SupportTicket, TicketNote, TicketRepository, TicketStatus},
};

/// Marks an audit entry written by the service itself.
pub const SYSTEM_NOTE_PREFIX: &str = "[system]";
/// Marks a note that was already relayed to the user.
pub const AUTO_REPLY_PREFIX: &str = "[auto-reply]";
/// Marks a forwarded inbound user message.
pub const USER_MESSAGE_PREFIX: &str = "[user]";

const RECONNECT_NOTICE: &str =
    "This support chat has been closed.\n\nYou are now reconnected to the automated assistant.";

/// Strategy hook offered every inbound message while a user is live.
///
/// Lets deployments mirror live traffic somewhere else (a help-desk
/// integration, an operator dashboard) without touching the core path.
#[async_trait]
pub trait LiveInboundHandler: Send + Sync {
    async fn on_inbound(&self, ticket: &SupportTicket, msg: &InboundMessage) -> anyhow::Result<()>;
}

/// Default handler: do nothing.
pub struct NoopInboundHandler;

#[async_trait]
impl LiveInboundHandler for NoopInboundHandler {
    async fn on_inbound(
        &self,
        _ticket: &SupportTicket,
        _msg: &InboundMessage,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// What a claim did to the ticket's assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    Reassigned { previous: String },
}

/// Owns the bot-vs-operator decision for every user.
pub struct LiveModeService {
    sessions: SessionStore,
    tickets: Arc<dyn TicketRepository>,
    outbound: Arc<dyn OutboundSender>,
    inbound_handler: Arc<dyn LiveInboundHandler>,
}

impl LiveModeService {
    pub fn new(
        sessions: SessionStore,
        tickets: Arc<dyn TicketRepository>,
        outbound: Arc<dyn OutboundSender>,
    ) -> Self {
        Self {
            sessions,
            tickets,
            outbound,
            inbound_handler: Arc::new(NoopInboundHandler),
        }
    }

    pub fn with_inbound_handler(mut self, handler: Arc<dyn LiveInboundHandler>) -> Self {
        self.inbound_handler = handler;
        self
    }

    /// `BOT → LIVE`. Idempotent: a user with an open ticket gets the same
    /// reference back instead of a duplicate ticket.
    pub async fn start(&self, user_id: &str, context: Map<String, Value>) -> Result<String> {
        let ticket = match self.tickets.find_open_by_user(user_id).await? {
            Some(ticket) => ticket,
            None => self.tickets.create(user_id).await?,
        };

        let state = LiveState {
            is_active: true,
            ticket_ref: ticket.ticket_ref.clone(),
            started_at_ms: now_ms(),
            context,
        };
        self.sessions.session(user_id).save(LIVE_MODE_KEY, &state).await?;

        info!(user_id, ticket_ref = %ticket.ticket_ref, "live mode started");
        Ok(ticket.ticket_ref)
    }

    pub async fn state(&self, user_id: &str) -> Result<Option<LiveState>> {
        Ok(self.sessions.session(user_id).get(LIVE_MODE_KEY).await?)
    }

    pub async fn is_active(&self, user_id: &str) -> Result<bool> {
        Ok(self.state(user_id).await?.is_some_and(|s| s.is_active))
    }

    /// `LIVE → BOT`. Evicts the state record; the reconnect notice goes
    /// out only when the record was actually present, so repeated stops
    /// stay silent.
    pub async fn stop(&self, user_id: &str) -> Result<()> {
        let was_live = self.sessions.session(user_id).evict(LIVE_MODE_KEY).await?;
        if !was_live {
            return Ok(());
        }

        if let Err(e) = self.outbound.send_text(user_id, RECONNECT_NOTICE).await {
            warn!(user_id, error = %e, "failed to send reconnect notice");
        }
        info!(user_id, "live mode stopped");
        Ok(())
    }

    /// Operator closes the conversation. Records the close on the ticket
    /// and drives the user's state back to bot handling. Closing a ticket
    /// that is already closed is a no-op.
    pub async fn close_ticket(
        &self,
        ticket_ref: &str,
        agent: &str,
        status: TicketStatus,
    ) -> Result<()> {
        let ticket = self.require_ticket(ticket_ref).await?;
        if !ticket.status.is_open() {
            return Ok(());
        }

        self.tickets.close(ticket_ref, status).await?;
        self.tickets
            .append_note(&TicketNote {
                ticket_ref: ticket_ref.to_string(),
                author: agent.to_string(),
                body: format!("{SYSTEM_NOTE_PREFIX} support chat closed by {agent}"),
                created_at_ms: now_ms(),
            })
            .await?;

        self.stop(&ticket.user_id).await
    }

    /// Assign or take over an open ticket. `LIVE → LIVE`: the state
    /// machine is untouched, only the assignee changes. The user is told
    /// who is handling them now.
    pub async fn claim(&self, ticket_ref: &str, agent: &str) -> Result<ClaimOutcome> {
        let ticket = self.require_ticket(ticket_ref).await?;
        if !ticket.status.is_open() {
            return Err(Error::TicketNotOpen(ticket_ref.to_string()));
        }

        let outcome = match ticket.assigned_agent {
            Some(previous) if previous != agent => ClaimOutcome::Reassigned { previous },
            _ => ClaimOutcome::Claimed,
        };
        self.tickets.assign(ticket_ref, agent).await?;

        let greeting = match &outcome {
            ClaimOutcome::Claimed => format!(
                "👋 Hello! I am {agent}, and I will be assisting you today. How can I help you?"
            ),
            ClaimOutcome::Reassigned { .. } => {
                format!("Update: I am {agent}, and I am taking over this chat to assist you further.")
            },
        };
        if let Err(e) = self.outbound.send_text(&ticket.user_id, &greeting).await {
            warn!(ticket_ref, error = %e, "failed to send claim greeting");
        }

        let audit = match &outcome {
            ClaimOutcome::Claimed => format!("{SYSTEM_NOTE_PREFIX} {agent} claimed the ticket"),
            ClaimOutcome::Reassigned { previous } => {
                format!("{SYSTEM_NOTE_PREFIX} reassigned from {previous} to {agent}")
            },
        };
        self.tickets
            .append_note(&TicketNote {
                ticket_ref: ticket_ref.to_string(),
                author: agent.to_string(),
                body: audit,
                created_at_ms: now_ms(),
            })
            .await?;

        Ok(outcome)
    }

    /// Inbound message from a live user: lands on the ticket for the
    /// operator, never on the flow engine.
    pub async fn forward_inbound(&self, msg: &InboundMessage) -> Result<()> {
        let Some(state) = self.state(&msg.user_id).await? else {
            warn!(user_id = %msg.user_id, "forward_inbound without a live record; dropping");
            return Ok(());
        };
        let Some(ticket) = self.tickets.get(&state.ticket_ref).await? else {
            warn!(
                user_id = %msg.user_id,
                ticket_ref = %state.ticket_ref,
                "live record points at a missing ticket; dropping"
            );
            return Ok(());
        };

        self.tickets
            .append_note(&TicketNote {
                ticket_ref: ticket.ticket_ref.clone(),
                author: msg.user_id.clone(),
                body: format!("{USER_MESSAGE_PREFIX} {}", msg.text),
                created_at_ms: now_ms(),
            })
            .await?;

        if let Err(e) = self.inbound_handler.on_inbound(&ticket, msg).await {
            warn!(ticket_ref = %ticket.ticket_ref, error = %e, "live inbound handler failed");
        }
        Ok(())
    }

    /// Relay an operator note to the user. Returns false when the note was
    /// suppressed: ticket no longer open, author is not the assignee, or
    /// the body carries one of the marker prefixes (so the service's own
    /// audit entries can never echo back as fresh replies).
    pub async fn operator_reply(&self, ticket_ref: &str, author: &str, body: &str) -> Result<bool> {
        let ticket = self.require_ticket(ticket_ref).await?;
        if !ticket.status.is_open() {
            return Ok(false);
        }
        if let Some(assigned) = &ticket.assigned_agent
            && assigned.as_str() != author
        {
            return Ok(false);
        }

        let text = strip_markup(body);
        if text.is_empty() || is_marked(&text) {
            return Ok(false);
        }

        self.outbound
            .send_text(&ticket.user_id, &text)
            .await
            .map_err(Error::Outbound)?;
        self.tickets
            .append_note(&TicketNote {
                ticket_ref: ticket_ref.to_string(),
                author: author.to_string(),
                body: format!("{AUTO_REPLY_PREFIX} {text}"),
                created_at_ms: now_ms(),
            })
            .await?;
        Ok(true)
    }

    /// Conversation log of a ticket, newest first.
    pub async fn ticket_notes(&self, ticket_ref: &str, limit: usize) -> Result<Vec<TicketNote>> {
        self.require_ticket(ticket_ref).await?;
        self.tickets.notes(ticket_ref, limit).await
    }

    async fn require_ticket(&self, ticket_ref: &str) -> Result<SupportTicket> {
        self.tickets
            .get(ticket_ref)
            .await?
            .ok_or_else(|| Error::TicketNotFound(ticket_ref.to_string()))
    }
}

fn is_marked(text: &str) -> bool {
    [SYSTEM_NOTE_PREFIX, AUTO_REPLY_PREFIX, USER_MESSAGE_PREFIX]
        .iter()
        .any(|marker| text.contains(marker))
}

/// Strip the HTML a rich-text editor wraps operator notes in.
/// `<br>` and closing paragraphs become newlines; every other tag is
/// dropped; the handful of entities editors emit are decoded.
fn strip_markup(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(end) = rest[start..].find('>') else {
            // Unterminated tag: keep the text as-is.
            rest = &rest[start..];
            break;
        };
        let tag = rest[start + 1..start + end].trim().to_ascii_lowercase();
        if tag == "br" || tag == "br/" || tag == "br /" || tag == "/p" || tag == "/div" {
            out.push('\n');
        }
        rest = &rest[start + end + 1..];
    }
    out.push_str(rest);

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    decoded.trim().to_string()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        confab_common::MessageKind,
        confab_sessions::SessionTtl,
        confab_store::MemoryKv,
        serde_json::json,
    };

    use {super::*, crate::repo_memory::MemoryTicketRepo};

    /// Records every outbound send for assertions.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSender {
        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OutboundSender for RecordingSender {
        async fn send_text(&self, user_id: &str, body: &str) -> anyhow::Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((user_id.to_string(), body.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        service: LiveModeService,
        tickets: Arc<MemoryTicketRepo>,
        sender: Arc<RecordingSender>,
    }

    fn fixture() -> Fixture {
        let sessions = SessionStore::new(Arc::new(MemoryKv::new()), SessionTtl::default());
        let tickets = Arc::new(MemoryTicketRepo::new());
        let sender = Arc::new(RecordingSender::default());
        let service = LiveModeService::new(
            sessions,
            Arc::clone(&tickets) as Arc<dyn TicketRepository>,
            Arc::clone(&sender) as Arc<dyn OutboundSender>,
        );
        Fixture {
            service,
            tickets,
            sender,
        }
    }

    fn inbound(user_id: &str, text: &str) -> InboundMessage {
        InboundMessage {
            user_id: user_id.into(),
            message_id: format!("wamid.{text}"),
            text: text.into(),
            kind: MessageKind::Text,
            sender_name: None,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn start_transitions_to_live_with_a_ticket() {
        let fx = fixture();

        assert!(!fx.service.is_active("u1").await.unwrap());
        let ticket_ref = fx.service.start("u1", Map::new()).await.unwrap();

        assert!(fx.service.is_active("u1").await.unwrap());
        let state = fx.service.state("u1").await.unwrap().unwrap();
        assert_eq!(state.ticket_ref, ticket_ref);
    }

    #[tokio::test]
    async fn start_twice_reuses_the_open_ticket() {
        let fx = fixture();

        let first = fx.service.start("u1", Map::new()).await.unwrap();
        let second = fx
            .service
            .start("u1", json!({"source": "flow"}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn close_returns_user_to_bot_and_notifies_once() {
        let fx = fixture();
        let ticket_ref = fx.service.start("u1", Map::new()).await.unwrap();

        fx.service
            .close_ticket(&ticket_ref, "alice@ops", TicketStatus::Closed)
            .await
            .unwrap();

        assert!(!fx.service.is_active("u1").await.unwrap());
        let sent = fx.sender.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("reconnected"));

        // Second close: no duplicate notice.
        fx.service
            .close_ticket(&ticket_ref, "alice@ops", TicketStatus::Closed)
            .await
            .unwrap();
        assert_eq!(fx.sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn claim_greets_and_reassignment_notifies_takeover() {
        let fx = fixture();
        let ticket_ref = fx.service.start("u1", Map::new()).await.unwrap();

        let outcome = fx.service.claim(&ticket_ref, "alice").await.unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);

        let outcome = fx.service.claim(&ticket_ref, "bob").await.unwrap();
        assert_eq!(
            outcome,
            ClaimOutcome::Reassigned {
                previous: "alice".into()
            }
        );

        let sent = fx.sender.sent();
        assert!(sent[0].1.contains("alice"));
        assert!(sent[1].1.contains("taking over"));
    }

    #[tokio::test]
    async fn claim_on_missing_ticket_is_an_error() {
        let fx = fixture();
        let err = fx.service.claim("TCK-nope", "alice").await.unwrap_err();
        assert!(matches!(err, Error::TicketNotFound(_)));
    }

    #[tokio::test]
    async fn forward_inbound_lands_on_the_ticket() {
        let fx = fixture();
        let ticket_ref = fx.service.start("u1", Map::new()).await.unwrap();

        fx.service
            .forward_inbound(&inbound("u1", "I need a human"))
            .await
            .unwrap();

        let notes = fx.tickets.notes(&ticket_ref, 10).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].body.contains("I need a human"));
        assert!(notes[0].body.starts_with(USER_MESSAGE_PREFIX));
    }

    #[tokio::test]
    async fn operator_reply_reaches_the_user() {
        let fx = fixture();
        let ticket_ref = fx.service.start("u1", Map::new()).await.unwrap();
        fx.service.claim(&ticket_ref, "alice").await.unwrap();
        let sent_before = fx.sender.sent().len();

        let relayed = fx
            .service
            .operator_reply(&ticket_ref, "alice", "<p>On it &amp; checking now</p>")
            .await
            .unwrap();

        assert!(relayed);
        let sent = fx.sender.sent();
        assert_eq!(sent.len(), sent_before + 1);
        assert_eq!(sent[sent_before].1, "On it & checking now");
    }

    #[tokio::test]
    async fn marked_notes_never_echo_back() {
        let fx = fixture();
        let ticket_ref = fx.service.start("u1", Map::new()).await.unwrap();
        let sent_before = fx.sender.sent().len();

        for body in [
            format!("{SYSTEM_NOTE_PREFIX} support chat closed by alice"),
            format!("{AUTO_REPLY_PREFIX} already relayed"),
            format!("{USER_MESSAGE_PREFIX} forwarded message"),
        ] {
            let relayed = fx
                .service
                .operator_reply(&ticket_ref, "alice", &body)
                .await
                .unwrap();
            assert!(!relayed);
        }
        assert_eq!(fx.sender.sent().len(), sent_before);
    }

    #[tokio::test]
    async fn non_assignee_reply_is_dropped() {
        let fx = fixture();
        let ticket_ref = fx.service.start("u1", Map::new()).await.unwrap();
        fx.service.claim(&ticket_ref, "alice").await.unwrap();

        let relayed = fx
            .service
            .operator_reply(&ticket_ref, "mallory", "hi there")
            .await
            .unwrap();
        assert!(!relayed);
    }

    #[test]
    fn strip_markup_flattens_editor_html() {
        assert_eq!(
            strip_markup("<p>hello <b>there</b></p><p>second&nbsp;line</p>"),
            "hello there\nsecond line"
        );
        assert_eq!(strip_markup("plain text"), "plain text");
        assert_eq!(strip_markup("a<br>b"), "a\nb");
    }
}
