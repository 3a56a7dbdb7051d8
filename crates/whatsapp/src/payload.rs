//! Serde model of the Cloud API webhook envelope, plus the flattening
//! step that turns it into [`InboundMessage`]s.

use {
    serde::Deserialize,
    tracing::{debug, warn},
};

use confab_common::{InboundMessage, MessageKind};

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Metadata {
    pub phone_number_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Contact {
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub from: String,
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub interactive: Option<Interactive>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct Interactive {
    #[serde(default)]
    pub button_reply: Option<ReplyRef>,
    #[serde(default)]
    pub list_reply: Option<ReplyRef>,
}

/// Id/title pair of a tapped button or list row.
#[derive(Debug, Deserialize)]
pub struct ReplyRef {
    pub id: String,
    pub title: String,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self.message_type.as_str() {
            "text" => MessageKind::Text,
            "interactive" => match &self.interactive {
                Some(i) if i.button_reply.is_some() => MessageKind::ButtonReply,
                Some(i) if i.list_reply.is_some() => MessageKind::ListReply,
                _ => MessageKind::Unknown,
            },
            "image" | "audio" | "video" | "document" | "sticker" => MessageKind::Media,
            "location" => MessageKind::Location,
            _ => MessageKind::Unknown,
        }
    }

    /// Computed textual input: the text body, or the id of the tapped
    /// interactive element. Media and location carry no routing text.
    pub fn input_text(&self) -> String {
        if let Some(text) = &self.text {
            return text.body.clone();
        }
        if let Some(interactive) = &self.interactive {
            if let Some(reply) = &interactive.button_reply {
                return reply.id.clone();
            }
            if let Some(reply) = &interactive.list_reply {
                return reply.id.clone();
            }
        }
        String::new()
    }
}

/// Flatten a webhook envelope into the messages addressed to us.
///
/// Skips non-message change fields (status receipts and the like) and any
/// entry whose `phone_number_id` does not match the configured number.
pub fn extract_inbound(payload: &WebhookPayload, phone_number_id: &str) -> Vec<InboundMessage> {
    let mut inbound = Vec::new();

    for entry in &payload.entry {
        for change in &entry.changes {
            if change.field != "messages" {
                debug!(field = %change.field, "ignoring non-message webhook change");
                continue;
            }
            let value = &change.value;

            if let Some(metadata) = &value.metadata
                && metadata.phone_number_id != phone_number_id
            {
                warn!(
                    expected = phone_number_id,
                    received = %metadata.phone_number_id,
                    "phone number id mismatch; skipping entry"
                );
                continue;
            }

            for msg in &value.messages {
                let sender_name = value
                    .contacts
                    .iter()
                    .find(|c| c.wa_id == msg.from)
                    .and_then(|c| c.profile.as_ref())
                    .map(|p| p.name.clone());

                inbound.push(InboundMessage {
                    user_id: msg.from.clone(),
                    message_id: msg.id.clone(),
                    text: msg.input_text(),
                    kind: msg.kind(),
                    sender_name,
                    timestamp: msg.timestamp.as_deref().and_then(|t| t.parse().ok()),
                });
            }
        }
    }

    inbound
}
