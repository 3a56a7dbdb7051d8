//! WhatsApp Cloud API surface: webhook payload model, authenticity
//! checks, and the outbound message client.

pub mod client;
pub mod payload;
pub mod verify;

pub use {
    client::CloudApiClient,
    payload::{WebhookPayload, extract_inbound},
};
