//! Types and collaborator traits shared across the confab workspace.

pub mod traits;
pub mod types;

pub use {
    traits::{FlowEngine, OutboundSender},
    types::{InboundMessage, MessageKind},
};
