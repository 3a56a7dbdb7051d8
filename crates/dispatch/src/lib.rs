//! Webhook dispatch: validation, idempotent scheduling, and the per-user
//! serialized processing step.

pub mod coordinator;
pub mod error;
pub mod queue;

pub use {
    coordinator::{CoordinatorConfig, LockPolicy, WebhookCoordinator},
    error::{Error, Result},
    queue::{JobHook, JobQueue, Submit},
};
