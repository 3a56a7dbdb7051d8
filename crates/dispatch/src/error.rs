//! Failure taxonomy for the webhook path.
//!
//! Validation and auth failures reject the request synchronously, before
//! any job exists. Everything past the fast ack surfaces only in logs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed payload. No job is created.
    #[error("invalid webhook payload: {0}")]
    Validation(String),

    /// Signature or verify-token mismatch.
    #[error("webhook authentication failed: {0}")]
    Auth(&'static str),

    /// Shared store unreachable. Retryable; never mapped to "absent".
    #[error(transparent)]
    Store(#[from] confab_store::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
