use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The backing store could not be reached or a query failed.
    ///
    /// Deliberately distinct from an absent key: callers must treat this as
    /// a retryable failure, never as "no value" — collapsing the two would
    /// corrupt live-mode and auth-adjacent state.
    #[error("store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, Error>;
