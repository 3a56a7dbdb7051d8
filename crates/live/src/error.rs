use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] confab_sessions::Error),

    #[error(transparent)]
    Db(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    #[error("ticket {0} is not open")]
    TicketNotOpen(String),

    #[error("outbound send failed: {0}")]
    Outbound(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
