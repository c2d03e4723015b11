use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Price feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Price store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    #[error("Price store timed out: {0}")]
    StoreTimeout(String),

    /// The message was definitely not handed to the provider.
    #[error("Notification failed: {0}")]
    NotifierFailure(String),

    /// The provider may or may not have accepted the message.
    #[error("Notification outcome unknown: {0}")]
    DeliveryUnknown(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for every persistence failure, whether the database reported it
    /// or the call ran past its deadline.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_) | Error::StoreTimeout(_) | Error::Migration(_)
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
