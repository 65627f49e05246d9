use super::types::SchemaVersion;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Migration {from} -> {to} failed: {reason}")]
    Migration {
        from: SchemaVersion,
        to: SchemaVersion,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl DbError {
    /// Wraps any error raised inside a migration stage, keeping the stage endpoints.
    pub fn migration(from: SchemaVersion, to: SchemaVersion, reason: impl ToString) -> Self {
        Self::Migration {
            from,
            to,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(format!("Failed to encode or decode record body: {}", err))
    }
}
