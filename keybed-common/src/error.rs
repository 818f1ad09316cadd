//! Error type shared by the Keybed crates
//!
//! The comparison store has its own soft-failure enum in `keybed-sf`; this
//! one covers storage, configuration and catalog access.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Compare record or stored JSON column could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored catalog row that no longer maps onto the data model
    #[error("Corrupt catalog record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected caller input; surfaces as HTTP 400
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn corrupt(id: impl Into<String>, reason: impl ToString) -> Self {
        Error::CorruptRecord {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}
