//! Error types for the expense conversation engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ExpenseError>;

#[derive(Error, Debug)]
pub enum ExpenseError {

    // =============================
    // Recoverable Input Errors
    // =============================

    #[error("{0}")]
    Validation(String),

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Session error: {0}")]
    Session(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Rate provider error: {0}")]
    RateProvider(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    /// Commit attempted on a non-ready draft. A programming-error assertion,
    /// never surfaced to the user directly.
    #[error("Internal error: {0}")]
    Internal(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ExpenseError {
    /// True for errors the state machine recovers from by re-prompting
    /// in place without discarding accumulated fields.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExpenseError::Validation(_))
    }
}
