//! Error types for TuitionBell.

use thiserror::Error;

/// Every failure a TuitionBell component can report.
#[derive(Debug, Error)]
pub enum TuitionError {
    /// Missing or invalid endpoint, credential or schedule setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store unreachable, query rejected, or log write failed. Aborts a run.
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// A single student record could not be interpreted.
    #[error("Malformed record for student {student_id}: {reason}")]
    MalformedRecord { student_id: String, reason: String },

    /// The email transport refused or failed to deliver a message.
    #[error("Email transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TuitionError>;
