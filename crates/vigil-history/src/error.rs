//! Error handling for run history.

use thiserror::Error;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// History persistence and analysis errors.
///
/// None of these are fatal to a run: the pipeline reports them as warnings
/// on the result it returns.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A store lock was poisoned.
    #[error("Lock error: {0}")]
    LockError(String),

    /// Trend windows need at least one run.
    #[error("Invalid trend window: {0}")]
    InvalidWindow(usize),
}

impl From<rusqlite::Error> for HistoryError {
    fn from(e: rusqlite::Error) -> Self {
        HistoryError::DatabaseError(e.to_string())
    }
}
