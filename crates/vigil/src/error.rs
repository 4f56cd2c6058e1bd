//! Error types for the engine facade.

use thiserror::Error;
use vigil_history::HistoryError;
use vigil_sched::SchedError;

/// Result type for facade operations.
pub type VigilResult<T> = Result<T, VigilError>;

/// Errors raised by the facade.
#[derive(Error, Debug)]
pub enum VigilError {
    /// The check graph or a run request is invalid.
    #[error(transparent)]
    Sched(#[from] SchedError),

    /// History could not be read or written.
    #[error("History error: {0}")]
    History(#[from] HistoryError),

    /// Config file read failed.
    #[error("IO error: {0}")]
    IoError(String),

    /// Config could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Config parsed but holds invalid values.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A report could not be rendered.
    #[error("Render error: {0}")]
    RenderError(String),
}

impl VigilError {
    /// Whether the error stems from configuration rather than from I/O at
    /// run time.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            VigilError::Sched(_) | VigilError::ParseError(_) | VigilError::ValidationError(_)
        )
    }
}
