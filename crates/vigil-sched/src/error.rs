//! Error handling for check scheduling.

use thiserror::Error;

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Configuration errors. Each is fatal to the requested run and is raised
/// before any check executes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// A requested check, or a declared dependency, is not registered.
    #[error("Unknown check: {0}")]
    UnknownCheck(String),

    /// The dependency graph contains a cycle.
    #[error("Dependency cycle detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A check with this name is already registered.
    #[error("Duplicate check: {0}")]
    DuplicateCheck(String),

    /// Invalid scheduler or check configuration.
    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}

/// Error returned by a checker for infrastructure faults.
///
/// Expected failures of the checked code are not errors: a checker reports
/// them as a `FAILURE` result. A `CheckerError` means the tool itself could
/// not do its job, and becomes a fault result.
#[derive(Error, Debug)]
pub enum CheckerError {
    /// The external tool is not installed or not on the path.
    #[error("Tool not available: {0}")]
    ToolUnavailable(String),

    /// I/O failure while running the tool.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The tool's output could not be parsed.
    #[error("Unparseable tool output: {0}")]
    Output(String),

    /// The checker observed its cancel signal and stopped.
    #[error("Check cancelled")]
    Cancelled,

    /// Any other fault.
    #[error("{0}")]
    Other(String),
}
