//! Error types for SignalTrace core.

use thiserror::Error;

/// SignalTrace core error type
#[derive(Error, Debug)]
pub enum TraceError {
    /// An analysis run is already in flight for this session
    #[error("analysis run already in progress")]
    RunInProgress,

    /// The verdict source could not be opened
    #[error("verdict source unavailable: {0}")]
    SourceUnavailable(String),

    /// Transport-level stream failure
    #[error("stream transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for TraceError {
    fn from(err: reqwest::Error) -> Self {
        TraceError::Transport(err.to_string())
    }
}

/// Result type for SignalTrace core
pub type TraceResult<T> = Result<T, TraceError>;
