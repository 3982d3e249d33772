// Error taxonomy for the collector. Elapsed-time anomalies are not errors
// (see rate::TickOutcome::Discarded).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrafficError {
    #[error("counter source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("storage I/O error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("day bucket serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("traffic collector is already running")]
    AlreadyRunning,

    #[error("traffic collector is not running")]
    NotRunning,

    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    #[error("blocking task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, TrafficError>;

impl TrafficError {
    pub fn source_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    pub fn invalid_period<S: Into<String>>(msg: S) -> Self {
        Self::InvalidPeriod(msg.into())
    }
}

impl From<tokio::task::JoinError> for TrafficError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}
