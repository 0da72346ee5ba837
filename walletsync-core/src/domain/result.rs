//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// Variants follow how a failure is handled by the sync coordinator:
/// configuration and authorization problems end the run, everything else
/// is isolated to the task that produced it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authorization failed: {0}")]
    Unauthorized(String),

    #[error("Rate limited by remote service: {0}")]
    RateLimited(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a data error
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// True for errors after which no further remote call in the same run can succeed
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Unauthorized(_))
    }

    /// True when the remote service itself rejected the call for exceeding its limit
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Short class name, safe to record where messages could carry user data
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Transport(_) => "transport",
            Self::Unauthorized(_) => "unauthorized",
            Self::RateLimited(_) => "rate_limited",
            Self::Data(_) => "data",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Database(_) => "database",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}

// Storage adapters speak anyhow; anything they surface is a store failure.
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
