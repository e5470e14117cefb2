//! Error types for the Waymark analytics crate.

use thiserror::Error;

/// Top-level error type for analytics operations.
///
/// These never cross the dispatcher's public boundary: every failure is
/// absorbed and at most logged. The type exists for the internal seams
/// (consent store, config loading) that do return `Result`.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

/// A convenience Result alias that defaults to [`AnalyticsError`].
pub type Result<T> = std::result::Result<T, AnalyticsError>;
