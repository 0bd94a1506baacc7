//! Error types for the stockflow system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the stockflow system.
///
/// The runner classifies failures by asking the error itself: only
/// [`Error::is_retryable`] variants re-enter the retry envelope, everything
/// else is terminal.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input record. The whole batch is rejected.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A batch with no samples has no maximum.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Partition key outside the declared set.
    #[error("Unknown partition: {0}")]
    UnknownPartition(String),

    /// Object store read failed (network or missing key). Retryable.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Key-value store write failed. Retryable.
    #[error("Sink unavailable: {0}")]
    SinkUnavailable(String),

    /// Run cancelled by host shutdown.
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Seen-key ledger error.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create an empty input error.
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Error::EmptyInput(msg.into())
    }

    /// Create an unknown partition error.
    pub fn unknown_partition(msg: impl Into<String>) -> Self {
        Error::UnknownPartition(msg.into())
    }

    /// Create a source unavailable error.
    pub fn source_unavailable(msg: impl Into<String>) -> Self {
        Error::SourceUnavailable(msg.into())
    }

    /// Create a sink unavailable error.
    pub fn sink_unavailable(msg: impl Into<String>) -> Self {
        Error::SinkUnavailable(msg.into())
    }

    /// Create a cancellation error.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Error::Cancelled(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a ledger error.
    pub fn ledger(msg: impl Into<String>) -> Self {
        Error::Ledger(msg.into())
    }

    /// Whether the retry envelope may re-attempt a run failing with this error.
    ///
    /// Transient store I/O is retryable; parse/logic/config defects and
    /// cancellation are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::SourceUnavailable(_) | Error::SinkUnavailable(_)
        )
    }

    /// Pipeline stage this error originates from, when it maps to one.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Error::Parse(_) | Error::SourceUnavailable(_) => Some("extract"),
            Error::EmptyInput(_) => Some("transform"),
            Error::SinkUnavailable(_) => Some("load"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::source_unavailable("timeout").is_retryable());
        assert!(Error::sink_unavailable("refused").is_retryable());

        assert!(!Error::parse("bad field").is_retryable());
        assert!(!Error::empty_input("no samples").is_retryable());
        assert!(!Error::unknown_partition("11").is_retryable());
        assert!(!Error::cancelled("shutdown").is_retryable());
        assert!(!Error::config("bad cron").is_retryable());
    }

    #[test]
    fn test_stage_attribution() {
        assert_eq!(Error::parse("x").stage(), Some("extract"));
        assert_eq!(Error::source_unavailable("x").stage(), Some("extract"));
        assert_eq!(Error::empty_input("x").stage(), Some("transform"));
        assert_eq!(Error::sink_unavailable("x").stage(), Some("load"));
        assert_eq!(Error::cancelled("x").stage(), None);
    }
}
