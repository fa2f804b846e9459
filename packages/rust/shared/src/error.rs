//! Error types for FeedPulse.
//!
//! Library crates use [`FeedPulseError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all FeedPulse operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedPulseError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Tracker fetch failure (non-2xx response, transport error, bad payload).
    #[error("source fetch failed{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Source {
        status: Option<u16>,
        message: String,
    },

    /// Generative summarization failure (transport, auth, quota).
    #[error("analysis failed: {0}")]
    Analysis(String),

    /// Cache file exists but cannot be used for the requested operation.
    #[error("cache error: {0}")]
    Cache(String),

    /// A search/lookup was attempted before any snapshot was cached.
    #[error("no cached data: run a fetch before searching")]
    NoCachedData,

    /// Notification sink failure.
    #[error("report delivery failed: {0}")]
    Delivery(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FeedPulseError>;

impl FeedPulseError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a source error without an HTTP status (transport-level failure).
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source {
            status: None,
            message: msg.into(),
        }
    }

    /// Create a source error carrying the upstream HTTP status.
    pub fn source_status(status: u16, msg: impl Into<String>) -> Self {
        Self::Source {
            status: Some(status),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = FeedPulseError::config("missing tracker token");
        assert_eq!(err.to_string(), "config error: missing tracker token");

        let err = FeedPulseError::source_status(401, "Unauthorized");
        assert_eq!(err.to_string(), "source fetch failed (HTTP 401): Unauthorized");

        let err = FeedPulseError::source("connection refused");
        assert_eq!(err.to_string(), "source fetch failed: connection refused");
    }

    #[test]
    fn no_cached_data_is_distinct_from_empty_result() {
        let err = FeedPulseError::NoCachedData;
        assert!(err.to_string().contains("no cached data"));
    }
}
