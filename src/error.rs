//! Error types for url-downloader
//!
//! Errors fall into two groups:
//! - [`Error`] is fatal to a run (unreadable input, invalid configuration, HTTP client setup).
//! - [`RecordError`] and [`FetchError`] describe a single input row or URL. They are
//!   logged and counted by the stage that hit them and never cross a stage boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for url-downloader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for url-downloader
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_workers")
        key: Option<String>,
    },

    /// The input file failed validation before the pipeline started
    #[error("{reason}: {}", path.display())]
    InvalidInput {
        /// Path that was rejected
        path: PathBuf,
        /// Why the path was rejected
        reason: String,
    },

    /// I/O error tied to a specific path (input file, log directory, config file)
    #[error("failed to {action} '{}': {source}", path.display())]
    PathIo {
        /// What was being attempted (e.g., "open input file")
        action: &'static str,
        /// The path involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (HTTP client construction)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A pipeline stage panicked or was aborted
    #[error("pipeline stage '{stage}' did not complete: {reason}")]
    StageFailed {
        /// Name of the stage ("source", "download", "persist")
        stage: &'static str,
        /// Join error description
        reason: String,
    },
}

impl Error {
    /// Build a [`Error::Config`] for the given key.
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// A malformed input row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Row had a field count other than one
    #[error("expected 1 field, found {found}")]
    FieldCount {
        /// Number of fields found on the row
        found: usize,
    },

    /// A `"` appeared inside an unquoted field
    #[error("bare \" in non-quoted field at column {column}")]
    BareQuote {
        /// Byte column of the offending quote (1-based)
        column: usize,
    },

    /// A quoted field was not closed before end of line
    #[error("unterminated quoted field")]
    UnterminatedQuote,

    /// Characters followed a closing quote before the next separator
    #[error("extraneous \" or text after quoted field at column {column}")]
    TrailingQuote {
        /// Byte column of the unexpected character (1-based)
        column: usize,
    },

    /// Line was not valid UTF-8
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// A failed download of a single URL
#[derive(Debug, Error)]
pub enum FetchError {
    /// The normalized URL could not be parsed
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        /// The URL after normalization
        url: String,
        /// Parse failure
        #[source]
        source: url::ParseError,
    },

    /// Transport-level failure (DNS, connect, TLS, body read)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP error: {status}")]
    Status {
        /// Status code returned by the server
        status: u16,
    },

    /// The shutdown context fired while the request was in flight
    #[error("request cancelled by shutdown")]
    Cancelled,
}

impl FetchError {
    /// Returns true if this failure was caused by shutdown rather than the remote end.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
