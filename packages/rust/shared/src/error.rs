//! Error types for newsrag.
//!
//! Library crates use [`NewsRagError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Network and extraction failures are absorbed by the fetch layer (logged,
//! degraded to empty results); they only surface through this type inside
//! the crate that produced them. Unparseable timestamps are never an error:
//! see [`crate::timestamp`].

use std::path::PathBuf;

/// Top-level error type for all newsrag operations.
#[derive(Debug, thiserror::Error)]
pub enum NewsRagError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during a feed or page fetch.
    #[error("network error: {0}")]
    Network(String),

    /// Feed or HTML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Every extractor strategy failed for a URL.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Content cache or index persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// The vector index is missing or was never initialized.
    #[error("vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad arguments, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NewsRagError>;

impl NewsRagError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
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
