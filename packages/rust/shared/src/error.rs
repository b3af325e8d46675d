//! Error types for Postsmith.
//!
//! Library crates use [`PostsmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Postsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum PostsmithError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while scraping, searching, or generating.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or selector compilation error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Text-generation provider error (API, empty output, response decoding).
    #[error("generation error: {0}")]
    Generation(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing title, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PostsmithError>;

impl PostsmithError {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = PostsmithError::config("missing GEMINI_API_KEY");
        assert_eq!(err.to_string(), "config error: missing GEMINI_API_KEY");

        let err = PostsmithError::validation("article title is empty");
        assert!(err.to_string().contains("title is empty"));

        let err = PostsmithError::Generation("all models failed".into());
        assert_eq!(err.to_string(), "generation error: all models failed");
    }

    #[test]
    fn io_error_keeps_path() {
        let err = PostsmithError::io(
            "/tmp/postsmith.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("postsmith.toml"));
    }
}
