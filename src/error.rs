// src/error.rs

//! Unified error handling for the forum crawler.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// Every variant except the ambient I/O and parsing ones is fatal to a crawl
/// run. Missing fields on an otherwise matched page element never reach this
/// type: the extractor skips that element and carries on.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client failed to build or a transport error escaped a fetch
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A page could not be fetched; aborts the crawl
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Login was rejected; the crawl never starts
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The persisted snapshot is malformed or incomplete
    #[error("Corrupt snapshot: {0}")]
    Snapshot(String),

    /// A blocking report task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl fmt::Display) -> Self {
        Self::Auth(message.to_string())
    }

    /// Create a snapshot corruption error.
    pub fn snapshot(message: impl fmt::Display) -> Self {
        Self::Snapshot(message.to_string())
    }

    /// Whether this error is a snapshot corruption.
    pub fn is_snapshot_corruption(&self) -> bool {
        matches!(self, Self::Snapshot(_))
    }
}
