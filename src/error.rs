// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// AWS S3 error
    #[error("S3 error: {0}")]
    S3(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed (includes timeouts)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
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

    /// Upstream API answered with an error header
    #[error("Upstream error for {context}: {message}")]
    Upstream { context: String, message: String },

    /// A response was readable but a required field was missing or malformed
    #[error("Parse error for {context}: {message}")]
    Parse { context: String, message: String },

    /// Detour history could not be read or written
    #[error("History store error: {0}")]
    History(String),

    /// Outbound detour notification failed
    #[error("Notify error for {route}: {message}")]
    Notify { route: String, message: String },

    /// Text recognition failed
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Collection write aborted because the document count collapsed
    #[error(
        "Circuit breaker triggered for {collection}: {previous_count} → {current_count} documents ({drop_percent:.1}% drop > {threshold_percent}%)"
    )]
    CircuitBreakerTriggered {
        collection: String,
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
        threshold_percent: u8,
    },
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

    /// Create an upstream error with context.
    pub fn upstream(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Upstream {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error with context.
    pub fn parse(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a history store error.
    pub fn history(message: impl fmt::Display) -> Self {
        Self::History(message.to_string())
    }

    /// Create a notify error for a route.
    pub fn notify(route: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Notify {
            route: route.into(),
            message: message.to_string(),
        }
    }

    /// Create an OCR error.
    pub fn ocr(message: impl fmt::Display) -> Self {
        Self::Ocr(message.to_string())
    }
}
