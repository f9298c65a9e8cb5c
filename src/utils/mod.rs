//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use self::url::{normalize_image_url, resolve_url};

/// Collapse runs of whitespace (including tabs and CR/LF) into single spaces.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
