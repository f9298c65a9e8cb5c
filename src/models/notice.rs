//! Notice data structures.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A detour notice from the transit authority board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BusNotice {
    /// Board sequence number
    pub number: i64,

    pub created_time: NaiveDateTime,

    pub updated_time: NaiveDateTime,

    pub title: String,

    /// Attached image URLs, normalized to https
    pub image_urls: Vec<String>,

    /// Plain text of the notice body
    pub content: String,

    /// Watched route numbers recognized in the attached images (sorted)
    pub bus_numbers: Vec<String>,
}

/// A row from the university notice listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SchoolNotice {
    pub title: String,

    pub post_id: u64,

    /// Posting date as `YYYY.MM.DD_00:00:00`
    pub created_time: String,

    pub views: u64,
}

/// Cached OCR outcome for one image URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OcrRecord {
    pub url: String,

    /// Watched route numbers found in the image (sorted)
    pub bus_numbers: Vec<String>,
}
