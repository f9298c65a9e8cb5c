//! Storage abstractions for detour history and notice collections.
//!
//! Two kinds of state are persisted:
//! - Detour history: route display name → last fingerprint. The only state
//!   the detour pipeline reads back; replaced atomically once per cycle.
//! - Collections: named lists of JSON documents (`bus_route`, `bus_notice`,
//!   `school_notice`, `ocr_history`), dropped and rewritten wholesale.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml
//! ├── detour_history.json     # { "7016": "<sha256 hex>", ... }
//! └── collections/
//!     ├── bus_route.json
//!     ├── bus_notice.json
//!     ├── ocr_history.json
//!     └── school_notice.json
//! ```

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::models::Fingerprint;

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Route display name → fingerprint of its currently active detour.
///
/// Routes without an active detour have no entry.
pub type History = BTreeMap<String, Fingerprint>;

/// Collection names.
pub mod collections {
    pub const BUS_ROUTE: &str = "bus_route";
    pub const BUS_NOTICE: &str = "bus_notice";
    pub const SCHOOL_NOTICE: &str = "school_notice";
    pub const OCR_HISTORY: &str = "ocr_history";
}

/// Metadata about a collection write.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Number of documents written
    pub count: usize,
    /// Where the collection was written
    pub location: String,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

/// On-disk form of a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionData {
    /// ISO 8601 timestamp of last update
    pub updated_at: DateTime<Utc>,
    /// Document count
    pub count: usize,
    /// The documents array
    pub documents: Vec<Value>,
}

impl CollectionData {
    pub fn new(documents: Vec<Value>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: documents.len(),
            documents,
        }
    }
}

/// Durable detour history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load the history written by the last completed cycle.
    ///
    /// A store that was never written loads as an empty map.
    async fn load_history(&self) -> Result<History>;

    /// Replace the whole history. Either all of `history` is visible
    /// afterwards or none of it is.
    async fn replace_history(&self, history: &History) -> Result<()>;
}

/// Named document collections with drop-and-replace semantics.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Replace a collection with `documents`.
    async fn replace_collection(&self, name: &str, documents: Vec<Value>) -> Result<WriteMetadata>;

    /// Load a collection; missing collections load as empty.
    async fn load_collection(&self, name: &str) -> Result<Vec<Value>>;
}
