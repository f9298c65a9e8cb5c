//! Local filesystem storage implementation.
//!
//! Every write goes to a sibling `.tmp` file which is then renamed over the
//! target, so readers see either the old file or the new one.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── detour_history.json
//! └── collections/
//!     └── {name}.json
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{CollectionData, DocumentStore, History, HistoryStore, WriteMetadata};

const HISTORY_KEY: &str = "detour_history.json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn collection_key(name: &str) -> String {
        format!("collections/{}.json", name)
    }
}

#[async_trait]
impl HistoryStore for LocalStorage {
    async fn load_history(&self) -> Result<History> {
        match self.read_json::<History>(HISTORY_KEY).await {
            Ok(Some(history)) => Ok(history),
            Ok(None) => {
                log::info!("No detour history at {}, starting empty", HISTORY_KEY);
                Ok(History::new())
            }
            Err(e) => Err(AppError::history(format!("reading {}: {}", HISTORY_KEY, e))),
        }
    }

    async fn replace_history(&self, history: &History) -> Result<()> {
        self.write_json(HISTORY_KEY, history)
            .await
            .map_err(|e| AppError::history(format!("writing {}: {}", HISTORY_KEY, e)))?;
        log::debug!("Detour history: {} entries written", history.len());
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for LocalStorage {
    async fn replace_collection(&self, name: &str, documents: Vec<Value>) -> Result<WriteMetadata> {
        let key = Self::collection_key(name);
        let data = CollectionData::new(documents);
        self.write_json(&key, &data).await?;

        log::info!("Collection {}: {} documents written", name, data.count);
        Ok(WriteMetadata {
            count: data.count,
            location: self.path(&key).display().to_string(),
            timestamp: data.updated_at,
        })
    }

    async fn load_collection(&self, name: &str) -> Result<Vec<Value>> {
        let key = Self::collection_key(name);
        match self.read_json::<CollectionData>(&key).await? {
            Some(data) => Ok(data.documents),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fingerprint, StopRecord};
    use crate::pipeline::fingerprint;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let data = storage.read_bytes("nope.txt").await.unwrap();
        assert!(data.is_none());
    }

    #[tokio::test]
    async fn test_missing_history_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.load_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let mut history = History::new();
        history.insert("7016".into(), fingerprint(&[StopRecord::new("X", "1")]));
        history.insert("서대문08".into(), Fingerprint::from_hex("ab:cd"));

        storage.replace_history(&history).await.unwrap();
        assert_eq!(storage.load_history().await.unwrap(), history);

        // Replacing with a smaller map drops the missing keys entirely.
        let mut smaller = History::new();
        smaller.insert("163".into(), Fingerprint::from_hex("ff"));
        storage.replace_history(&smaller).await.unwrap();
        assert_eq!(storage.load_history().await.unwrap(), smaller);

        storage.replace_history(&History::new()).await.unwrap();
        assert!(storage.load_history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_history_is_history_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.write_bytes(HISTORY_KEY, b"7016:abc\n").await.unwrap();

        let err = storage.load_history().await.unwrap_err();
        assert!(matches!(err, AppError::History(_)));
    }

    #[tokio::test]
    async fn test_collection_replace_and_load() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.load_collection("bus_route").await.unwrap().is_empty());

        let meta = storage
            .replace_collection("bus_route", vec![json!({"busName": "7016"}), json!({"busName": "163"})])
            .await
            .unwrap();
        assert_eq!(meta.count, 2);

        storage
            .replace_collection("bus_route", vec![json!({"busName": "1711"})])
            .await
            .unwrap();
        let docs = storage.load_collection("bus_route").await.unwrap();
        assert_eq!(docs, vec![json!({"busName": "1711"})]);
    }
}
