//! AWS S3 storage implementation.
//!
//! A single `PutObject` replaces an object atomically, so history and
//! collections are written as one object each:
//! - `{prefix}/history/detour.json`
//! - `{prefix}/collections/{name}.json`

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::storage::{CollectionData, DocumentStore, History, HistoryStore, WriteMetadata};

/// S3-based storage for history and collections.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create S3 storage from environment configuration.
    pub async fn from_env() -> Result<Self> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&config);

        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "smus-crawler".to_string());
        let prefix = std::env::var("S3_PREFIX").unwrap_or_else(|_| "smus".to_string());

        Ok(Self::new(client, bucket, prefix))
    }

    fn key(&self, relative: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", prefix, relative)
        }
    }

    /// Key of the optional `config.toml` stored next to the state.
    pub fn config_key(&self) -> String {
        self.key("config.toml")
    }

    fn history_key(&self) -> String {
        self.key("history/detour.json")
    }

    fn collection_key(&self, name: &str) -> String {
        self.key(&format!("collections/{}.json", name))
    }

    /// Read an object, returning None if the key does not exist.
    pub async fn read_bytes_optional(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::S3(e.to_string()))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::info!("No existing object at s3://{}/{}", self.bucket, key);
                    Ok(None)
                } else {
                    Err(AppError::S3(service_err.to_string()))
                }
            }
        }
    }

    /// Write an object in one request.
    async fn write_bytes(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::S3(e.to_string()))?;
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl HistoryStore for S3Storage {
    async fn load_history(&self) -> Result<History> {
        let key = self.history_key();
        let bytes = self
            .read_bytes_optional(&key)
            .await
            .map_err(|e| AppError::history(format!("reading {}: {}", self.location(&key), e)))?;

        match bytes {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AppError::history(format!("parsing {}: {}", self.location(&key), e))),
            None => Ok(History::new()),
        }
    }

    async fn replace_history(&self, history: &History) -> Result<()> {
        let key = self.history_key();
        let bytes = serde_json::to_vec_pretty(history)?;
        self.write_bytes(&key, bytes)
            .await
            .map_err(|e| AppError::history(format!("writing {}: {}", self.location(&key), e)))
    }
}

#[async_trait]
impl DocumentStore for S3Storage {
    async fn replace_collection(&self, name: &str, documents: Vec<Value>) -> Result<WriteMetadata> {
        let key = self.collection_key(name);
        let data = CollectionData::new(documents);
        self.write_bytes(&key, serde_json::to_vec_pretty(&data)?).await?;

        log::info!("Wrote {} documents to {}", data.count, self.location(&key));
        Ok(WriteMetadata {
            count: data.count,
            location: self.location(&key),
            timestamp: data.updated_at,
        })
    }

    async fn load_collection(&self, name: &str) -> Result<Vec<Value>> {
        let key = self.collection_key(name);
        match self.read_bytes_optional(&key).await? {
            Some(bytes) => {
                let data: CollectionData = serde_json::from_slice(&bytes)?;
                Ok(data.documents)
            }
            None => Ok(Vec::new()),
        }
    }
}
