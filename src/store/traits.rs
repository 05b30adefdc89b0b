//! Artifact store trait

use super::StoreLocation;
use crate::error::StoreError;
use crate::types::ErrorRecord;
use async_trait::async_trait;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Blob store holding artifacts and error records
///
/// Implementations must tolerate concurrent writes to disjoint keys from
/// many tasks without cross-key locking.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Whether a record exists under `key`
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Write `bytes` under `key`, replacing any previous value
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()>;

    /// Read the record under `key`, if any
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// All keys currently in the store, sorted
    async fn list_keys(&self) -> StoreResult<Vec<String>>;

    /// Where this store lives
    fn location(&self) -> &StoreLocation;

    /// Write an error record as JSON under `key`
    async fn put_error(&self, key: &str, record: &ErrorRecord) -> StoreResult<()> {
        let body = serde_json::json!({ "error": record.error }).to_string();
        self.put(key, body.into_bytes()).await
    }
}
