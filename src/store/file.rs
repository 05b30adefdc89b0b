//! Filesystem-backed artifact store (`file://`)

use super::traits::{ArtifactStore, StoreResult};
use super::{StoreLocation, validate_key};
use crate::error::StoreError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Artifact store rooted at a local directory
///
/// Writes land in a hidden temporary file next to the target and are renamed
/// into place, so a reader never observes a half-written artifact. The root
/// directory is created on first write.
#[derive(Debug, Clone)]
pub struct FileStore {
    location: StoreLocation,
    root: PathBuf,
}

impl FileStore {
    /// Open a store for a `file://` location
    pub fn open(location: StoreLocation) -> StoreResult<Self> {
        let root = location
            .url()
            .to_file_path()
            .map_err(|()| StoreError::InvalidLocation {
                location: location.to_string(),
                reason: "not a local file path".to_string(),
            })?;
        Ok(Self { location, root })
    }

    /// The directory this store writes into
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn unavailable(&self, e: std::io::Error) -> StoreError {
        StoreError::Unavailable {
            location: self.location.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl ArtifactStore for FileStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| self.unavailable(e))?;

        let tmp = self
            .root
            .join(format!(".{key}.{:016x}.tmp", rand::random::<u64>()));
        if let Err(source) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::Io { path: tmp, source });
        }
        if let Err(source) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StoreError::Io { path, source });
        }

        tracing::trace!(key, bytes = bytes.len(), root = %self.root.display(), "stored record");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    async fn list_keys(&self) -> StoreResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.unavailable(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| self.unavailable(e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            keys.push(name);
        }
        keys.sort();
        Ok(keys)
    }

    fn location(&self) -> &StoreLocation {
        &self.location
    }
}
