//! Cloud bucket artifact store (`gs://`, `s3://`, `az://`)

use super::traits::{ArtifactStore, StoreResult};
use super::{StoreLocation, validate_key};
use crate::error::StoreError;
use async_trait::async_trait;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;

/// Artifact store in an object storage bucket
///
/// The URI host names the bucket (or container) and its path is the key
/// prefix, so `gs://bucket/run-1` keeps `7.skel` at `run-1/7.skel`.
/// Credentials and region come from the provider's usual environment
/// variables. Object puts are atomic, so no temporary keys are needed.
#[derive(Debug, Clone)]
pub struct ObjectStoreBackend {
    location: StoreLocation,
    store: Arc<dyn ObjectStore>,
    prefix: ObjectPath,
}

impl ObjectStoreBackend {
    /// Build a client for a bucket location
    ///
    /// No request is made until first use.
    pub fn open(location: StoreLocation) -> StoreResult<Self> {
        let url = location.as_str();
        let store: object_store::Result<Arc<dyn ObjectStore>> = match location.scheme() {
            "gs" => GoogleCloudStorageBuilder::from_env()
                .with_url(url)
                .build()
                .map(|s| Arc::new(s) as Arc<dyn ObjectStore>),
            "s3" => AmazonS3Builder::from_env()
                .with_url(url)
                .build()
                .map(|s| Arc::new(s) as Arc<dyn ObjectStore>),
            "az" => MicrosoftAzureBuilder::from_env()
                .with_url(url)
                .build()
                .map(|s| Arc::new(s) as Arc<dyn ObjectStore>),
            other => {
                return Err(StoreError::UnsupportedScheme {
                    scheme: other.to_string(),
                    location: location.to_string(),
                });
            }
        };
        let store = store.map_err(|e| StoreError::InvalidLocation {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::with_store(location, store))
    }

    /// Use an already-built object store, keeping keys under the location's path
    pub fn with_store(location: StoreLocation, store: Arc<dyn ObjectStore>) -> Self {
        let prefix = ObjectPath::from(location.url().path().trim_matches('/'));
        Self {
            location,
            store,
            prefix,
        }
    }

    /// Key prefix inside the bucket
    pub fn prefix(&self) -> &ObjectPath {
        &self.prefix
    }

    fn path_for(&self, key: &str) -> StoreResult<ObjectPath> {
        validate_key(key)?;
        Ok(self.prefix.child(key))
    }

    fn unavailable(&self, e: object_store::Error) -> StoreError {
        StoreError::Unavailable {
            location: self.location.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl ArtifactStore for ObjectStoreBackend {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let len = bytes.len();
        self.store
            .put(&path, PutPayload::from(bytes))
            .await
            .map_err(|e| self.unavailable(e))?;
        tracing::trace!(key, bytes = len, location = %self.location, "stored record");
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match self.store.get(&path).await {
            Ok(result) => {
                let bytes = result.bytes().await.map_err(|e| self.unavailable(e))?;
                Ok(Some(bytes.to_vec()))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    async fn list_keys(&self) -> StoreResult<Vec<String>> {
        let prefix = (!self.prefix.as_ref().is_empty()).then_some(&self.prefix);
        let listing = self
            .store
            .list_with_delimiter(prefix)
            .await
            .map_err(|e| self.unavailable(e))?;

        let mut keys: Vec<String> = listing
            .objects
            .iter()
            .filter_map(|meta| meta.location.filename())
            .filter(|name| !name.starts_with('.'))
            .map(str::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn location(&self) -> &StoreLocation {
        &self.location
    }
}
