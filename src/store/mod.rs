//! Artifact store
//!
//! A blob store keyed by root id that records the durable outcome of every
//! task. The core abstraction is the [`ArtifactStore`] trait; backends are
//! selected by the URI scheme of a [`StoreLocation`]:
//!
//! - `file://` ([`FileStore`]): a directory on the local filesystem
//! - `mem://` ([`MemoryStore`]): a named in-process store, shared by every
//!   handle opened on the same name (dry runs and tests)
//! - `gs://`, `s3://`, `az://` ([`ObjectStoreBackend`]): a cloud bucket, with
//!   the URI path as key prefix
//!
//! ## Key layout
//!
//! | key | content |
//! |---|---|
//! | `{root_id}.skel` | serialized skeleton artifact |
//! | `{root_id}.error` | JSON error record `{"error": "..."}` |
//!
//! Only the artifact key counts as completion.

mod file;
mod memory;
mod object;
mod traits;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use object::ObjectStoreBackend;
pub use traits::{ArtifactStore, StoreResult};

use crate::error::StoreError;
use crate::types::RootId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Suffix of artifact keys
pub const ARTIFACT_SUFFIX: &str = "skel";
/// Suffix of error record keys
pub const ERROR_SUFFIX: &str = "error";

/// Key under which the artifact for `root_id` is stored
pub fn artifact_key(root_id: RootId) -> String {
    format!("{root_id}.{ARTIFACT_SUFFIX}")
}

/// Key under which the error record for `root_id` is stored
pub fn error_key(root_id: RootId) -> String {
    format!("{root_id}.{ERROR_SUFFIX}")
}

/// Kind of record a store key holds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// A skeleton artifact
    Artifact,
    /// An error record
    Error,
}

/// Split a store key back into its root id and record kind
///
/// Returns None for keys that do not follow the key layout.
pub fn classify_key(key: &str) -> Option<(RootId, RecordKind)> {
    let (stem, suffix) = key.rsplit_once('.')?;
    let kind = match suffix {
        ARTIFACT_SUFFIX => RecordKind::Artifact,
        ERROR_SUFFIX => RecordKind::Error,
        _ => return None,
    };
    let root_id = stem.parse().ok()?;
    Some((root_id, kind))
}

/// Store location: a URI with a supported scheme
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreLocation(url::Url);

impl StoreLocation {
    /// Parse a location URI, rejecting schemes with no backend
    pub fn parse(location: &str) -> StoreResult<Self> {
        let url = url::Url::parse(location).map_err(|e| StoreError::InvalidLocation {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
        match url.scheme() {
            "file" | "mem" | "gs" | "s3" | "az" => Ok(Self(url)),
            other => Err(StoreError::UnsupportedScheme {
                scheme: other.to_string(),
                location: location.to_string(),
            }),
        }
    }

    /// The location as a string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The URI scheme (`file`, `mem`, `gs`, `s3` or `az`)
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// The underlying URL
    pub fn url(&self) -> &url::Url {
        &self.0
    }
}

impl std::fmt::Display for StoreLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for StoreLocation {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StoreLocation> for String {
    fn from(location: StoreLocation) -> Self {
        location.0.into()
    }
}

/// Open a fresh handle to the store at `location`
///
/// Handles are cheap; tasks open their own rather than sharing one.
pub fn open_store(location: &StoreLocation) -> StoreResult<Arc<dyn ArtifactStore>> {
    match location.scheme() {
        "file" => Ok(Arc::new(FileStore::open(location.clone())?)),
        "mem" => Ok(Arc::new(MemoryStore::named(location.clone()))),
        "gs" | "s3" | "az" => Ok(Arc::new(ObjectStoreBackend::open(location.clone())?)),
        other => Err(StoreError::UnsupportedScheme {
            scheme: other.to_string(),
            location: location.to_string(),
        }),
    }
}

/// Reject keys that could escape a store root
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty()
        || key.starts_with('.')
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
    {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}
