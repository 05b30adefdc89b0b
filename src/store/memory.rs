//! In-process artifact store (`mem://`)

use super::traits::{ArtifactStore, StoreResult};
use super::{StoreLocation, validate_key};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::sync::RwLock;

/// Every named memory store opened in this process
///
/// Entries live until [`MemoryStore::forget`] removes them or the process exits.
static REGISTRY: OnceLock<Mutex<HashMap<String, MemoryStore>>> = OnceLock::new();

#[derive(Debug, Default)]
struct Inner {
    records: RwLock<BTreeMap<String, Vec<u8>>>,
    exists_calls: AtomicUsize,
    put_calls: AtomicUsize,
    unavailable: AtomicBool,
}

/// Artifact store held in memory
///
/// Handles opened on the same `mem://` location share one map, so a task
/// that re-opens its store sees what other tasks wrote. Call counters and a
/// switchable outage make it usable as an instrumented store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    location: StoreLocation,
    inner: Arc<Inner>,
}

impl MemoryStore {
    /// Open (or create) the shared store registered under `location`
    pub fn named(location: StoreLocation) -> Self {
        let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        let mut guard = registry.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(location.to_string())
            .or_insert_with(|| Self::detached(location.clone()))
            .clone()
    }

    /// Drop the registry entry for `location`
    ///
    /// Handles already open keep their records; the next [`MemoryStore::named`]
    /// on the same location starts empty. Returns whether an entry existed.
    pub fn forget(location: &StoreLocation) -> bool {
        let Some(registry) = REGISTRY.get() else {
            return false;
        };
        registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(location.as_str())
            .is_some()
    }

    /// A private store not reachable through [`super::open_store`]
    pub fn detached(location: StoreLocation) -> Self {
        Self {
            location,
            inner: Arc::new(Inner::default()),
        }
    }

    /// Number of `exists` calls served so far
    pub fn exists_calls(&self) -> usize {
        self.inner.exists_calls.load(Ordering::SeqCst)
    }

    /// Number of writes (artifacts and error records) attempted so far
    pub fn put_calls(&self) -> usize {
        self.inner.put_calls.load(Ordering::SeqCst)
    }

    /// Simulate the store becoming unreachable (or reachable again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Remove every record
    pub async fn clear(&self) {
        self.inner.records.write().await.clear();
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                location: self.location.to_string(),
                reason: "store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists_calls.fetch_add(1, Ordering::SeqCst);
        validate_key(key)?;
        self.check_available()?;
        Ok(self.inner.records.read().await.contains_key(key))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        self.inner.put_calls.fetch_add(1, Ordering::SeqCst);
        validate_key(key)?;
        self.check_available()?;
        self.inner
            .records
            .write()
            .await
            .insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        self.check_available()?;
        Ok(self.inner.records.read().await.get(key).cloned())
    }

    async fn list_keys(&self) -> StoreResult<Vec<String>> {
        self.check_available()?;
        Ok(self.inner.records.read().await.keys().cloned().collect())
    }

    fn location(&self) -> &StoreLocation {
        &self.location
    }
}
