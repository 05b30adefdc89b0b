//! Per-task backend handles

use crate::compute::{ItemCompute, SkeletonCompute};
use crate::error::ComputeError;
use crate::service::{HttpDataService, RemoteDataService, ServiceParams};
use crate::store::{self, ArtifactStore, StoreLocation, StoreResult};
use std::sync::Arc;

/// Builds the service and store handles a task needs
///
/// Handles are not portable between tasks, so every task asks the connector
/// for fresh ones from the plain parameters it carries.
pub trait Connector: Send + Sync {
    /// Connect to the remote data service
    fn connect_service(
        &self,
        params: &ServiceParams,
    ) -> Result<Box<dyn RemoteDataService>, ComputeError>;

    /// Open the artifact store at `location`
    fn open_store(&self, location: &StoreLocation) -> StoreResult<Arc<dyn ArtifactStore>>;
}

/// Production connector: HTTP service client and URI-selected store backend
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    fn connect_service(
        &self,
        params: &ServiceParams,
    ) -> Result<Box<dyn RemoteDataService>, ComputeError> {
        Ok(Box::new(HttpDataService::connect(params)?))
    }

    fn open_store(&self, location: &StoreLocation) -> StoreResult<Arc<dyn ArtifactStore>> {
        store::open_store(location)
    }
}

/// Collaborators shared read-only by every task of a run
#[derive(Clone)]
pub struct ExecutionContext {
    /// Source of service and store handles
    pub connector: Arc<dyn Connector>,
    /// Per-item computation
    pub compute: Arc<dyn ItemCompute>,
}

impl ExecutionContext {
    /// Context with explicit collaborators
    pub fn new(connector: Arc<dyn Connector>, compute: Arc<dyn ItemCompute>) -> Self {
        Self { connector, compute }
    }

    /// HTTP service, URI-selected store, skeleton compute
    pub fn production() -> Self {
        Self::new(Arc::new(HttpConnector), Arc::new(SkeletonCompute))
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext").finish_non_exhaustive()
    }
}
