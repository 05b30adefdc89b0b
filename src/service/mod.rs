//! Remote data service
//!
//! The [`RemoteDataService`] trait is everything the pipeline needs from the
//! connectomics backend: dataset metadata, the current materialization
//! timestamp, skeleton queries, and per-vertex volumetric properties.
//! [`HttpDataService`] is the production client.
//!
//! Service handles are not shared between tasks. Each task connects its own
//! through a [`crate::task::Connector`] and drops it when it finishes.

mod http;

pub use http::HttpDataService;

use crate::config::RunConfig;
use crate::error::ComputeError;
use crate::types::RootId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything needed to (re)connect to the remote service
///
/// Plain values only, so it can be captured into a task and sent anywhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceParams {
    /// Datastack name
    pub datastack: String,
    /// Service address
    pub server_address: String,
    /// Snapshot to query at (None = latest)
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&RunConfig> for ServiceParams {
    fn from(config: &RunConfig) -> Self {
        Self {
            datastack: config.datastack.clone(),
            server_address: config.server_address.clone(),
            timestamp: config.timestamp,
        }
    }
}

/// Dataset metadata, fetched once per run and handed to every task
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Table holding synapses; skeletons get no synapses when absent
    #[serde(default)]
    pub synapse_table: Option<String>,
    /// Segmentation source the skeletons are derived from
    #[serde(default)]
    pub segmentation_source: Option<String>,
}

/// Parameters of a single skeleton query
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkeletonRequest {
    /// Neuron to skeletonize
    pub root_id: RootId,
    /// Point that becomes the skeleton root (nm)
    pub root_point: [f64; 3],
    /// Collapse vertices within `collapse_radius` of the root
    pub collapse_soma: bool,
    /// Soma collapse radius (nm)
    pub collapse_radius: f64,
    /// Snapshot to query at
    pub timestamp: Option<DateTime<Utc>>,
    /// Synapse table to attach synapses from
    pub synapse_table: Option<String>,
    /// Fail instead of returning a partial skeleton
    pub require_complete: bool,
}

/// A synapse attached to a skeleton vertex
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synapse {
    /// Synapse id in the synapse table
    pub id: u64,
    /// Index of the skeleton vertex the synapse maps to
    pub vertex: usize,
}

/// Skeleton as returned by the service, before validation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSkeleton {
    /// Vertex positions (nm)
    pub vertices: Vec<[f64; 3]>,
    /// Undirected edges between vertex indices
    pub edges: Vec<[usize; 2]>,
    /// Index of the root vertex
    pub root: usize,
    /// Presynaptic sites (outputs)
    #[serde(default)]
    pub pre_syn: Vec<Synapse>,
    /// Postsynaptic sites (inputs)
    #[serde(default)]
    pub post_syn: Vec<Synapse>,
}

/// Per-vertex volumetric properties
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeProperties {
    /// Surface area around each vertex (nm^2)
    pub area_nm2: Vec<f64>,
    /// Volume around each vertex (nm^3)
    pub volume_nm3: Vec<f64>,
}

/// Connectomics backend used by the per-item computation
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    /// Timestamp of the most recent materialization
    async fn materialization_timestamp(&self) -> Result<DateTime<Utc>, ComputeError>;

    /// Dataset metadata
    async fn dataset_info(&self) -> Result<DatasetInfo, ComputeError>;

    /// Query the skeleton of one neuron
    async fn fetch_skeleton(&self, request: &SkeletonRequest) -> Result<RawSkeleton, ComputeError>;

    /// Volumetric properties for the given skeleton vertices
    async fn volumetric_properties(
        &self,
        root_id: RootId,
        vertices: &[[f64; 3]],
    ) -> Result<VolumeProperties, ComputeError>;
}
