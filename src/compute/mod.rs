//! Per-item computation
//!
//! [`ItemCompute`] turns one work item into artifact bytes. The production
//! implementation, [`SkeletonCompute`], queries the skeleton from the remote
//! service, decides the axon split, enriches it with segment and volumetric
//! properties, and serializes the result as JSON.
//!
//! Compute never touches the artifact store; the task unit owns all writes.

mod features;
mod skeleton;
mod split;

pub use features::{SegmentProperties, segment_properties, volumetric_properties};
pub use skeleton::Skeleton;
pub use split::{AxonSplit, NO_EVIDENCE_QUALITY, split_axon};

use crate::error::ComputeError;
use crate::service::{RemoteDataService, SkeletonRequest, Synapse, VolumeProperties};
use crate::types::{RootId, SomaPoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Soma radius (nm) used when an item does not provide one
pub const DEFAULT_SOMA_RADIUS: f64 = 7_500.0;

/// Everything one computation needs, resolved by the task unit
#[derive(Clone, Debug, PartialEq)]
pub struct ComputeRequest {
    /// Neuron to skeletonize
    pub root_id: RootId,
    /// Skeleton root location
    pub soma_point: SomaPoint,
    /// Per-item soma radius; None falls back to [`DEFAULT_SOMA_RADIUS`]
    pub soma_radius: Option<f64>,
    /// Snapshot to query at
    pub timestamp: Option<DateTime<Utc>>,
    /// Collapse skeleton vertices inside the soma
    pub collapse_soma: bool,
    /// Minimum segregation index for an axon split
    pub split_threshold: f64,
    /// Synapse table to attach synapses from
    pub synapse_table: Option<String>,
}

impl ComputeRequest {
    /// The soma radius actually used
    pub fn effective_soma_radius(&self) -> f64 {
        self.soma_radius.unwrap_or(DEFAULT_SOMA_RADIUS)
    }
}

/// Compute one artifact for one item
#[async_trait]
pub trait ItemCompute: Send + Sync {
    /// Produce the artifact bytes, or fail with a message worth recording
    async fn compute(
        &self,
        request: &ComputeRequest,
        service: &dyn RemoteDataService,
    ) -> Result<Vec<u8>, ComputeError>;
}

/// Serialized form of a computed skeleton
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkeletonArtifact {
    /// Neuron this skeleton belongs to
    pub root_id: RootId,
    /// Snapshot the skeleton was computed at
    pub timestamp: Option<DateTime<Utc>>,
    /// Soma radius used for collapsing
    pub soma_radius: f64,
    /// Vertex positions (nm)
    pub vertices: Vec<[f64; 3]>,
    /// Parent of each vertex; None for the root
    pub parents: Vec<Option<usize>>,
    /// Root vertex index
    pub root: usize,
    /// Presynaptic sites
    pub pre_syn: Vec<Synapse>,
    /// Postsynaptic sites
    pub post_syn: Vec<Synapse>,
    /// Axon split decision
    pub axon: AxonLabel,
    /// Unbranched segments
    pub segments: SegmentProperties,
    /// Per-vertex volumetric properties
    pub volumes: VolumeProperties,
}

/// Axon split as stored in the artifact
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxonLabel {
    /// Sorted axon vertex indices; empty when no split was made
    pub is_axon: Vec<usize>,
    /// Segregation index of the best cut
    pub split_quality: f64,
}

impl From<AxonSplit> for AxonLabel {
    fn from(split: AxonSplit) -> Self {
        Self {
            is_axon: split.is_axon,
            split_quality: split.quality,
        }
    }
}

/// Production compute: skeleton query plus post-processing
#[derive(Debug, Clone, Copy, Default)]
pub struct SkeletonCompute;

#[async_trait]
impl ItemCompute for SkeletonCompute {
    async fn compute(
        &self,
        request: &ComputeRequest,
        service: &dyn RemoteDataService,
    ) -> Result<Vec<u8>, ComputeError> {
        let soma_radius = request.effective_soma_radius();
        let raw = service
            .fetch_skeleton(&SkeletonRequest {
                root_id: request.root_id,
                root_point: request.soma_point.0,
                collapse_soma: request.collapse_soma,
                collapse_radius: soma_radius,
                timestamp: request.timestamp,
                synapse_table: request.synapse_table.clone(),
                require_complete: true,
            })
            .await?;

        let skeleton = Skeleton::from_raw(request.root_id, &raw)?;
        let split = split_axon(
            &skeleton,
            &raw.pre_syn,
            &raw.post_syn,
            request.split_threshold,
        );
        if !split.is_split() {
            tracing::debug!(
                root_id = %request.root_id,
                quality = split.quality,
                "no axon split"
            );
        }

        let segments = segment_properties(&skeleton);
        let volumes = volumetric_properties(service, request.root_id, &skeleton).await?;

        let artifact = SkeletonArtifact {
            root_id: request.root_id,
            timestamp: request.timestamp,
            soma_radius,
            vertices: skeleton.vertices,
            parents: skeleton.parents,
            root: skeleton.root,
            pre_syn: raw.pre_syn,
            post_syn: raw.post_syn,
            axon: split.into(),
            segments,
            volumes,
        };
        Ok(serde_json::to_vec(&artifact)?)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{DatasetInfo, RawSkeleton};
    use std::sync::Mutex;

    /// Serves one fixed skeleton and records the requests it saw
    struct FixedService {
        skeleton: RawSkeleton,
        volumes_for: Option<usize>,
        requests: Mutex<Vec<SkeletonRequest>>,
    }

    impl FixedService {
        fn new(skeleton: RawSkeleton) -> Self {
            let n = skeleton.vertices.len();
            Self {
                skeleton,
                volumes_for: Some(n),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RemoteDataService for FixedService {
        async fn materialization_timestamp(&self) -> Result<DateTime<Utc>, ComputeError> {
            Ok(Utc::now())
        }

        async fn dataset_info(&self) -> Result<DatasetInfo, ComputeError> {
            Ok(DatasetInfo::default())
        }

        async fn fetch_skeleton(
            &self,
            request: &SkeletonRequest,
        ) -> Result<RawSkeleton, ComputeError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.skeleton.clone())
        }

        async fn volumetric_properties(
            &self,
            _root_id: RootId,
            _vertices: &[[f64; 3]],
        ) -> Result<VolumeProperties, ComputeError> {
            let n = self
                .volumes_for
                .ok_or_else(|| ComputeError::Service("volumes offline".into()))?;
            Ok(VolumeProperties {
                area_nm2: vec![1.0; n],
                volume_nm3: vec![2.0; n],
            })
        }
    }

    fn line() -> RawSkeleton {
        RawSkeleton {
            vertices: vec![[0.0, 0.0, 0.0], [5.0, 0.0, 0.0], [-5.0, 0.0, 0.0]],
            edges: vec![[0, 1], [0, 2]],
            root: 0,
            pre_syn: vec![Synapse { id: 1, vertex: 1 }],
            post_syn: vec![Synapse { id: 2, vertex: 2 }],
        }
    }

    fn request(soma_radius: Option<f64>) -> ComputeRequest {
        ComputeRequest {
            root_id: RootId(42),
            soma_point: SomaPoint::new(0.0, 0.0, 0.0),
            soma_radius,
            timestamp: None,
            collapse_soma: true,
            split_threshold: 0.6,
            synapse_table: Some("synapses".into()),
        }
    }

    #[tokio::test]
    async fn missing_radius_uses_default() {
        let service = FixedService::new(line());
        SkeletonCompute
            .compute(&request(None), &service)
            .await
            .unwrap();

        let seen = service.requests.lock().unwrap();
        assert_eq!(seen[0].collapse_radius, DEFAULT_SOMA_RADIUS);
        assert_eq!(seen[0].synapse_table.as_deref(), Some("synapses"));
    }

    #[tokio::test]
    async fn explicit_radius_is_forwarded() {
        let service = FixedService::new(line());
        SkeletonCompute
            .compute(&request(Some(3000.0)), &service)
            .await
            .unwrap();
        assert_eq!(service.requests.lock().unwrap()[0].collapse_radius, 3000.0);
    }

    #[tokio::test]
    async fn artifact_contains_split_and_enrichment() {
        let service = FixedService::new(line());
        let bytes = SkeletonCompute
            .compute(&request(None), &service)
            .await
            .unwrap();

        let artifact: SkeletonArtifact = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(artifact.root_id, RootId(42));
        assert_eq!(artifact.soma_radius, DEFAULT_SOMA_RADIUS);
        assert_eq!(artifact.axon.is_axon, vec![1]);
        assert_eq!(artifact.segments.segment, vec![0, 1, 2]);
        assert_eq!(artifact.volumes.area_nm2.len(), 3);
    }

    #[tokio::test]
    async fn skeleton_without_synapses_is_not_an_error() {
        let mut raw = line();
        raw.pre_syn.clear();
        let service = FixedService::new(raw);

        let bytes = SkeletonCompute
            .compute(&request(None), &service)
            .await
            .unwrap();
        let artifact: SkeletonArtifact = serde_json::from_slice(&bytes).unwrap();
        assert!(artifact.axon.is_axon.is_empty());
        assert_eq!(artifact.axon.split_quality, NO_EVIDENCE_QUALITY);
    }

    #[tokio::test]
    async fn mismatched_volumes_fail_enrichment() {
        let mut service = FixedService::new(line());
        service.volumes_for = Some(1);

        let result = SkeletonCompute.compute(&request(None), &service).await;
        assert!(matches!(result, Err(ComputeError::Enrichment(_))));
    }

    #[tokio::test]
    async fn service_failure_propagates() {
        let mut service = FixedService::new(line());
        service.volumes_for = None;

        let result = SkeletonCompute.compute(&request(None), &service).await;
        assert!(matches!(result, Err(ComputeError::Service(_))));
    }
}
