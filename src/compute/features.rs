//! Derived per-vertex properties

use super::skeleton::Skeleton;
use crate::error::ComputeError;
use crate::service::{RemoteDataService, VolumeProperties};
use crate::types::RootId;
use serde::{Deserialize, Serialize};

/// Unbranched segments of a skeleton
///
/// A segment runs from a branch point (or the root) to the next branch point
/// or tip. The root alone is segment 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentProperties {
    /// Segment id of every vertex
    pub segment: Vec<usize>,
    /// Cable length of every segment (nm), indexed by segment id
    pub length_nm: Vec<f64>,
}

/// Assign vertices to segments and measure segment lengths
pub fn segment_properties(skeleton: &Skeleton) -> SegmentProperties {
    let mut segment = vec![0usize; skeleton.len()];
    let mut length_nm = vec![0.0];

    for &v in skeleton.topological_order() {
        let Some(parent) = skeleton.parents[v] else {
            continue;
        };
        let continues = parent != skeleton.root && skeleton.children(parent).len() == 1;
        let id = if continues {
            segment[parent]
        } else {
            length_nm.push(0.0);
            length_nm.len() - 1
        };
        segment[v] = id;
        length_nm[id] += skeleton.edge_length(v);
    }

    SegmentProperties { segment, length_nm }
}

/// Fetch volumetric properties and check they cover every vertex
pub async fn volumetric_properties(
    service: &dyn RemoteDataService,
    root_id: RootId,
    skeleton: &Skeleton,
) -> Result<VolumeProperties, ComputeError> {
    let props = service
        .volumetric_properties(root_id, &skeleton.vertices)
        .await?;

    let n = skeleton.len();
    if props.area_nm2.len() != n || props.volume_nm3.len() != n {
        return Err(ComputeError::Enrichment(format!(
            "volumetric properties cover {} areas and {} volumes for {n} vertices",
            props.area_nm2.len(),
            props.volume_nm3.len()
        )));
    }
    Ok(props)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::RawSkeleton;

    /// 0 - 1 - 2 - 3
    ///          \
    ///           4 - 5
    fn branched() -> Skeleton {
        let raw = RawSkeleton {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [2.0, 0.0, 0.0],
                [3.0, 0.0, 0.0],
                [2.0, 1.0, 0.0],
                [2.0, 2.0, 0.0],
            ],
            edges: vec![[0, 1], [1, 2], [2, 3], [2, 4], [4, 5]],
            root: 0,
            ..Default::default()
        };
        Skeleton::from_raw(RootId(1), &raw).unwrap()
    }

    #[test]
    fn branch_points_start_new_segments() {
        let props = segment_properties(&branched());

        assert_eq!(props.segment[0], 0);
        // 1 and 2 share the segment leaving the root
        assert_eq!(props.segment[1], props.segment[2]);
        assert_ne!(props.segment[1], 0);
        // each branch after vertex 2 is its own segment
        assert_ne!(props.segment[3], props.segment[2]);
        assert_ne!(props.segment[4], props.segment[2]);
        assert_ne!(props.segment[3], props.segment[4]);
        assert_eq!(props.segment[4], props.segment[5]);
        assert_eq!(props.length_nm.len(), 4);
    }

    #[test]
    fn segment_lengths_sum_to_cable_length() {
        let props = segment_properties(&branched());

        assert_eq!(props.length_nm[0], 0.0);
        assert_eq!(props.length_nm[props.segment[1]], 2.0);
        assert_eq!(props.length_nm[props.segment[5]], 2.0);
        assert_eq!(props.length_nm.iter().sum::<f64>(), 5.0);
    }

    #[test]
    fn root_children_each_start_a_segment() {
        let raw = RawSkeleton {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            edges: vec![[0, 1]],
            root: 0,
            ..Default::default()
        };
        let skel = Skeleton::from_raw(RootId(1), &raw).unwrap();
        let props = segment_properties(&skel);
        assert_eq!(props.segment, vec![0, 1]);
        assert_eq!(props.length_nm, vec![0.0, 1.0]);
    }
}
