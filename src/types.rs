//! Core types for skel-queue

use serde::{Deserialize, Serialize};

/// Unique identifier for a neuron (segmentation root id)
///
/// Uniqueness within a run is assumed, not enforced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootId(pub u64);

impl RootId {
    /// Create a new RootId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RootId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<RootId> for u64 {
    fn from(id: RootId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RootId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RootId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Soma location in nanometer coordinates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SomaPoint(pub [f64; 3]);

impl SomaPoint {
    /// Create a soma point from its x, y, z coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self([x, y, z])
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &[f64; 3]) -> f64 {
        self.0
            .iter()
            .zip(other.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl From<[f64; 3]> for SomaPoint {
    fn from(p: [f64; 3]) -> Self {
        Self(p)
    }
}

/// One row of the input table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// The neuron to skeletonize
    pub root_id: RootId,
    /// Where the soma sits; becomes the skeleton root
    pub soma_point: SomaPoint,
    /// Per-item soma radius override (None = compute default)
    #[serde(default)]
    pub soma_radius: Option<f64>,
}

/// Durable marker written when an item fails
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Human-readable failure message
    pub error: String,
}

impl ErrorRecord {
    /// Create an error record from any displayable failure
    pub fn new(error: impl std::fmt::Display) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// What a single task execution did
///
/// Outcomes are only used for logging and run statistics; the durable
/// result of a task lives in the artifact store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    /// An artifact already existed; nothing was computed or written
    Skipped,
    /// A new artifact was written
    Stored {
        /// Size of the artifact in bytes
        bytes: usize,
    },
    /// The computation failed and an error record was written
    Failed {
        /// The message stored in the error record
        message: String,
    },
}
