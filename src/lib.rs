//! # skel-queue
//!
//! Idempotent, failure-isolated batch skeletonization.
//!
//! Every row of an input table names one neuron (a root id and a soma point).
//! Each row becomes a [`TaskUnit`]; a [`TaskExecutor`] runs the units on a
//! bounded worker pool. A unit writes exactly one durable record to the
//! artifact store: the skeleton artifact, or an error record when anything
//! went wrong. Units whose artifact already exists do nothing, so a run can
//! be repeated until every item is done.
//!
//! ## Quick Start
//!
//! ```no_run
//! use skel_queue::{ExecutionContext, RunConfig, pipeline};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::from_env_file(Path::new("run.env"))?;
//!     pipeline::run(config, Arc::new(ExecutionContext::production())).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Per-item skeleton computation
pub mod compute;
/// Run configuration
pub mod config;
/// Error types
pub mod error;
/// End-to-end runs
pub mod pipeline;
/// Retry logic with exponential backoff
pub mod retry;
/// Remote data service
pub mod service;
/// Artifact store
pub mod store;
/// Input table loading
pub mod table;
/// Task generation and execution
pub mod task;
/// Core types
pub mod types;

// Re-export commonly used types
pub use compute::{DEFAULT_SOMA_RADIUS, ItemCompute, SkeletonCompute};
pub use config::{RetryConfig, RunConfig};
pub use error::{ComputeError, Error, Result, StoreError};
pub use service::{DatasetInfo, HttpDataService, RemoteDataService};
pub use store::{ArtifactStore, FileStore, MemoryStore, ObjectStoreBackend, StoreLocation};
pub use table::InputTable;
pub use task::{
    Connector, ExecutionContext, HttpConnector, TaskExecutor, TaskParams, TaskUnit,
    generate_tasks,
};
pub use types::{ErrorRecord, RootId, SomaPoint, TaskOutcome, WorkItem};
