//! Task unit: one work item bound to everything needed to run it

use super::ExecutionContext;
use crate::compute::ComputeRequest;
use crate::config::{RetryConfig, RunConfig};
use crate::error::{ComputeError, Error, StoreError};
use crate::retry::retry_store;
use crate::service::{DatasetInfo, RemoteDataService, ServiceParams};
use crate::store::{ArtifactStore, StoreLocation, artifact_key, error_key};
use crate::types::{ErrorRecord, RootId, TaskOutcome, WorkItem};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;

/// Run parameters captured by value into every task
///
/// A snapshot of the [`RunConfig`] fields a task reads, plus the dataset
/// info fetched once at generation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskParams {
    /// Where the artifact or error record goes
    pub output_location: StoreLocation,
    /// Datastack name
    pub datastack: String,
    /// Remote data service address
    pub server_address: String,
    /// Snapshot to query at
    pub timestamp: Option<DateTime<Utc>>,
    /// Collapse the soma into the skeleton root
    pub collapse_soma: bool,
    /// Minimum split quality for an axon split
    pub split_threshold: f64,
    /// Dataset info cached by the generator; fetched by the task when absent
    #[serde(default)]
    pub dataset_info: Option<DatasetInfo>,
    /// Store write retry policy
    #[serde(default)]
    pub retry: RetryConfig,
}

impl TaskParams {
    /// Snapshot the parts of `config` a task needs
    pub fn from_config(config: &RunConfig, dataset_info: Option<DatasetInfo>) -> Self {
        Self {
            output_location: config.output_location.clone(),
            datastack: config.datastack.clone(),
            server_address: config.server_address.clone(),
            timestamp: config.timestamp,
            collapse_soma: config.collapse_soma,
            split_threshold: config.split_threshold,
            dataset_info,
            retry: config.retry.clone(),
        }
    }

    fn service_params(&self) -> ServiceParams {
        ServiceParams {
            datastack: self.datastack.clone(),
            server_address: self.server_address.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// The smallest schedulable unit of work
///
/// Owns all of its data, so it can be moved onto any worker or serialized
/// and sent to another process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskUnit {
    /// The item to process
    pub item: WorkItem,
    /// Run parameters
    pub params: TaskParams,
}

impl TaskUnit {
    /// Create a task for `item`
    pub fn new(item: WorkItem, params: TaskParams) -> Self {
        Self { item, params }
    }

    /// Root id of the item
    pub fn root_id(&self) -> RootId {
        self.item.root_id
    }

    /// Run the task to completion
    ///
    /// Skips when an artifact already exists. Any failure while computing or
    /// storing is written as an error record and reported as
    /// [`TaskOutcome::Failed`]. `Err` is returned only when the store cannot
    /// take the error record either.
    pub async fn execute(&self, ctx: &ExecutionContext) -> Result<TaskOutcome, StoreError> {
        let root_id = self.root_id();
        let store = ctx.connector.open_store(&self.params.output_location)?;

        let failure = match self.attempt(ctx, store.as_ref()).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) => e,
        };

        let message = failure.to_string();
        tracing::warn!(
            root_id = %root_id,
            error = %message,
            kind = failure.kind(),
            "task failed, writing error record"
        );

        let key = error_key(root_id);
        let record = ErrorRecord::new(&message);
        retry_store(&self.params.retry, "put_error", || store.put_error(&key, &record))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    root_id = %root_id,
                    error = %e,
                    "could not write error record"
                );
            })?;

        Ok(TaskOutcome::Failed { message })
    }

    async fn attempt(
        &self,
        ctx: &ExecutionContext,
        store: &dyn ArtifactStore,
    ) -> Result<TaskOutcome, Error> {
        let root_id = self.root_id();
        let key = artifact_key(root_id);
        let exists = retry_store(&self.params.retry, "exists", || store.exists(&key)).await?;
        if exists {
            tracing::debug!(root_id = %root_id, "artifact exists, skipping");
            return Ok(TaskOutcome::Skipped);
        }

        let service = ctx.connector.connect_service(&self.params.service_params())?;

        let dataset_info = match &self.params.dataset_info {
            Some(info) => info.clone(),
            None => service.dataset_info().await?,
        };

        let request = ComputeRequest {
            root_id,
            soma_point: self.item.soma_point,
            soma_radius: self.item.soma_radius,
            timestamp: self.params.timestamp,
            collapse_soma: self.params.collapse_soma,
            split_threshold: self.params.split_threshold,
            synapse_table: dataset_info.synapse_table,
        };
        let bytes = run_compute(ctx, &request, service.as_ref()).await?;

        let len = bytes.len();
        retry_store(&self.params.retry, "put", || store.put(&key, bytes.clone())).await?;
        tracing::info!(root_id = %root_id, bytes = len, "stored artifact");
        Ok(TaskOutcome::Stored { bytes: len })
    }
}

/// Run the compute step, turning a panic into a [`ComputeError::Panicked`]
async fn run_compute(
    ctx: &ExecutionContext,
    request: &ComputeRequest,
    service: &dyn RemoteDataService,
) -> Result<Vec<u8>, ComputeError> {
    AssertUnwindSafe(ctx.compute.compute(request, service))
        .catch_unwind()
        .await
        .map_err(|payload| ComputeError::Panicked(panic_message(payload.as_ref())))?
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
