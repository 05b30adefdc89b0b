//! End-to-end runs
//!
//! [`run`] is the whole pipeline for one configuration: load the input
//! table, pin the materialization timestamp, fetch dataset info once,
//! generate tasks and execute them. [`write_template`] renders a ready-to-run
//! env file with the timestamp pinned.

use crate::config::{RunConfig, format_timestamp};
use crate::error::{Error, Result};
use crate::service::{DatasetInfo, RemoteDataService, ServiceParams};
use crate::table::InputTable;
use crate::task::{Connector, ExecutionContext, TaskExecutor, bind_tasks, read_items};
use std::path::Path;
use std::sync::Arc;

/// Load the configuration at `path` and run it
pub async fn run_env_file(path: &Path, ctx: Arc<ExecutionContext>) -> Result<()> {
    let config = RunConfig::from_env_file(path)?;
    run(config, ctx).await
}

/// Run every row of the configured input table
///
/// Configuration problems (including missing table columns and unreadable
/// cells) fail before the remote service is contacted. Per-item failures
/// never surface here; they end up as error records in the output store.
pub async fn run(mut config: RunConfig, ctx: Arc<ExecutionContext>) -> Result<()> {
    config.validate()?;
    let table = InputTable::load(&config.input_table).await?;
    let items = read_items(&table, &config)?;

    let dataset_info = {
        let service = ctx
            .connector
            .connect_service(&ServiceParams::from(&config))
            .map_err(|e| Error::Service(e.to_string()))?;
        pin_timestamp(&mut config, service.as_ref()).await?;
        fetch_dataset_info(service.as_ref()).await
    };

    tracing::info!(
        datastack = %config.datastack,
        output = %config.output_location,
        rows = table.len(),
        parallel = config.parallel,
        "starting run"
    );

    let tasks = bind_tasks(items, &config, dataset_info.as_ref());
    let executor = TaskExecutor::new(config.parallel, ctx)?;
    executor.run(tasks).await;
    Ok(())
}

/// Write `config` as an env file, pinning the timestamp if it has none
///
/// Returns the configuration that was written.
pub async fn write_template(
    path: &Path,
    mut config: RunConfig,
    connector: &dyn Connector,
) -> Result<RunConfig> {
    config.validate()?;
    if config.timestamp.is_none() {
        let service = connector
            .connect_service(&ServiceParams::from(&config))
            .map_err(|e| Error::Service(e.to_string()))?;
        pin_timestamp(&mut config, service.as_ref()).await?;
    }

    tokio::fs::write(path, config.to_env_string()).await?;
    tracing::info!(path = %path.display(), "wrote config");
    Ok(config)
}

async fn pin_timestamp(config: &mut RunConfig, service: &dyn RemoteDataService) -> Result<()> {
    if config.timestamp.is_some() {
        return Ok(());
    }
    let ts = service
        .materialization_timestamp()
        .await
        .map_err(|e| Error::Service(format!("cannot resolve materialization timestamp: {e}")))?;
    tracing::info!(timestamp = %format_timestamp(ts), "pinned materialization timestamp");
    config.timestamp = Some(ts);
    Ok(())
}

async fn fetch_dataset_info(service: &dyn RemoteDataService) -> Option<DatasetInfo> {
    match service.dataset_info().await {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!(error = %e, "dataset info unavailable, tasks will fetch their own");
            None
        }
    }
}
