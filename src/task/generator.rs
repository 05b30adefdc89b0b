//! Task generation from the input table

use super::{TaskParams, TaskUnit};
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::service::DatasetInfo;
use crate::table::{InputTable, parse_root_id, parse_soma_point, parse_soma_radius};
use crate::types::WorkItem;
use std::collections::HashSet;

/// Columns the input table must have under `config`
pub fn required_columns(config: &RunConfig) -> Vec<&str> {
    let mut required = vec![
        config.root_id_column.as_str(),
        config.soma_point_column.as_str(),
    ];
    if let Some(col) = &config.soma_radius_column {
        required.push(col.as_str());
    }
    required
}

/// Build one task per table row, in row order
///
/// Every task gets its own copy of the run parameters and of
/// `dataset_info`. Nothing is contacted; a missing column or an unreadable
/// cell is a configuration error.
pub fn generate_tasks(
    table: &InputTable,
    config: &RunConfig,
    dataset_info: Option<&DatasetInfo>,
) -> Result<Vec<TaskUnit>> {
    let items = read_items(table, config)?;
    Ok(bind_tasks(items, config, dataset_info))
}

/// Parse every row of `table` into a work item, in row order
pub fn read_items(table: &InputTable, config: &RunConfig) -> Result<Vec<WorkItem>> {
    table.require_columns(&required_columns(config))?;

    let mut seen = HashSet::with_capacity(table.len());
    let mut items = Vec::with_capacity(table.len());

    for (row_index, row) in table.rows().iter().enumerate() {
        let cell = |column: &str| {
            row.get(column).ok_or_else(|| {
                Error::config(column, format!("row {row_index} has no value for '{column}'"))
            })
        };
        let invalid = |column: &str, what: &str| {
            Error::config(
                column,
                format!("row {row_index}: '{column}' is not {what}"),
            )
        };

        let root_id = parse_root_id(cell(config.root_id_column.as_str())?)
            .ok_or_else(|| invalid(config.root_id_column.as_str(), "an unsigned integer root id"))?;
        let soma_point = parse_soma_point(cell(config.soma_point_column.as_str())?)
            .ok_or_else(|| invalid(config.soma_point_column.as_str(), "a 3-element point"))?;
        let soma_radius = match &config.soma_radius_column {
            Some(col) => match row.get(col.as_str()) {
                Some(value) => parse_soma_radius(value)
                    .ok_or_else(|| invalid(col.as_str(), "a number or null"))?,
                None => None,
            },
            None => None,
        };

        if !seen.insert(root_id) {
            tracing::debug!(root_id = %root_id, row = row_index, "repeated root id");
        }

        items.push(WorkItem {
            root_id,
            soma_point,
            soma_radius,
        });
    }
    Ok(items)
}

/// Attach the run parameters to already-parsed items
pub fn bind_tasks(
    items: Vec<WorkItem>,
    config: &RunConfig,
    dataset_info: Option<&DatasetInfo>,
) -> Vec<TaskUnit> {
    let params = TaskParams::from_config(config, dataset_info.cloned());
    let tasks: Vec<TaskUnit> = items
        .into_iter()
        .map(|item| TaskUnit::new(item, params.clone()))
        .collect();

    tracing::info!(tasks = tasks.len(), "generated tasks");
    tasks
}
