//! Task distribution
//!
//! Split into focused submodules:
//! - [`generator`] - one [`TaskUnit`] per input row
//! - [`unit`] - the task body: idempotency check, compute, store, error capture
//! - [`executor`] - bounded worker pool over a task queue
//! - [`connector`] - per-task service and store handles
//!
//! A run is `generate_tasks` followed by [`TaskExecutor::run`]. Re-running the
//! same input only recomputes items with no artifact in the store.

pub mod connector;
pub mod executor;
pub mod generator;
pub mod unit;


pub use connector::{Connector, ExecutionContext, HttpConnector};
pub use executor::TaskExecutor;
pub use generator::{bind_tasks, generate_tasks, read_items, required_columns};
pub use unit::{TaskParams, TaskUnit};
