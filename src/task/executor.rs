//! Bounded-parallelism task executor
//!
//! A fixed pool of workers pulls tasks from a shared queue until it is empty.
//! Each task runs in its own spawned tokio task so that a panic escaping a
//! task cannot take its worker down with it. Outcomes are logged and counted,
//! never returned: the artifact store is the record of what happened.

use super::{ExecutionContext, TaskUnit};
use crate::error::{Error, Result};
use crate::types::TaskOutcome;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Runs tasks with at most `parallelism` in flight
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    parallelism: usize,
    ctx: Arc<ExecutionContext>,
}

#[derive(Debug, Default)]
struct RunStats {
    stored: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    escalated: AtomicUsize,
}

impl RunStats {
    fn record(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Stored { .. } => &self.stored,
            TaskOutcome::Skipped => &self.skipped,
            TaskOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl TaskExecutor {
    /// Create an executor; zero parallelism is rejected
    pub fn new(parallelism: usize, ctx: Arc<ExecutionContext>) -> Result<Self> {
        if parallelism < 1 {
            return Err(Error::ExecutionSetup(format!(
                "parallelism must be at least 1, got {parallelism}"
            )));
        }
        Ok(Self { parallelism, ctx })
    }

    /// Maximum number of tasks in flight
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Run every task once and return when all of them have finished
    ///
    /// Completion order is unspecified.
    pub async fn run(&self, tasks: Vec<TaskUnit>) {
        let total = tasks.len();
        let workers = self.parallelism.min(total);
        tracing::info!(tasks = total, workers, "starting task execution");

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let stats = Arc::new(RunStats::default());

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let ctx = Arc::clone(&self.ctx);
                let stats = Arc::clone(&stats);
                tokio::spawn(run_worker(worker, queue, ctx, stats))
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "worker terminated abnormally");
            }
        }

        tracing::info!(
            tasks = total,
            stored = stats.stored.load(Ordering::Relaxed),
            skipped = stats.skipped.load(Ordering::Relaxed),
            failed = stats.failed.load(Ordering::Relaxed),
            escalated = stats.escalated.load(Ordering::Relaxed),
            "task execution complete"
        );
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<Mutex<VecDeque<TaskUnit>>>,
    ctx: Arc<ExecutionContext>,
    stats: Arc<RunStats>,
) {
    loop {
        let next = {
            let mut queue_guard = queue.lock().await;
            queue_guard.pop_front()
        };
        let Some(task) = next else {
            break;
        };

        let root_id = task.root_id();
        let task_ctx = Arc::clone(&ctx);
        let result = tokio::spawn(async move { task.execute(&task_ctx).await }).await;

        match result {
            Ok(Ok(outcome)) => stats.record(&outcome),
            Ok(Err(e)) => {
                stats.escalated.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker,
                    root_id = %root_id,
                    error = %e,
                    "store unavailable, no record written"
                );
            }
            Err(e) => {
                stats.escalated.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker,
                    root_id = %root_id,
                    error = %e,
                    "task aborted outside the compute step"
                );
            }
        }
    }
    tracing::debug!(worker, "queue drained, worker exiting");
}
