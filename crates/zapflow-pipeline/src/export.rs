//! Export submission and completion tracking.
//!
//! One export task per derived product. The coordinator only observes remote
//! state; there is no cancellation of submitted work. Polling backs off
//! exponentially up to a cap and honors an optional caller deadline, so a
//! stuck remote task surfaces as [`TaskState::TimedOut`] instead of blocking
//! the run forever.

use std::time::Duration;

use futures::future::join_all;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::error::Result;
use crate::products::DerivedProduct;
use zapflow_core::{ExportName, WatershedGeometry};
use zapflow_remote::{
    ExportFormat, ExportRequest, RemotePlatform, RemoteTaskState, RemoteTaskStatus, TaskHandle,
};

/// Ceiling on pixels per export, forwarded to the platform.
pub const MAX_EXPORT_PIXELS: f64 = 1e13;

// ---------------------------------------------------------------------------
// Options and task state
// ---------------------------------------------------------------------------

/// Polling cadence and deadline.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// First wait between status rounds (doubles each round).
    pub initial_interval: Duration,
    /// Cap on the wait between rounds.
    pub max_interval: Duration,
    /// Give up on still-running tasks after this much wall-clock time.
    pub deadline: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(15),
            max_interval: Duration::from_secs(60),
            deadline: None,
        }
    }
}

/// Local lifecycle of one export task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Submitted,
    Running,
    Completed,
    Failed(String),
    TimedOut,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::TimedOut)
    }
}

/// A submitted export and its last observed state.
#[derive(Debug, Clone)]
pub struct TrackedTask {
    pub handle: TaskHandle,
    pub file_name: String,
    pub state: TaskState,
}

/// Terminal-state tally for a polled batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollSummary {
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

/// Compose an export file name: `prefix + base + suffix`, verbatim.
pub fn export_file_name(prefix: &str, base: &ExportName, suffix: &str) -> String {
    format!("{}{}{}", prefix, base, suffix)
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Submits export tasks and polls them to completion.
pub struct ExportCoordinator<'a, P> {
    platform: &'a P,
    folder: String,
    options: PollOptions,
}

impl<'a, P: RemotePlatform> ExportCoordinator<'a, P> {
    pub fn new(platform: &'a P, folder: impl Into<String>, options: PollOptions) -> Self {
        Self {
            platform,
            folder: folder.into(),
            options,
        }
    }

    /// Submit one export task per derived product, in enumeration order.
    pub async fn submit_products(
        &self,
        products: &[DerivedProduct],
        base: &ExportName,
        watershed: &WatershedGeometry,
    ) -> Result<Vec<TrackedTask>> {
        let mut tasks = Vec::with_capacity(products.len());
        for product in products {
            let file_name =
                export_file_name(product.kind.file_prefix(), base, product.kind.file_suffix());
            let request = ExportRequest {
                image: product.expression.clone(),
                description: file_name.clone(),
                destination_folder: self.folder.clone(),
                file_name_prefix: file_name.clone(),
                scale: product.scale_m,
                region: watershed.to_geojson(),
                file_format: ExportFormat::GeoTiff,
                max_pixels: MAX_EXPORT_PIXELS,
            };
            let handle = self.platform.submit_export(&request).await?;
            info!(handle = %handle, file = %file_name, "export task submitted");
            tasks.push(TrackedTask {
                handle,
                file_name,
                state: TaskState::Submitted,
            });
        }
        Ok(tasks)
    }

    /// Poll every outstanding task until all reach a terminal state.
    ///
    /// Outstanding handles are checked concurrently each round. An individual
    /// failure is recorded with the remote-supplied message and never stops
    /// polling of the remaining tasks; transient status-check errors keep the
    /// task's previous state and are retried next round.
    pub async fn poll_to_completion(&self, tasks: &mut [TrackedTask]) -> PollSummary {
        let deadline = self.options.deadline.map(|d| Instant::now() + d);
        let mut interval = self.options.initial_interval;

        loop {
            let pending: Vec<usize> = tasks
                .iter()
                .enumerate()
                .filter(|(_, task)| !task.state.is_terminal())
                .map(|(i, _)| i)
                .collect();
            if pending.is_empty() {
                break;
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    for i in pending {
                        warn!(handle = %tasks[i].handle, "deadline reached; giving up on task");
                        tasks[i].state = TaskState::TimedOut;
                    }
                    break;
                }
            }

            let wait = match deadline {
                Some(d) => interval.min(d.saturating_duration_since(Instant::now())),
                None => interval,
            };
            sleep(wait).await;

            let statuses = join_all(
                pending
                    .iter()
                    .map(|&i| self.platform.task_status(&tasks[i].handle)),
            )
            .await;

            for (&i, status) in pending.iter().zip(statuses) {
                match status {
                    Ok(status) => tasks[i].state = observed_state(&status),
                    Err(e) if e.is_transient() => {
                        warn!(handle = %tasks[i].handle, error = %e, "status check failed; will retry");
                    }
                    Err(e) => {
                        warn!(handle = %tasks[i].handle, error = %e, "status check rejected");
                        tasks[i].state = TaskState::Failed(e.to_string());
                    }
                }
            }

            interval = (interval * 2).min(self.options.max_interval);
        }

        let summary = tally(tasks);
        info!(
            completed = summary.completed,
            failed = summary.failed,
            timed_out = summary.timed_out,
            "export polling finished"
        );
        summary
    }

    /// Submit then poll; convenience for one-shot runs.
    pub async fn run(
        &self,
        products: &[DerivedProduct],
        base: &ExportName,
        watershed: &WatershedGeometry,
    ) -> Result<(Vec<TrackedTask>, PollSummary)> {
        let mut tasks = self.submit_products(products, base, watershed).await?;
        let summary = self.poll_to_completion(&mut tasks).await;
        Ok((tasks, summary))
    }
}

fn observed_state(status: &RemoteTaskStatus) -> TaskState {
    match status.state {
        RemoteTaskState::Ready => TaskState::Submitted,
        RemoteTaskState::Running => TaskState::Running,
        RemoteTaskState::Completed => TaskState::Completed,
        RemoteTaskState::Failed => TaskState::Failed(
            status
                .error_message
                .clone()
                .unwrap_or_else(|| "remote task failed".to_string()),
        ),
    }
}

fn tally(tasks: &[TrackedTask]) -> PollSummary {
    let mut summary = PollSummary::default();
    for task in tasks {
        match task.state {
            TaskState::Completed => summary.completed += 1,
            TaskState::Failed(_) => summary.failed += 1,
            TaskState::TimedOut => summary.timed_out += 1,
            _ => {}
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
