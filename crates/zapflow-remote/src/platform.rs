//! The remote compute platform boundary.

use crate::error::Result;
use crate::models::{ExportRequest, RemoteTaskStatus, SceneQuery, TaskHandle};

/// Black-box RPC surface of the Earth-observation compute platform.
///
/// Scalar queries (scene counts) resolve inline; exports return a task
/// handle that must be polled until it reaches a terminal state. The trait
/// is the seam the pipeline is generic over, so tests drive the whole flow
/// against an in-memory implementation.
#[allow(async_fn_in_trait)]
pub trait RemotePlatform {
    /// Count the scenes matching `query` (date, cloud and region filters
    /// applied server-side).
    async fn scene_count(&self, query: &SceneQuery) -> Result<u64>;

    /// Submit an export task; returns immediately with a handle.
    async fn submit_export(&self, request: &ExportRequest) -> Result<TaskHandle>;

    /// Fetch the current status of a previously submitted task.
    async fn task_status(&self, handle: &TaskHandle) -> Result<RemoteTaskStatus>;
}
