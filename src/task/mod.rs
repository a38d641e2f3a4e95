//! Download tasks tracked on the agent
//!
//! - [`model`] - A single task and its derived progress and speed
//! - [`speed`] - Exponential moving average speed estimation
//! - [`registry`] - The set of known tasks, merged from snapshots

pub mod model;
pub mod registry;
pub mod speed;

pub use model::DownloadTask;
pub use registry::{ReconcileSummary, TaskRegistry};
pub use speed::{DEFAULT_SMOOTHING, SpeedEstimator};

use crate::error::Result;
use crate::remote::TaskApi;
use std::sync::Arc;
use std::time::Instant;

/// A task shared between the registry and whoever observes it
pub type SharedTask = Arc<parking_lot::RwLock<DownloadTask>>;

/// Restart a failed task
///
/// The local task is rewound first (see [`DownloadTask::begin_retry`]), then the
/// agent is asked to restart it. The lock is released before the remote call.
///
/// # Errors
///
/// Returns [`TaskError::InvalidState`](crate::error::TaskError::InvalidState) without
/// calling the agent if the task has not failed, or the remote call's error.
pub async fn retry(task: &SharedTask, api: &dyn TaskApi) -> Result<()> {
    let id = {
        let mut task = task.write();
        task.begin_retry(Instant::now())?;
        task.id().clone()
    };

    tracing::info!(task_id = %id, "retrying task");
    api.retry(&id).await
}
