//! Task actions forwarded to the agent.

use crate::error::{Result, TaskError};
use crate::task::{self, SharedTask};
use crate::types::{TaskId, TaskState};

use super::DownloadManager;

impl DownloadManager {
    /// Restart a failed task
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if the task is not known
    /// - [`TaskError::InvalidState`] if it has not failed; the agent is not called
    /// - the agent's error if the restart request fails
    pub async fn retry(&self, id: &TaskId) -> Result<()> {
        let task = self.require_task(id)?;
        task::retry(&task, self.api.as_ref()).await
    }

    /// Resume a stopped task
    ///
    /// Allowed while the task is `STOPPED` or `INITIAL`.
    pub async fn start(&self, id: &TaskId) -> Result<()> {
        let task = self.require_task(id)?;
        ensure_state(&task, "start", &[TaskState::Stopped, TaskState::Initial])?;

        tracing::info!(task_id = %id, "starting task");
        self.api.start(id).await
    }

    /// Stop a running task
    ///
    /// Allowed while the task is `LOADING` or `INITIAL`.
    pub async fn stop(&self, id: &TaskId) -> Result<()> {
        let task = self.require_task(id)?;
        ensure_state(&task, "stop", &[TaskState::Loading, TaskState::Initial])?;

        tracing::info!(task_id = %id, "stopping task");
        self.api.stop(id).await
    }

    /// Delete a task on the agent and forget it locally
    ///
    /// The local task is only dropped once the agent has accepted the request.
    pub async fn remove(&self, id: &TaskId) -> Result<()> {
        self.require_task(id)?;

        tracing::info!(task_id = %id, "removing task");
        self.api.remove(id).await?;

        self.registry.write().remove(id);
        Ok(())
    }

    fn require_task(&self, id: &TaskId) -> Result<SharedTask> {
        self.registry
            .read()
            .get(id)
            .ok_or_else(|| TaskError::NotFound { id: id.clone() }.into())
    }
}

/// Fail with `InvalidState` unless the task is in one of `allowed`
fn ensure_state(task: &SharedTask, operation: &'static str, allowed: &[TaskState]) -> Result<()> {
    let task = task.read();
    if allowed.contains(&task.state()) {
        return Ok(());
    }

    Err(TaskError::InvalidState {
        id: task.id().clone(),
        operation,
        current_state: task.state(),
    }
    .into())
}
