//! Locally known tasks, merged from agent snapshots

use super::{DownloadTask, SharedTask};
use crate::task::speed::DEFAULT_SMOOTHING;
use crate::types::{TaskId, TaskRecord};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of one [`TaskRegistry::reconcile`] call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Tasks seen for the first time
    pub inserted: usize,
    /// Existing tasks updated in place
    pub updated: usize,
}

/// The set of tasks this client knows about
///
/// Tasks are handed out as [`SharedTask`] handles. A snapshot naming a known id
/// updates that task in place, so a handle taken earlier keeps observing the
/// same task. Tasks missing from a snapshot are kept; only [`remove`](Self::remove)
/// retires one.
#[derive(Debug)]
pub struct TaskRegistry {
    /// Insertion order
    tasks: Vec<SharedTask>,
    /// Position of each id in `tasks`
    index: HashMap<TaskId, usize>,
    smoothing: f64,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING)
    }
}

impl TaskRegistry {
    /// Create an empty registry whose tasks use the given smoothing constant
    pub fn new(smoothing: f64) -> Self {
        Self {
            tasks: Vec::new(),
            index: HashMap::new(),
            smoothing,
        }
    }

    /// Merge a snapshot into the registry
    ///
    /// Upserts each record by id. A record repeated within one snapshot is applied
    /// twice, in order.
    pub fn reconcile(&mut self, snapshot: &[TaskRecord], now: Instant) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        for record in snapshot {
            match self.index.get(&record.id) {
                Some(&position) => {
                    self.tasks[position].write().update(record.clone(), now);
                    summary.updated += 1;
                }
                None => {
                    let task = DownloadTask::new(record.clone(), now, self.smoothing);
                    self.index.insert(record.id.clone(), self.tasks.len());
                    self.tasks.push(Arc::new(parking_lot::RwLock::new(task)));
                    summary.inserted += 1;
                }
            }
        }

        summary
    }

    /// Handle to the task with this id
    pub fn get(&self, id: &TaskId) -> Option<SharedTask> {
        self.index.get(id).map(|&position| self.tasks[position].clone())
    }

    /// Every known task, in the order first seen
    pub fn all(&self) -> &[SharedTask] {
        &self.tasks
    }

    /// Ids of every known task, in the order first seen
    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|task| task.read().id().clone()).collect()
    }

    /// Retire a task, returning its handle
    ///
    /// Outstanding handles stay valid but no longer receive updates.
    pub fn remove(&mut self, id: &TaskId) -> Option<SharedTask> {
        let position = self.index.remove(id)?;
        let task = self.tasks.remove(position);

        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }

        Some(task)
    }

    /// Number of known tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no task is known
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
