//! Applying inbound messages.

use crate::task::SharedTask;
use crate::types::{Event, ServerMessage, TaskId, TaskRecord};
use std::time::Instant;

use super::DownloadManager;

impl DownloadManager {
    /// Apply one inbound message
    ///
    /// Runs to completion without suspending: the registry and every tracked
    /// entity have seen the message before subscribers are notified.
    pub(crate) fn dispatch(&self, message: ServerMessage) {
        tracing::debug!(kind = message.kind(), "dispatching message");

        match message {
            ServerMessage::Added(id) => {
                // Full task data arrives with the next snapshot
                tracing::debug!(task_id = %id, "task added");
                self.emit(Event::Added(id));
            }
            ServerMessage::Loaded(id) => {
                self.release_task(&id);
                self.emit(Event::Loaded(id));
            }
            ServerMessage::Tasks(records) => {
                self.apply_snapshot(&records);
                self.emit(Event::Tasks(records));
            }
        }
    }

    /// Release tracked entities from a terminated task, then retire it
    fn release_task(&self, id: &TaskId) {
        let released = self
            .links
            .read()
            .iter()
            .filter(|link| link.write().finish_task(id))
            .count();

        let retired = self.config.sync.retire_on_loaded && self.registry.write().remove(id).is_some();

        tracing::debug!(task_id = %id, released, retired, "task loaded");
    }

    /// Merge a snapshot into the registry and re-link every tracked entity
    fn apply_snapshot(&self, records: &[TaskRecord]) {
        let (summary, tasks): (_, Vec<SharedTask>) = {
            let mut registry = self.registry.write();
            let summary = registry.reconcile(records, Instant::now());
            (summary, registry.all().to_vec())
        };

        for link in self.links.read().iter() {
            link.write().update_task(&tasks);
        }

        tracing::debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            total = tasks.len(),
            "snapshot applied"
        );
    }
}
