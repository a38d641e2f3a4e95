//! Linkage between tracked entities and the tasks they reference

use crate::task::SharedTask;
use crate::types::TaskId;
use std::sync::Arc;

/// An entity that references tasks by id and follows their lifecycle
///
/// The manager calls these from its dispatch loop, one message at a time, so an
/// implementation sees registry changes in message order.
pub trait TaskLink: Send + Sync {
    /// Re-derive the entity's state from the full list of known tasks
    fn update_task(&mut self, tasks: &[SharedTask]);

    /// Release the entity from a task that terminated
    ///
    /// Returns `false` when `id` is not one of the entity's tasks. That is the
    /// common case and not an error.
    fn finish_task(&mut self, id: &TaskId) -> bool;
}

/// A tracked entity as held by the manager
pub type SharedLink = Arc<parking_lot::RwLock<dyn TaskLink>>;
