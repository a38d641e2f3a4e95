//! A single tracked download task

use super::speed::SpeedEstimator;
use crate::error::{Result, TaskError};
use crate::types::{TaskId, TaskRecord, TaskState};
use std::time::Instant;

/// Local model of one task on the agent
///
/// Holds the last transmitted values plus the derived progress and smoothed speed.
/// The registry mutates it in place on every snapshot that names its id, so holders
/// of a [`SharedTask`](super::SharedTask) always see current data.
#[derive(Clone, Debug)]
pub struct DownloadTask {
    id: TaskId,
    state: TaskState,
    loaded: u64,
    size: u64,
    error: Option<String>,
    progress: u8,
    speed: SpeedEstimator,
}

impl DownloadTask {
    /// Build a task from its first observed record
    pub fn new(record: TaskRecord, now: Instant, smoothing: f64) -> Self {
        let TaskRecord {
            id,
            state,
            loaded,
            size,
            error,
        } = record;

        Self {
            id,
            state,
            loaded,
            size,
            error,
            progress: progress_percent(loaded, size),
            speed: SpeedEstimator::new(now, smoothing),
        }
    }

    /// Apply a newer record for the same task
    ///
    /// All transmitted fields are overwritten. The speed estimate only advances
    /// while the task carries no error; an erroring task keeps its last speed.
    pub fn update(&mut self, record: TaskRecord, now: Instant) {
        debug_assert_eq!(record.id, self.id, "record applied to the wrong task");

        let last_loaded = self.loaded;

        self.state = record.state;
        self.loaded = record.loaded;
        self.size = record.size;
        self.error = record.error;
        self.progress = progress_percent(self.loaded, self.size);

        if self.error.is_none() {
            self.speed.sample(self.loaded, last_loaded, now);
        }
    }

    /// Prepare a failed task for a restart
    ///
    /// Rewinds `loaded` to 0 and restarts the speed sampling interval at `now`, so
    /// the first snapshot after the restart does not read as a huge negative rate.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidState`] without touching the task unless it is
    /// [`TaskState::Failed`].
    pub fn begin_retry(&mut self, now: Instant) -> Result<()> {
        if self.state != TaskState::Failed {
            return Err(TaskError::InvalidState {
                id: self.id.clone(),
                operation: "retry",
                current_state: self.state,
            }
            .into());
        }

        self.loaded = 0;
        self.progress = 0;
        self.speed.reset(now);
        Ok(())
    }

    /// Task identifier
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Lifecycle state
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Bytes transferred
    pub fn loaded(&self) -> u64 {
        self.loaded
    }

    /// Total bytes (0 = unknown)
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Error reported by the agent
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whole percent complete, 0 while the size is unknown
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Smoothed speed in bytes per second
    pub fn speed(&self) -> f64 {
        self.speed.speed()
    }

    /// Time of the last speed sample
    pub fn speed_update_time(&self) -> Instant {
        self.speed.updated_at()
    }

    /// Transmitted fields as a record
    pub fn to_record(&self) -> TaskRecord {
        TaskRecord {
            id: self.id.clone(),
            state: self.state,
            loaded: self.loaded,
            size: self.size,
            error: self.error.clone(),
        }
    }
}

/// `floor(loaded / size * 100)` clamped to 100; 0 when the size is unknown
pub(crate) fn progress_percent(loaded: u64, size: u64) -> u8 {
    if size == 0 {
        return 0;
    }
    let percent = u128::from(loaded) * 100 / u128::from(size);
    percent.min(100) as u8
}
