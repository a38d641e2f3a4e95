//! Videos whose files are being fetched by agent tasks
//!
//! A [`TrackedVideo`] references up to two tasks: one for the video file and one for
//! its thumbnail. Only the video task's error is surfaced on the entity; a failing
//! thumbnail is not worth bothering the user about.

use crate::error::TaskError;
use crate::link::TaskLink;
use crate::remote::TaskApi;
use crate::task::{self, SharedTask};
use crate::types::{TaskId, VideoRecord};
use std::sync::{Arc, Weak};

/// Error shown while a video has a task id but the agent reports no such task
pub const NOT_DOWNLOADED: &str = "Not downloaded";

/// A video shared between the manager and the code displaying it
pub type SharedVideo = Arc<parking_lot::RwLock<TrackedVideo>>;

/// A video linked to its download tasks
///
/// Task handles are weak: the registry owns the tasks, and a task retired from it
/// is no longer reachable through the video.
#[derive(Debug)]
pub struct TrackedVideo {
    record: VideoRecord,
    video_task: Option<Weak<parking_lot::RwLock<task::DownloadTask>>>,
    thumb_task: Option<Weak<parking_lot::RwLock<task::DownloadTask>>>,
    video_loaded: bool,
    thumb_loaded: bool,
    error: Option<String>,
}

impl TrackedVideo {
    /// Wrap a video record; slots without a task id start out loaded
    pub fn new(record: VideoRecord) -> Self {
        Self {
            video_loaded: record.video_dl_id.is_none(),
            thumb_loaded: record.thumb_dl_id.is_none(),
            record,
            video_task: None,
            thumb_task: None,
            error: None,
        }
    }

    /// Wrap a video record into a shareable handle
    pub fn shared(record: VideoRecord) -> SharedVideo {
        Arc::new(parking_lot::RwLock::new(Self::new(record)))
    }

    /// The underlying record, with task ids cleared as tasks finish
    pub fn record(&self) -> &VideoRecord {
        &self.record
    }

    /// Id of the video download task
    pub fn video_dl_id(&self) -> Option<&TaskId> {
        self.record.video_dl_id.as_ref()
    }

    /// Id of the thumbnail download task
    pub fn thumb_dl_id(&self) -> Option<&TaskId> {
        self.record.thumb_dl_id.as_ref()
    }

    /// The linked video task, if it is still known
    pub fn video_task(&self) -> Option<SharedTask> {
        self.video_task.as_ref().and_then(Weak::upgrade)
    }

    /// The linked thumbnail task, if it is still known
    pub fn thumb_task(&self) -> Option<SharedTask> {
        self.thumb_task.as_ref().and_then(Weak::upgrade)
    }

    /// True once the video file needs no further downloading
    pub fn video_loaded(&self) -> bool {
        self.video_loaded
    }

    /// True once the thumbnail needs no further downloading
    pub fn thumb_loaded(&self) -> bool {
        self.thumb_loaded
    }

    /// Error to show for this video
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Progress of the video task
    pub fn progress(&self) -> Option<u8> {
        self.video_task().map(|task| task.read().progress())
    }

    /// Smoothed speed of the video task, in bytes per second
    pub fn speed(&self) -> Option<f64> {
        self.video_task().map(|task| task.read().speed())
    }

    /// Ask the agent to restart this video's failed download
    ///
    /// Never fails: a rejected retry is stored in [`error`](Self::error) and
    /// reported as `false`.
    pub async fn retry_download(video: &SharedVideo, api: &dyn TaskApi) -> bool {
        let (id, task) = {
            let video = video.read();
            (video.video_dl_id().cloned(), video.video_task())
        };

        let Some(id) = id else {
            return false;
        };

        let result = match task {
            Some(task) => task::retry(&task, api).await,
            None => Err(TaskError::NotFound { id: id.clone() }.into()),
        };

        match result {
            Ok(()) => {
                video.write().error = None;
                true
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "failed to retry video download");
                video.write().error = Some(e.to_string());
                false
            }
        }
    }
}

impl TaskLink for TrackedVideo {
    fn update_task(&mut self, tasks: &[SharedTask]) {
        let mut video_task = None;
        let mut thumb_task = None;

        for shared in tasks {
            let task = shared.read();
            if self.record.video_dl_id.as_ref() == Some(task.id()) {
                video_task = Some((shared, task.error().map(str::to_string)));
            } else if self.record.thumb_dl_id.as_ref() == Some(task.id()) {
                thumb_task = Some(shared);
            }
        }

        match &video_task {
            Some((_, error)) => self.error = error.clone(),
            None if self.video_task.is_none() && !self.video_loaded => {
                self.error = Some(NOT_DOWNLOADED.to_string());
            }
            None => {}
        }

        self.video_task = video_task.map(|(shared, _)| Arc::downgrade(shared));
        self.thumb_task = thumb_task.map(Arc::downgrade);
    }

    fn finish_task(&mut self, id: &TaskId) -> bool {
        if self.record.video_dl_id.as_ref() == Some(id) {
            self.record.video_dl_id = None;
            self.video_task = None;
            self.video_loaded = true;
            self.error = None;
            true
        } else if self.record.thumb_dl_id.as_ref() == Some(id) {
            self.record.thumb_dl_id = None;
            self.thumb_task = None;
            self.thumb_loaded = true;
            true
        } else {
            false
        }
    }
}
