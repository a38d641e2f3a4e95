//! Core types for download-sync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a download task, assigned by the remote agent
///
/// Opaque to this crate: it is only ever compared for equality.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl PartialEq<str> for TaskId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TaskId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a download task
///
/// `INITIAL → LOADING → {SUCCEEDED, FAILED}`; `FAILED → LOADING` (retry) and
/// `STOPPED ↔ LOADING` are the only backward transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Created but not started
    #[default]
    Initial,
    /// Transferring bytes
    Loading,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed,
    /// Paused by a user
    Stopped,
}

impl TaskState {
    /// Whether the task has reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskState::Initial => "INITIAL",
            TaskState::Loading => "LOADING",
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Failed => "FAILED",
            TaskState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// A task as transmitted in a `tasks` snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task identifier
    pub id: TaskId,
    /// Lifecycle state
    pub state: TaskState,
    /// Bytes transferred so far
    #[serde(default)]
    pub loaded: u64,
    /// Total size in bytes (0 = unknown)
    #[serde(default)]
    pub size: u64,
    /// Error message reported by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A frame received on the download socket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full or partial snapshot of the agent's tasks
    Tasks(Vec<TaskRecord>),
    /// A task was created on the agent
    Added(TaskId),
    /// A task terminated (finished or removed)
    Loaded(TaskId),
}

impl ServerMessage {
    /// Wire tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Tasks(_) => "tasks",
            ServerMessage::Added(_) => "added",
            ServerMessage::Loaded(_) => "loaded",
        }
    }
}

/// Notification delivered to subscribers of a [`DownloadManager`](crate::DownloadManager)
///
/// Payloads are the raw inbound data, before any merge into the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// A task was created on the agent
    Added(TaskId),
    /// A task terminated and linked entities were released from it
    Loaded(TaskId),
    /// A snapshot was merged into the registry
    Tasks(Vec<TaskRecord>),
}

impl From<ServerMessage> for Event {
    fn from(message: ServerMessage) -> Self {
        match message {
            ServerMessage::Tasks(tasks) => Event::Tasks(tasks),
            ServerMessage::Added(id) => Event::Added(id),
            ServerMessage::Loaded(id) => Event::Loaded(id),
        }
    }
}

/// A video as returned by the HTTP layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Video identifier
    pub id: i64,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Author identifier on the source site
    #[serde(default)]
    pub author_id: Option<String>,
    /// Stored video file
    #[serde(default)]
    pub file: String,
    /// Stored thumbnail file
    #[serde(default)]
    pub thumb: String,
    /// Task downloading the video file
    #[serde(default)]
    pub video_dl_id: Option<TaskId>,
    /// Task downloading the thumbnail
    #[serde(default)]
    pub thumb_dl_id: Option<TaskId>,
    /// When the record was created (milliseconds since epoch on the wire)
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub created: Option<DateTime<Utc>>,
}
