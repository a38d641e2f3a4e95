//! Error types for download-sync
//!
//! Task-level failures reported by the agent are data (`TaskRecord::error`), not
//! errors. The types here cover what can go wrong on this side:
//! - the socket (connect failures and the different ways a session ends)
//! - malformed frames
//! - local precondition violations on task actions
//! - remote action calls

use crate::types::{TaskId, TaskState};
use thiserror::Error;

/// Result type alias for download-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for download-sync
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "speed.smoothing")
        key: Option<String>,
    },

    /// Socket connection or session error
    #[error("socket error: {0}")]
    Socket(#[from] SocketError),

    /// A frame could not be parsed as a server message
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Task action rejected locally
    #[error("task error: {0}")]
    Task(#[from] TaskError),

    /// Network error while calling the agent's HTTP API
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The agent's HTTP API answered with a non-success status
    #[error("request to {url} failed with status {status}")]
    Api {
        /// Full request URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// A URL could not be built or parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a configuration key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Socket errors
///
/// Apart from `ConnectFailed`, every variant describes how an open session ended.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SocketError {
    /// The first connection attempt failed before the socket opened
    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed {
        /// Socket URL
        url: String,
        /// Transport error text
        reason: String,
    },

    /// The socket was closed by a local `close()` call
    #[error("socket closed by caller")]
    ClosedLocally,

    /// The agent closed the connection
    #[error("socket closed by peer (code {code:?}): {reason}")]
    ClosedByPeer {
        /// Close code sent by the peer, if any
        code: Option<u16>,
        /// Close reason sent by the peer
        reason: String,
    },

    /// The transport failed while the socket was open
    #[error("socket closed unexpectedly: {reason}")]
    ClosedUnexpectedly {
        /// Transport error text
        reason: String,
    },
}

impl SocketError {
    /// True when the session ended because of a transport failure
    pub fn is_abnormal(&self) -> bool {
        matches!(self, SocketError::ClosedUnexpectedly { .. })
    }

    /// True when the session ended because of a local `close()`
    pub fn is_intentional(&self) -> bool {
        matches!(self, SocketError::ClosedLocally)
    }
}

/// Task action errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// No task with this id is known locally
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: TaskId,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} task {id} in state {current_state}")]
    InvalidState {
        /// The task ID
        id: TaskId,
        /// The operation that was attempted (e.g., "retry", "stop")
        operation: &'static str,
        /// The state that prevents the operation
        current_state: TaskState,
    },
}
