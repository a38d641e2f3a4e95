//! Synchronization controller split into focused submodules.
//!
//! The `DownloadManager` struct and its methods are organized by concern:
//! - [`dispatch`] - Applying inbound messages to the registry and tracked entities
//! - [`lifecycle`] - The socket session, session end reporting, and `destroy`
//! - [`actions`] - Task actions forwarded to the agent

mod actions;
mod dispatch;
mod lifecycle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::{Result, SocketError};
use crate::link::SharedLink;
use crate::remote::{HttpTaskApi, TaskApi};
use crate::socket::{SocketState, TypedSocket};
use crate::task::{SharedTask, TaskRegistry};
use crate::types::{Event, ServerMessage, TaskId};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;

/// How a manager's socket session ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// [`DownloadManager::destroy`] closed the socket
    ClosedByCaller,
    /// The connection failed or was lost; it is not re-established
    Lost(SocketError),
}

/// Keeps a local view of the agent's download tasks in sync
///
/// Owns the download socket and the [`TaskRegistry`]. Every inbound message is
/// applied in full (registry, then tracked entities, then subscribers) before the
/// next one is read.
///
/// Cloning is cheap; all clones share one session. The session runs until
/// [`destroy`](Self::destroy) is called, the connection is lost, or the last
/// handle is dropped.
#[derive(Clone)]
pub struct DownloadManager {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Remote task actions
    pub(crate) api: Arc<dyn TaskApi>,
    /// Known tasks, mutated only by the dispatch loop and `remove`
    pub(crate) registry: Arc<parking_lot::RwLock<TaskRegistry>>,
    /// Entities following task lifecycle events
    pub(crate) links: Arc<parking_lot::RwLock<Vec<SharedLink>>>,
    /// Event broadcast channel sender; taken by `destroy`
    pub(crate) event_tx: Arc<parking_lot::Mutex<Option<broadcast::Sender<Event>>>>,
    /// The download socket
    pub(crate) socket: Arc<TypedSocket<ServerMessage>>,
    /// Set once the session is over
    pub(crate) session_end: watch::Receiver<Option<SessionEnd>>,
    /// Shared by caller-held handles only; the session task runs without one
    handle: Option<Arc<HandleGuard>>,
}

/// Closes the socket once the last caller-held handle is dropped
struct HandleGuard {
    socket: Arc<TypedSocket<ServerMessage>>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        if self.socket.is_alive() {
            tracing::debug!("last download manager handle dropped, closing socket");
        }
        self.socket.close();
    }
}

impl DownloadManager {
    /// Create a manager and start its socket session
    ///
    /// Connecting happens in the background; subscribe right away to see every
    /// message. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is invalid.
    pub fn new(config: Config, api: Arc<dyn TaskApi>) -> Result<Self> {
        config.validate()?;

        let url = config.socket_url()?;
        tracing::info!(url = %url, "starting download sync");

        let socket = TypedSocket::open_with_buffer(url, config.sync.frame_buffer);
        let (event_tx, _rx) = broadcast::channel(config.sync.event_buffer);
        let (session_end_tx, session_end_rx) = watch::channel(None);
        let socket = Arc::new(socket);

        let mut manager = Self {
            registry: Arc::new(parking_lot::RwLock::new(TaskRegistry::new(
                config.speed.smoothing,
            ))),
            config: Arc::new(config),
            api,
            links: Arc::new(parking_lot::RwLock::new(Vec::new())),
            event_tx: Arc::new(parking_lot::Mutex::new(Some(event_tx))),
            socket: socket.clone(),
            session_end: session_end_rx,
            handle: None,
        };

        let session = manager.clone();
        manager.handle = Some(Arc::new(HandleGuard { socket }));
        tokio::spawn(async move {
            let end = session.run_session().await;
            session_end_tx.send_replace(Some(end));
        });

        Ok(manager)
    }

    /// Create a manager whose task actions go to the agent's HTTP API
    pub fn connect(config: Config) -> Result<Self> {
        let api = HttpTaskApi::new(&config.server)?;
        Self::new(config, Arc::new(api))
    }

    /// Subscribe to manager events
    ///
    /// After [`destroy`](Self::destroy) the returned receiver is already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        match self.event_tx.lock().as_ref() {
            Some(tx) => tx.subscribe(),
            None => {
                let (_tx, rx) = broadcast::channel(1);
                rx
            }
        }
    }

    /// Manager events as a `Stream`
    pub fn event_stream(&self) -> BroadcastStream<Event> {
        BroadcastStream::new(self.subscribe())
    }

    /// Send an event to current subscribers
    pub(crate) fn emit(&self, event: Event) {
        if let Some(tx) = self.event_tx.lock().as_ref() {
            // No subscribers is fine
            let _ = tx.send(event);
        }
    }

    /// Start following task lifecycle events with an entity
    ///
    /// The entity is linked on the next `tasks` snapshot.
    pub fn track(&self, link: SharedLink) {
        self.links.write().push(link);
    }

    /// Stop following task events with an entity; false if it was not tracked
    pub fn untrack(&self, link: &SharedLink) -> bool {
        let mut links = self.links.write();
        let before = links.len();
        links.retain(|tracked| !Arc::ptr_eq(tracked, link));
        links.len() != before
    }

    /// Number of tracked entities
    pub fn tracked_count(&self) -> usize {
        self.links.read().len()
    }

    /// Every known task, in the order first seen
    pub fn tasks(&self) -> Vec<SharedTask> {
        self.registry.read().all().to_vec()
    }

    /// The task with this id
    pub fn task(&self, id: &TaskId) -> Option<SharedTask> {
        self.registry.read().get(id)
    }

    /// Current state of the download socket
    pub fn socket_state(&self) -> SocketState {
        self.socket.state()
    }

    /// The configuration this manager runs with
    pub fn config(&self) -> &Config {
        &self.config
    }
}
