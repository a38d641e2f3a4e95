//! Socket session and shutdown.

use crate::error::{Error, SocketError};

use super::{DownloadManager, SessionEnd};

impl DownloadManager {
    /// Connect, subscribe, then dispatch messages until the socket closes
    ///
    /// There is no reconnect: a lost session stays lost.
    pub(crate) async fn run_session(self) -> SessionEnd {
        match self.socket.opened().await {
            Ok(()) => {
                tracing::info!(url = %self.socket.url(), "connected to download socket");
            }
            Err(Error::Socket(reason @ SocketError::ConnectFailed { .. })) => {
                return self.session_ended(reason);
            }
            // Frames received before a hang-up are still queued; drain them first
            Err(e) => {
                tracing::debug!(error = %e, "download socket closed before the session started");
            }
        }

        if !self.socket.send("") {
            tracing::debug!("subscribe frame dropped, socket no longer open");
        }

        let mut messages = self.socket.messages();
        loop {
            match messages.next().await {
                Ok(message) => self.dispatch(message),
                Err(Error::Socket(reason)) => return self.session_ended(reason),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unprocessable message");
                }
            }
        }
    }

    /// Classify and log how the session ended
    fn session_ended(&self, reason: SocketError) -> SessionEnd {
        if !self.socket.is_alive() || reason.is_intentional() {
            tracing::info!("download socket closed");
            return SessionEnd::ClosedByCaller;
        }

        if reason.is_abnormal() {
            tracing::warn!(error = %reason, "WebSocket closed unexpectedly");
        } else {
            tracing::warn!(error = %reason, "download socket session ended");
        }

        SessionEnd::Lost(reason)
    }

    /// Wait for the socket session to end
    ///
    /// Returns `None` only if the session task was torn down without reporting,
    /// for example when the runtime shuts down.
    pub async fn join(&self) -> Option<SessionEnd> {
        let mut session_end = self.session_end.clone();
        match session_end.wait_for(Option::is_some).await {
            Ok(end) => (*end).clone(),
            Err(_) => None,
        }
    }

    /// True once the socket session has ended
    pub fn is_finished(&self) -> bool {
        self.session_end.borrow().is_some()
    }

    /// Detach every subscriber and close the socket
    ///
    /// Existing receivers see the channel close; later [`subscribe`](Self::subscribe)
    /// calls return closed receivers. Safe to call more than once.
    pub fn destroy(&self) {
        let detached = self.event_tx.lock().take().is_some();
        self.socket.close();

        if detached {
            tracing::info!("download sync destroyed");
        }
    }
}
