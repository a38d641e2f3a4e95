//! Typed streaming socket
//!
//! [`TypedSocket`] owns one WebSocket connection and turns it into:
//! - a connect step that resolves once the connection is open ([`TypedSocket::create`])
//! - best-effort sends that report whether the frame was handed to the transport
//! - a cancellable sequence of parsed inbound frames ([`TypedSocket::messages`])
//!
//! A background driver task owns the transport. It publishes the connection state on
//! a `watch` channel and forwards parsed frames through a bounded `mpsc` queue, so a
//! slow consumer applies backpressure to the connection instead of growing memory.
//!
//! # Closure
//!
//! Every way a session can end is reported as a [`SocketError`]. `close()` sets the
//! "intentionally closed" flag before tearing the transport down, so a consumer that
//! sees the sequence end can tell an expected shutdown from an abnormal one.

use crate::error::{Error, Result, SocketError};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Inbound frames buffered ahead of the consumer when no size is given
pub const DEFAULT_FRAME_BUFFER: usize = 64;

/// Upper bound on the close handshake after a local `close()`
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection state of a [`TypedSocket`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketState {
    /// The connection attempt is in progress
    Connecting,
    /// Frames can be sent and received
    Open,
    /// The session is over; carries how it ended
    Closed(SocketError),
}

/// Build a socket URL from a base, a relative endpoint, and query parameters
///
/// Parameters whose value is `None` are left out.
///
/// # Examples
///
/// ```
/// use download_sync::socket::endpoint_url;
/// use url::Url;
///
/// let base = Url::parse("ws://127.0.0.1:8000/").unwrap();
/// let url = endpoint_url(&base, "download/", [("interval", Some("500")), ("since", None)]).unwrap();
/// assert_eq!(url.as_str(), "ws://127.0.0.1:8000/download/?interval=500");
/// ```
pub fn endpoint_url<I, K, V>(base: &Url, endpoint: &str, params: I) -> Result<Url>
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url = base.join(endpoint)?;

    let pairs: Vec<(K, V)> = params
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect();

    if !pairs.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref())));
    }

    Ok(url)
}

/// A WebSocket connection yielding inbound frames parsed as `T`
pub struct TypedSocket<T> {
    url: Url,
    state: watch::Receiver<SocketState>,
    outbound: mpsc::UnboundedSender<String>,
    /// Locked by whichever consumer is awaiting the next frame
    inbound: tokio::sync::Mutex<mpsc::Receiver<Result<T>>>,
    alive: AtomicBool,
    cancel: CancellationToken,
}

impl<T> TypedSocket<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Start connecting to `url` without waiting for the connection to open
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(url: Url) -> Self {
        Self::open_with_buffer(url, DEFAULT_FRAME_BUFFER)
    }

    /// Like [`open`](Self::open), with a custom inbound frame buffer
    pub fn open_with_buffer(url: Url, frame_buffer: usize) -> Self {
        let (state_tx, state_rx) = watch::channel(SocketState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(frame_buffer.max(1));
        let cancel = CancellationToken::new();

        let driver = Driver {
            url: url.clone(),
            state: state_tx,
            outbound: outbound_rx,
            inbound: inbound_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(driver.run());

        Self {
            url,
            state: state_rx,
            outbound: outbound_tx,
            inbound: tokio::sync::Mutex::new(inbound_rx),
            alive: AtomicBool::new(true),
            cancel,
        }
    }

    /// Connect to `url` and wait until the connection is open
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::ConnectFailed`] if the first connection attempt fails.
    pub async fn create(url: Url) -> Result<Self> {
        let socket = Self::open(url);
        socket.opened().await?;
        Ok(socket)
    }
}

impl<T> TypedSocket<T> {
    /// The URL this socket connects to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Current connection state
    pub fn state(&self) -> SocketState {
        self.state.borrow().clone()
    }

    /// False once `close()` has been called
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Wait until the connection has left the connecting state
    ///
    /// Resolves `Ok` if the socket is open, or with the error that ended it.
    pub async fn opened(&self) -> Result<()> {
        let mut state = self.state.clone();
        let closed = match state
            .wait_for(|s| !matches!(s, SocketState::Connecting))
            .await
        {
            Ok(current) => match &*current {
                SocketState::Closed(reason) => Some(reason.clone()),
                _ => None,
            },
            Err(_) => Some(self.closed_error()),
        };

        match closed {
            Some(reason) => Err(reason.into()),
            None => Ok(()),
        }
    }

    /// Send a text frame if the connection is open
    ///
    /// Returns `false` when the socket is not open. The frame is then silently
    /// dropped; this is not an error.
    pub fn send(&self, payload: impl Into<String>) -> bool {
        if !self.is_alive() || !matches!(*self.state.borrow(), SocketState::Open) {
            return false;
        }
        self.outbound.send(payload.into()).is_ok()
    }

    /// Iterate over inbound frames
    ///
    /// Each call starts a fresh iteration over the same connection. Only one
    /// consumer awaits a frame at a time; concurrent callers queue behind it.
    pub fn messages(&self) -> Messages<'_, T> {
        Messages { socket: self }
    }

    /// Close the connection
    ///
    /// Marks the socket as intentionally closed, then tears the transport down.
    /// Safe to call more than once.
    pub fn close(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            tracing::debug!(url = %self.url, "closing socket");
        }
        self.cancel.cancel();
    }

    fn closed_error(&self) -> SocketError {
        if !self.is_alive() {
            return SocketError::ClosedLocally;
        }
        match &*self.state.borrow() {
            SocketState::Closed(reason) => reason.clone(),
            _ => SocketError::ClosedUnexpectedly {
                reason: "socket driver stopped".to_string(),
            },
        }
    }
}

impl<T> Drop for TypedSocket<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Sequence of inbound frames, returned by [`TypedSocket::messages`]
pub struct Messages<'a, T> {
    socket: &'a TypedSocket<T>,
}

impl<T> Messages<'_, T> {
    /// Wait for the next frame
    ///
    /// If the socket is still connecting, waits for it to open or fail first.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if this frame failed to parse; the sequence continues.
    /// - [`Error::Socket`] once the connection has closed; the sequence is over.
    ///   After a local `close()` this is [`SocketError::ClosedLocally`], even if
    ///   frames were still buffered. After a remote hang-up, frames received
    ///   before it are yielded first.
    pub async fn next(&mut self) -> Result<T> {
        let socket = self.socket;

        let mut state = socket.state.clone();
        if state
            .wait_for(|s| !matches!(s, SocketState::Connecting))
            .await
            .is_err()
        {
            return Err(socket.closed_error().into());
        }

        let mut inbound = tokio::select! {
            biased;
            _ = socket.cancel.cancelled() => return Err(SocketError::ClosedLocally.into()),
            guard = socket.inbound.lock() => guard,
        };

        tokio::select! {
            biased;
            _ = socket.cancel.cancelled() => Err(SocketError::ClosedLocally.into()),
            frame = inbound.recv() => match frame {
                Some(frame) => frame,
                None => Err(socket.closed_error().into()),
            },
        }
    }
}

/// Owns the transport for one socket
struct Driver<T> {
    url: Url,
    state: watch::Sender<SocketState>,
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::Sender<Result<T>>,
    cancel: CancellationToken,
}

impl<T> Driver<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn run(mut self) {
        let reason = self.session().await;
        tracing::debug!(url = %self.url, reason = %reason, "socket session ended");
        // Published before the inbound sender drops, so a consumer that sees the
        // queue end can read how the session ended.
        self.state.send_replace(SocketState::Closed(reason));
    }

    async fn session(&mut self) -> SocketError {
        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SocketError::ClosedLocally,
            result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
        };

        let stream = match connected {
            Ok((stream, _response)) => stream,
            Err(e) => {
                return SocketError::ConnectFailed {
                    url: self.url.to_string(),
                    reason: e.to_string(),
                };
            }
        };

        self.state.send_replace(SocketState::Open);
        tracing::debug!(url = %self.url, "socket open");

        let (mut sink, mut stream) = stream.split();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await;
                    return SocketError::ClosedLocally;
                }
                Some(payload) = self.outbound.recv() => {
                    if let Err(e) = sink.send(Message::Text(payload)).await {
                        return SocketError::ClosedUnexpectedly { reason: e.to_string() };
                    }
                }
                frame = stream.next() => {
                    let parsed = match frame {
                        Some(Ok(Message::Text(text))) => {
                            serde_json::from_str::<T>(&text).map_err(Error::from)
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            serde_json::from_slice::<T>(&bytes).map_err(Error::from)
                        }
                        Some(Ok(Message::Close(frame))) => return peer_closed(frame),
                        // ping/pong are answered by tungstenite
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            return SocketError::ClosedUnexpectedly { reason: e.to_string() };
                        }
                        None => {
                            return SocketError::ClosedByPeer { code: None, reason: String::new() };
                        }
                    };

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await;
                            return SocketError::ClosedLocally;
                        }
                        sent = self.inbound.send(parsed) => {
                            if sent.is_err() {
                                // the socket handle is gone
                                return SocketError::ClosedLocally;
                            }
                        }
                    }
                }
            }
        }
    }
}

fn peer_closed(frame: Option<CloseFrame<'_>>) -> SocketError {
    match frame {
        Some(frame) => SocketError::ClosedByPeer {
            code: Some(u16::from(frame.code)),
            reason: frame.reason.to_string(),
        },
        None => SocketError::ClosedByPeer {
            code: None,
            reason: String::new(),
        },
    }
}
