//! Shared test helpers: a scriptable local WebSocket agent and a recording [`TaskApi`].

use crate::error::{Error, Result};
use crate::remote::TaskApi;
use crate::types::TaskId;
use async_trait::async_trait;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

/// A frame the agent should send to the connected client
#[derive(Debug)]
pub(crate) enum AgentFrame {
    Text(String),
    Close,
    Drop,
}

#[derive(Clone)]
struct AgentState {
    outgoing: Arc<parking_lot::Mutex<Option<mpsc::UnboundedReceiver<AgentFrame>>>>,
    incoming: mpsc::UnboundedSender<String>,
    query: Arc<parking_lot::Mutex<Option<String>>>,
}

/// Local agent serving one WebSocket session at any path
///
/// Frames pushed before the client connects are queued and delivered in order once
/// it does.
pub(crate) struct FakeAgent {
    addr: std::net::SocketAddr,
    outgoing: mpsc::UnboundedSender<AgentFrame>,
    incoming: mpsc::UnboundedReceiver<String>,
    query: Arc<parking_lot::Mutex<Option<String>>>,
    server: tokio::task::JoinHandle<()>,
}

impl FakeAgent {
    pub(crate) async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let query = Arc::new(parking_lot::Mutex::new(None));

        let state = AgentState {
            outgoing: Arc::new(parking_lot::Mutex::new(Some(outgoing_rx))),
            incoming: incoming_tx,
            query: query.clone(),
        };

        let app = Router::new()
            .route("/*path", get(upgrade))
            .with_state(state);

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            query,
            server,
        }
    }

    /// Base URL of the agent (`ws://127.0.0.1:<port>/`)
    pub(crate) fn base_url(&self) -> Url {
        Url::parse(&format!("ws://{}/", self.addr)).unwrap()
    }

    /// Socket URL for an endpoint
    pub(crate) fn url(&self, endpoint: &str) -> Url {
        self.base_url().join(endpoint).unwrap()
    }

    /// Queue a text frame for the client
    pub(crate) fn push(&self, text: &str) {
        self.outgoing
            .send(AgentFrame::Text(text.to_string()))
            .unwrap();
    }

    /// Queue a JSON frame for the client
    pub(crate) fn push_json(&self, value: serde_json::Value) {
        self.push(&value.to_string());
    }

    /// Close the client connection with a close frame
    pub(crate) fn close_connection(&self) {
        let _ = self.outgoing.send(AgentFrame::Close);
    }

    /// Drop the connection without a close handshake
    pub(crate) fn drop_connection(&self) {
        let _ = self.outgoing.send(AgentFrame::Drop);
    }

    /// Next text frame sent by the client, or None after two seconds
    pub(crate) async fn received(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(2), self.incoming.recv())
            .await
            .ok()
            .flatten()
    }

    /// Raw query string of the connection request
    pub(crate) fn query(&self) -> Option<String> {
        self.query.lock().clone()
    }
}

impl Drop for FakeAgent {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn upgrade(
    ws: WebSocketUpgrade,
    RawQuery(query): RawQuery,
    State(state): State<AgentState>,
) -> impl IntoResponse {
    *state.query.lock() = query;
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn session(socket: WebSocket, state: AgentState) {
    let Some(mut outgoing) = state.outgoing.lock().take() else {
        return;
    };
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(AgentFrame::Text(text)) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(AgentFrame::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                Some(AgentFrame::Drop) => return,
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = state.incoming.send(text);
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// A socket URL on a port nothing listens on
pub(crate) async fn closed_port_url() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("ws://{addr}/download/")).unwrap()
}

/// [`TaskApi`] that records every call and either accepts or rejects it
#[derive(Default)]
pub(crate) struct RecordingApi {
    calls: parking_lot::Mutex<Vec<(&'static str, TaskId)>>,
    fail: bool,
}

impl RecordingApi {
    /// An api whose every call fails with a 500
    pub(crate) fn failing() -> Self {
        Self {
            calls: parking_lot::Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Calls made so far, as `(action, id)`
    pub(crate) fn calls(&self) -> Vec<(&'static str, TaskId)> {
        self.calls.lock().clone()
    }

    fn record(&self, action: &'static str, id: &TaskId) -> Result<()> {
        self.calls.lock().push((action, id.clone()));
        if self.fail {
            return Err(Error::Api {
                url: format!("http://agent.test/download/{action}/{id}"),
                status: 500,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskApi for RecordingApi {
    async fn retry(&self, id: &TaskId) -> Result<()> {
        self.record("retry", id)
    }

    async fn start(&self, id: &TaskId) -> Result<()> {
        self.record("start", id)
    }

    async fn stop(&self, id: &TaskId) -> Result<()> {
        self.record("stop", id)
    }

    async fn remove(&self, id: &TaskId) -> Result<()> {
        self.record("remove", id)
    }
}
