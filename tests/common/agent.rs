//! A local download agent: the task socket plus the HTTP action endpoints

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

enum Frame {
    Json(Value),
    Close,
}

#[derive(Clone)]
struct AgentState {
    frames: Arc<parking_lot::Mutex<Option<mpsc::UnboundedReceiver<Frame>>>>,
    actions: Arc<parking_lot::Mutex<Vec<(String, String)>>>,
    rejected: Arc<parking_lot::Mutex<HashSet<String>>>,
}

/// Agent serving one socket session at `/download/` and actions at
/// `/download/{action}/{id}`
pub struct MockAgent {
    addr: std::net::SocketAddr,
    frames: mpsc::UnboundedSender<Frame>,
    state: AgentState,
    server: tokio::task::JoinHandle<()>,
}

impl MockAgent {
    /// Start the agent on an ephemeral port
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();

        let state = AgentState {
            frames: Arc::new(parking_lot::Mutex::new(Some(frames_rx))),
            actions: Arc::new(parking_lot::Mutex::new(Vec::new())),
            rejected: Arc::new(parking_lot::Mutex::new(HashSet::new())),
        };

        let app = Router::new()
            .route("/download/", get(upgrade))
            .route("/download/:action/:id", get(action))
            .with_state(state.clone());

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            frames: frames_tx,
            state,
            server,
        }
    }

    /// HTTP base URL, suitable for `server.api_url`
    pub fn api_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Push a message to the connected client
    pub fn push(&self, message: Value) {
        let _ = self.frames.send(Frame::Json(message));
    }

    /// Close the socket with a close frame
    pub fn close(&self) {
        let _ = self.frames.send(Frame::Close);
    }

    /// Answer every action on this task id with a 500
    pub fn reject_actions_for(&self, id: &str) {
        self.state.rejected.lock().insert(id.to_string());
    }

    /// Actions received so far, as `(action, id)`
    pub fn actions(&self) -> Vec<(String, String)> {
        self.state.actions.lock().clone()
    }
}

impl Drop for MockAgent {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AgentState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn session(socket: WebSocket, state: AgentState) {
    let Some(mut frames) = state.frames.lock().take() else {
        return;
    };
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(Frame::Json(value)) => {
                    if sink.send(Message::Text(value.to_string())).await.is_err() {
                        break;
                    }
                }
                Some(Frame::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn action(
    Path((action, id)): Path<(String, String)>,
    State(state): State<AgentState>,
) -> StatusCode {
    state.actions.lock().push((action, id.clone()));
    if state.rejected.lock().contains(&id) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}
