use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use dashmap::DashMap;
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time;
use tracing::{debug, info, warn};

use crate::protocol::{ClientSignal, ConnectionId, ServerSignal};
use crate::router::SignalSink;
use crate::server::AppState;
use crate::session::Session;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Frames queued per connection before further signals to it are dropped.
pub const OUTBOX_CAPACITY: usize = 256;

pub type ConnectionSender = mpsc::Sender<Message>;

/// Live WebSocket attachments by connection id.
#[derive(Clone, Default)]
pub struct ConnectionTable {
    peers: Arc<DashMap<ConnectionId, ConnectionSender>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, id: ConnectionId, tx: ConnectionSender) {
        self.peers.insert(id, tx);
    }

    pub fn detach(&self, id: ConnectionId) {
        self.peers.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl SignalSink for ConnectionTable {
    fn send(&self, to: ConnectionId, signal: &ServerSignal) {
        // Gone peers are simply skipped.
        let Some(peer_tx) = self.peers.get(&to) else {
            return;
        };
        match serde_json::to_string(signal) {
            Ok(text) => match peer_tx.try_send(Message::Text(text.into())) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(to = %to, "Outbox full, signal dropped");
                }
                // Writer already gone; the reader will clean up.
                Err(TrySendError::Closed(_)) => {}
            },
            Err(e) => warn!(to = %to, error = %e, "Failed to encode signal"),
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
    let id = ConnectionId::new();

    state.connections.attach(id, tx);
    state
        .connections
        .send(id, &ServerSignal::Welcome { connection_id: id });
    let mut session = Session::new(id, state.router.clone());
    info!(connection = %id, "Connection attached");

    // Writer: drain the outbox into the socket, keep the link warm
    let send_task = tokio::spawn(async move {
        let mut ping_interval = time::interval(PING_INTERVAL);
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    if sender.send(msg).await.is_err() { break; }
                }
                _ = ping_interval.tick() => {
                    if sender.send(Message::Ping(vec![].into())).await.is_err() { break; }
                }
            }
        }
    });

    // Reader: one frame at a time, in arrival order
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientSignal>(text.as_str()) {
                Ok(signal) => session.on_signal(signal),
                Err(e) => debug!(connection = %id, error = %e, "Malformed signal dropped"),
            },
            Ok(Message::Close(frame)) => {
                debug!(connection = %id, reason = ?frame, "Client initiated close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(connection = %id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Cleanup: leave the registry first, then drop the outbox
    session.close();
    state.connections.detach(id);
    send_task.abort();
    info!(connection = %id, "Connection closed");
}
