//! WebSocket handler for real-time step updates.
//!
//! Each client first receives a `{"type":"snapshot", ...}` frame with the
//! current [`StepSnapshot`], then every [`StepEvent`] as it is published.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use stepcount_core::StepSnapshot;

use crate::state::AppState;

/// Create the WebSocket router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/ws", get(ws_handler))
}

/// Initial (and post-lag) state frame.
#[derive(Debug, Serialize)]
pub struct SnapshotFrame {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(flatten)]
    pub snapshot: StepSnapshot,
}

/// Serialize a snapshot frame.
pub fn snapshot_frame(snapshot: StepSnapshot) -> serde_json::Result<String> {
    serde_json::to_string(&SnapshotFrame {
        kind: "snapshot",
        snapshot,
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so nothing published meanwhile is lost.
    let mut rx = state.manager.subscribe();

    info!("WebSocket client connected");

    match snapshot_frame(state.manager.snapshot().await) {
        Ok(json) => {
            if sender.send(Message::Text(json.into())).await.is_err() {
                info!("WebSocket client disconnected during initial snapshot");
                return;
            }
        }
        Err(e) => warn!("Failed to serialize snapshot: {}", e),
    }

    let manager = Arc::clone(&state.manager);
    let mut send_task = tokio::spawn(async move {
        loop {
            let json = match rx.recv().await {
                Ok(event) => serde_json::to_string(&event),
                Err(RecvError::Lagged(n)) => {
                    debug!("WebSocket client lagged by {} events, resyncing", n);
                    snapshot_frame(manager.snapshot().await)
                }
                Err(RecvError::Closed) => break,
            };
            let json = match json {
                Ok(j) => j,
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        },
        _ = &mut recv_task => {
            send_task.abort();
        },
    }

    info!("WebSocket client disconnected");
}
