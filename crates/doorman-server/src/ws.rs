//! WebSocket endpoints.
//!
//! Each socket is split into two tasks:
//!
//! ```text
//!   connection channel ──send task──▶ socket
//!   socket ──recv task──▶ AccessService
//! ```
//!
//! Whichever task ends first (client closed, channel dropped because the
//! connection was superseded, gateway shutdown) aborts the other, and the
//! connection is unregistered.

use crate::state::AppState;
use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use doorman_network::FrameReceiver;
use doorman_protocol::DeviceFrame;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Observer upgrade on `/ws`.
pub async fn observer_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_observer(socket, state))
}

/// Controller upgrade on `/ws/{door_id}`.
pub async fn device_handler(
    ws: WebSocketUpgrade,
    Path(door_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_device(socket, door_id, state))
}

async fn handle_observer(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let connections = state.connections().clone();
    let (conn_id, rx) = connections.connect_observer().await;

    info!(connection_id = %conn_id, "Observer connected");

    let mut send_task = spawn_writer(sender, rx);

    let service = state.service.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => service.handle_observer_frame(conn_id, &text).await,
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
        _ = state.shutdown.cancelled() => {
            send_task.abort();
            recv_task.abort();
        }
    }

    connections.disconnect_observer(conn_id).await;
    info!(connection_id = %conn_id, "Observer disconnected");
}

async fn handle_device(socket: WebSocket, raw_id: String, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let door_id = match state.service.admit_device(&raw_id).await {
        Ok(door_id) => door_id,
        Err(err) => {
            warn!(device_id = %raw_id, error = %err, "Device connection rejected");
            let frame = DeviceFrame::Error {
                message: err.to_string(),
            };
            if let Ok(text) = frame.to_json() {
                let _ = sender.send(Message::Text(text)).await;
            }
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let connections = state.connections().clone();
    let (conn_id, rx) = state.service.attach_device(&door_id).await;

    debug!(device_id = %door_id, connection_id = %conn_id, "Device socket opened");

    let mut send_task = spawn_writer(sender, rx);

    let service = state.service.clone();
    let reader_door = door_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    service.connections().touch_device(&reader_door, conn_id).await;
                    service.handle_device_frame(&reader_door, &text).await;
                }
                Message::Ping(_) | Message::Pong(_) => {
                    service.connections().touch_device(&reader_door, conn_id).await;
                }
                Message::Close(_) => break,
                Message::Binary(_) => {
                    debug!(device_id = %reader_door, "Ignoring binary frame");
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
        _ = state.shutdown.cancelled() => {
            send_task.abort();
            recv_task.abort();
        }
    }

    connections.disconnect_device(&door_id, conn_id).await;
    debug!(device_id = %door_id, connection_id = %conn_id, "Device socket closed");
}

/// Forward frames queued for a connection to its socket until either
/// side goes away.
fn spawn_writer(mut sender: SplitSink<WebSocket, Message>, mut rx: FrameReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    })
}
