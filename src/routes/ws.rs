// WebSocket stats stream: one reconciler session per connection

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::{ContainerState, LiveStats};
use crate::reconciler::{ReconcilerSession, StatsBackend};

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);

pub(super) async fn ws_container_stats(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_container_stats(socket, id, state).await {
            tracing::info!("Container stats stream error: {}", e);
        }
    })
}

async fn stream_container_stats(
    mut socket: WebSocket,
    id: String,
    state: AppState,
) -> anyhow::Result<()> {
    let container_state = match state.engine.container(&id).await {
        Ok(c) => c.state,
        Err(e) => {
            tracing::debug!(container_id = %id, error = %e, "container lookup failed");
            ContainerState::Unknown
        }
    };
    tracing::info!(container_id = %id, state = ?container_state, "Client connected to stats stream");

    let send_timeout = Duration::from_secs(state.config.stats.ws_send_timeout_secs);
    let backend: Arc<dyn StatsBackend> = state.engine.clone();
    let session = ReconcilerSession::start(backend, &id, container_state, state.reconciler.clone());
    let mut updates = session.watch();

    let initial = updates.borrow_and_update().clone();
    if send_json(&mut socket, &initial, send_timeout).await? {
        let mut ping_interval = tokio::time::interval_at(
            tokio::time::Instant::now() + WS_PING_INTERVAL,
            WS_PING_INTERVAL,
        );
        ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let stats: LiveStats = updates.borrow_and_update().clone();
                    if !send_json(&mut socket, &stats, send_timeout).await? {
                        break;
                    }
                }
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                _ = ping_interval.tick() => {
                    let r = timeout(send_timeout, socket.send(Message::Ping(Bytes::new()))).await;
                    if !matches!(r, Ok(Ok(()))) {
                        break;
                    }
                }
            }
        }
    }

    session.join().await;
    tracing::info!(container_id = %id, "Client disconnected from stats stream");
    Ok(())
}

/// Send one JSON text frame. `Ok(false)` means the client is gone or too slow.
async fn send_json<T: Serialize>(
    socket: &mut WebSocket,
    value: &T,
    send_timeout: Duration,
) -> anyhow::Result<bool> {
    let json = serde_json::to_string(value)?;
    let r = timeout(send_timeout, socket.send(Message::Text(json.into()))).await;
    Ok(matches!(r, Ok(Ok(()))))
}
