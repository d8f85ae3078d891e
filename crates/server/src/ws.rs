//! Live-update WebSocket endpoint.
//!
//! Clients connect at `/` with their session cookie, send a single
//! `{"type": "join", "projectId": N}` frame and then receive server event
//! frames for that project. Buffered events (published while nobody was
//! subscribed) are flushed first.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::debug;

use database::project;

use crate::session::authenticate;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinFrame {
    #[serde(rename = "type")]
    kind: String,
    project_id: i64,
}

/// `GET /` - upgrade to the live-update channel.
pub async fn live_updates(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(user_id) => user_id,
        Err(err) => return err.into_response(),
    };

    ws.on_upgrade(move |socket| ws_loop(socket, state, user_id))
}

async fn ws_loop(mut socket: WebSocket, state: AppState, user_id: i64) {
    let Some(project_id) = wait_for_join(&mut socket, &state, user_id).await else {
        return;
    };

    debug!(user_id, project_id, "live-update subscriber joined");
    let (subscription, mut rx) = state.hub.subscribe(project_id);

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        let Ok(frame) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if socket.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Pings are answered by axum; other frames are ignored.
                    _ => {}
                }
            }
        }
    }

    state.hub.unsubscribe(subscription);
    debug!(user_id, project_id, "live-update subscriber left");
}

/// Read frames until a valid join for a project the user owns arrives.
/// Returns `None` when the socket closes or the join is not permitted.
async fn wait_for_join(socket: &mut WebSocket, state: &AppState, user_id: i64) -> Option<i64> {
    loop {
        let frame = match socket.recv().await? {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => return None,
            _ => continue,
        };

        let Ok(join) = serde_json::from_str::<JoinFrame>(&frame) else {
            continue;
        };
        if join.kind != "join" {
            continue;
        }

        match project::get_project(state.db.pool(), join.project_id).await {
            Ok(found) if found.user_id == user_id => return Some(join.project_id),
            _ => {
                // Not owned or absent: refuse and close.
                let _ = socket.send(Message::Close(None)).await;
                return None;
            }
        }
    }
}
