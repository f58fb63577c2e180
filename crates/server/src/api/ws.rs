//! WebSocket stream of a session's progress events.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use delver_core::{ResearchEvent, ResearchOrchestrator};

use super::handlers::api_error;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// WebSocket upgrade handler for `/research/{id}/events`.
///
/// Unknown sessions get a 404 before any upgrade is attempted.
pub async fn research_events(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(session) = state.session(&id).await else {
        return api_error(StatusCode::NOT_FOUND, format!("Session not found: {}", id))
            .into_response();
    };

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, session)),
        Err(rejection) => rejection.into_response(),
    }
}

/// Forward one session's events to a single WebSocket connection.
async fn handle_socket(socket: WebSocket, session: Arc<ResearchOrchestrator>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before checking the state so no event falls in between
    let mut rx = session.subscribe();
    let session_id = session.id().to_string();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!(session_id = %session_id, "WebSocket client connected");

    if !session.is_running() && session.state().await.is_terminal() {
        debug!(session_id = %session_id, "Session already finished, closing stream");
        let _ = sender.send(Message::Close(None)).await;
        WS_CONNECTIONS_ACTIVE.dec();
        return;
    }

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    WS_MESSAGES_SENT.with_label_values(&[event.kind()]).inc();
                    let finished = matches!(event, ResearchEvent::SessionFinished { .. });

                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                debug!("WebSocket send failed, client disconnected");
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to serialize ResearchEvent: {}", e);
                        }
                    }

                    if finished {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("WebSocket client lagged, skipped {} events", n);
                    WS_LAG_EVENTS.inc();
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event channel closed");
                    break;
                }
            }
        }
    });

    // Drain client frames until it closes; nothing is expected from it
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Ignoring client text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!(session_id = %session_id, "WebSocket client disconnected");
}
