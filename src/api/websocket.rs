//! WebSocket stream of generation events.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info};

use super::state::AppState;
use super::system::error as error_response;
use crate::generation::{GenerationEvent, Subscription};

/// WebSocket upgrade handler for one presentation.
///
/// Unknown ids are refused before the upgrade. Once connected the client
/// receives the catch-up `presentation_state` frame, then live events.
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(session) = state.orchestrator().session(&id) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Presentation not found: {id}"),
        )
        .into_response();
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    ws.on_upgrade(move |socket| async move {
        let subscription = session.attach().await;
        handle_socket(socket, id, subscription).await
    })
}

async fn send_event(socket: &mut WebSocket, event: &GenerationEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize {} event: {}", event.kind(), e);
            return true;
        }
    };
    if let Err(e) = socket.send(Message::Text(json.into())).await {
        debug!("Failed to send {} event: {}", event.kind(), e);
        return false;
    }
    true
}

/// Forward subscription events until either side goes away.
async fn handle_socket(mut socket: WebSocket, id: String, subscription: Subscription) {
    info!(presentation = %id, subscriber = subscription.id, "WebSocket client connected");

    let Subscription {
        catch_up,
        mut events,
        ..
    } = subscription;

    if send_event(&mut socket, &catch_up).await {
        loop {
            tokio::select! {
                msg = socket.recv() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            debug!("Received from client: {}", text);
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(presentation = %id, "Client closed connection");
                            break;
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            break;
                        }
                        _ => {}
                    }
                }

                event = events.recv() => {
                    match event {
                        Some(event) => {
                            if !send_event(&mut socket, &event).await {
                                break;
                            }
                        }
                        None => {
                            debug!(presentation = %id, "Event stream ended");
                            let _ = socket.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
            }
        }
    }

    info!(presentation = %id, "WebSocket client disconnected");
}
