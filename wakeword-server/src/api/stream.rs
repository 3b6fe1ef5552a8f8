//! WebSocket gateway for streaming wake-word detection

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::AppState;
use crate::error::ServiceError;
use crate::session::{DetectionSession, ServerMessage};

/// Outbound messages buffered per connection before the reader waits
const OUTBOUND_QUEUE: usize = 64;

/// How long queued replies may take to reach the peer once reading stops
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Work for the writer task
enum Outbound {
    Reply(ServerMessage),
    Close(CloseFrame<'static>),
}

/// Build streaming router serving the WebSocket endpoint at `path`
pub fn router(path: &str, state: Arc<AppState>) -> Router {
    Router::new()
        .route(path, get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
pub async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one streaming connection until the peer leaves or goes idle
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id = state.next_session_id();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE);

    info!("Session {} connected", session_id);

    let mut session = DetectionSession::new(
        session_id,
        Arc::clone(&state.registry),
        state.session_config(),
    );

    if let Err(e) = session.acquire_model() {
        error!("Session {} could not acquire a model: {}", session_id, e);
        // Queue is empty, so this cannot fail for lack of capacity
        let _ = tx.try_send(Outbound::Reply(ServerMessage::error(&e)));
    }

    // Forward queued messages to the peer in order
    let mut send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let msg = match outbound {
                Outbound::Reply(msg) => msg,
                Outbound::Close(frame) => {
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    break;
                }
            };

            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };

            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let idle_timeout = state.config.idle_timeout;

    // Read frames one at a time; every reply for a frame is queued before the next read
    let mut recv_task = tokio::spawn(async move {
        loop {
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, receiver.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        info!("Session {} idle for {:?}, closing", session_id, limit);
                        let frame = CloseFrame {
                            code: close_code::NORMAL,
                            reason: "idle timeout".into(),
                        };
                        let _ = tx.send(Outbound::Close(frame)).await;
                        break;
                    }
                },
                None => receiver.next().await,
            };

            let msg = match next {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    let err = ServiceError::ConnectionTerminated(e.to_string());
                    debug!("Session {}: {}", session_id, err);
                    break;
                }
                None => break,
            };

            let replies = match msg {
                Message::Binary(data) => session.handle_frame(&data),
                Message::Text(text) => session.handle_text(&text),
                Message::Ping(data) => {
                    // axum answers pings itself
                    trace!("Session {} received ping ({} bytes)", session_id, data.len());
                    continue;
                }
                Message::Pong(_) => continue,
                Message::Close(_) => {
                    info!("Session {} closed by client", session_id);
                    break;
                }
            };

            for reply in replies {
                if tx.send(Outbound::Reply(reply)).await.is_err() {
                    session.close();
                    return;
                }
            }
        }

        session.close();
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {
            // The reader dropped its sender; let the writer drain the queue
            if tokio::time::timeout(FLUSH_TIMEOUT, &mut send_task).await.is_err() {
                warn!("Session {} could not flush pending messages", session_id);
                send_task.abort();
            }
        }
    }

    info!("Session {} disconnected", session_id);
}
