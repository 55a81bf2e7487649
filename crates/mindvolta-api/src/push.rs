//! WebSocket push channel.
//!
//! One socket per client session. The client joins as its authenticated
//! user, then sends messages. Each message is echoed right away to every
//! joined socket of that user, and the agent's reply follows on the same
//! sockets after the configured delay.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mindvolta_chat::dispatcher::check_receiver;
use mindvolta_chat::{Channel, ChatError, MessageView, PushEvent};

use crate::auth::AuthenticatedUser;
use crate::error::GENERIC_FAILURE;
use crate::state::AppState;

/// Largest text frame accepted from a client.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Client-to-server frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientFrame {
    JoinChat {
        #[serde(rename = "userId")]
        user_id: String,
    },
    SendMessage {
        #[serde(default)]
        message: String,
        #[serde(rename = "receiverId", default)]
        receiver_id: Option<String>,
    },
}

/// GET /api/chat/socket - upgrade to the push channel.
pub async fn socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Response {
    ws.max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state, user))
}

/// Drive one connection: write loop, read loop, then deregistration.
async fn handle_socket(socket: WebSocket, state: AppState, user: AuthenticatedUser) {
    let connection_id = Uuid::new_v4();
    info!(connection = %connection_id, user = %user.id(), "ws: new connection");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<PushEvent>();

    // Forwards events from the outbox to the socket.
    let write_handle = tokio::spawn(async move {
        while let Some(event) = outbox_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("ws: failed to encode event: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                debug!(connection = %connection_id, "ws: write loop closed");
                break;
            }
        }
    });

    let mut joined = false;

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(connection = %connection_id, error = %e, "ws: read error");
                break;
            }
        };

        let frame = match serde_json::from_str::<ClientFrame>(&text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(connection = %connection_id, error = %e, "ws: malformed frame");
                send_error(&outbox, "Malformed frame");
                continue;
            }
        };

        match frame {
            ClientFrame::JoinChat { user_id } => {
                if user_id != user.id() {
                    warn!(
                        connection = %connection_id,
                        user = %user.id(),
                        requested = %user_id,
                        "ws: join rejected for foreign user id"
                    );
                    send_error(&outbox, "Cannot join as another user");
                    continue;
                }
                state.registry.join(user.id(), connection_id, outbox.clone());
                joined = true;
                let _ = outbox.send(PushEvent::Joined { connection_id });
            }
            ClientFrame::SendMessage {
                message,
                receiver_id,
            } => {
                if !joined {
                    send_error(&outbox, "Join the chat before sending messages");
                    continue;
                }
                handle_send(&state, &user, &outbox, &message, receiver_id.as_deref()).await;
            }
        }
    }

    if joined {
        state.registry.leave(connection_id);
    }
    write_handle.abort();
    info!(connection = %connection_id, user = %user.id(), "ws: connection closed");
}

/// Run one push-channel message and acknowledge it to all of the user's sessions.
async fn handle_send(
    state: &AppState,
    user: &AuthenticatedUser,
    outbox: &mpsc::UnboundedSender<PushEvent>,
    text: &str,
    receiver_id: Option<&str>,
) {
    let result = match check_receiver(receiver_id) {
        Ok(()) => state.dispatcher.handle(user.id(), text, Channel::Push).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(exchange) => {
            let ack = PushEvent::ReceiveMessage(MessageView::for_viewer(
                &exchange.user_message,
                user.id(),
            ));
            if let Err(e) = state.registry.broadcast(user.id(), &ack) {
                debug!(user = %user.id(), "ws: ack broadcast failed, replying to sender: {}", e);
                let _ = outbox.send(ack);
            }
        }
        Err(e) => send_error(outbox, &client_message(&e)),
    }
}

/// Validation errors are shown verbatim; anything else stays generic.
fn client_message(err: &ChatError) -> String {
    if err.is_validation() {
        err.to_string()
    } else {
        GENERIC_FAILURE.to_string()
    }
}

fn send_error(outbox: &mpsc::UnboundedSender<PushEvent>, message: &str) {
    let _ = outbox.send(PushEvent::Error {
        message: message.to_string(),
    });
}
