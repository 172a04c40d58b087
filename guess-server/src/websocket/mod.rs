use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::session_driver::SessionHandle;
use guess_types::{ClientMessage, ConnectionId, ProtocolError};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;


pub use connection::ConnectionManager;
use handlers::MessageHandler;
pub use rate_limiter::RateLimiter;

pub async fn handle_connection(
    websocket: WebSocket,
    connection_manager: Arc<ConnectionManager>,
    session: SessionHandle,
    rate_limiter: RateLimiter,
) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut ws_sender, mut ws_receiver) = websocket.split();

    // Create connection and get receiver for outgoing messages
    let message_receiver = connection_manager.create_connection(connection_id);

    let message_handler = MessageHandler::new(connection_id, connection_manager.clone(), session);

    // Handle incoming messages
    let incoming_handler = {
        let message_handler = message_handler.clone();
        let mut rate_limiter = rate_limiter;

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) if msg.is_close() => break,
                    Ok(msg) => {
                        // A bad frame is answered and skipped; the socket stays open.
                        if let Err(e) = handle_message(msg, &mut rate_limiter, &message_handler).await {
                            warn!("Rejected message from {}: {}", connection_id, e);
                            message_handler.send_error(e);
                        }
                    }
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    // Handle outgoing messages
    let outgoing_handler = {
        async move {
            let mut receiver = message_receiver;

            while let Some(message) = receiver.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize message: {:?}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(Message::text(json)).await {
                    warn!("Failed to send message to {}: {:?}", connection_id, e);
                    break;
                }
            }

            let _ = ws_sender.close().await;
        }
    };

    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
    }

    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
    connection_manager.remove_connection(connection_id);
}

async fn handle_message(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
) -> Result<(), ProtocolError> {
    if !rate_limiter.check_rate_limit() {
        return Err(ProtocolError::RateLimitExceeded);
    }

    // Pings, pongs and binary frames carry nothing for us.
    if !msg.is_text() {
        return Ok(());
    }

    let text = msg.to_str().map_err(|_| ProtocolError::InvalidMessage {
        reason: "Invalid text message".to_string(),
    })?;

    let client_message: ClientMessage =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidMessage {
            reason: format!("Invalid JSON message: {}", e),
        })?;

    message_handler.handle_message(client_message).await
}
