use std::sync::Arc;
use tracing::{info, warn};

use crate::session_driver::SessionHandle;
use crate::websocket::connection::ConnectionManager;
use guess_types::{ClientMessage, ConnectionId, ProtocolError, ServerMessage};

#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    session: SessionHandle,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        session: SessionHandle,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            session,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), ProtocolError> {
        self.connection_manager.update_activity(self.connection_id);

        match message {
            ClientMessage::JoinGame {
                name,
                reconnect_token,
            } => self.handle_join(name, reconnect_token).await,
            ClientMessage::SubmitGuess { guess } => self.handle_submit_guess(guess).await,
            ClientMessage::Heartbeat => self.handle_heartbeat().await,
        }
    }

    pub async fn handle_disconnect(&self) {
        if !self.connection_manager.is_joined(self.connection_id) {
            return;
        }

        info!("Handling disconnect for connection {}", self.connection_id);
        if let Err(e) = self.session.disconnect(self.connection_id) {
            warn!("Could not report disconnect of {}: {}", self.connection_id, e);
        }
    }

    async fn handle_join(
        &self,
        name: String,
        reconnect_token: Option<String>,
    ) -> Result<(), ProtocolError> {
        info!("Connection {} joining as '{}'", self.connection_id, name.trim());

        // Joined before the session runs so the join's own broadcasts reach it.
        self.connection_manager.mark_joined(self.connection_id);
        if let Err(e) = self.session.join(self.connection_id, name, reconnect_token) {
            warn!("Join from {} dropped: {}", self.connection_id, e);
        }
        Ok(())
    }

    async fn handle_submit_guess(&self, guess: String) -> Result<(), ProtocolError> {
        if !self.connection_manager.is_joined(self.connection_id) {
            return Err(ProtocolError::NotJoined);
        }

        if let Err(e) = self.session.submit_guess(self.connection_id, guess) {
            warn!("Guess from {} dropped: {}", self.connection_id, e);
        }
        Ok(())
    }

    async fn handle_heartbeat(&self) -> Result<(), ProtocolError> {
        // Connection activity was already refreshed above.
        if self.connection_manager.is_joined(self.connection_id) {
            let _ = self.session.heartbeat(self.connection_id);
        }
        Ok(())
    }

    pub fn send_error(&self, error: ProtocolError) {
        if let Err(e) = self
            .connection_manager
            .send_to_connection(self.connection_id, ServerMessage::Error { error })
        {
            warn!("Failed to send error to {}: {}", self.connection_id, e);
        }
    }
}
