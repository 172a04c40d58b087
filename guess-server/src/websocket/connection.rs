use dashmap::DashMap;
use guess_types::{ConnectionId, ServerMessage};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub last_activity: Instant,
    /// Set once the connection has sent `JoinGame`.
    pub joined: bool,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            last_activity: now,
            joined: false,
            sender,
        };

        (connection, receiver)
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }

    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

/// Outbound channels for every open socket. All methods are synchronous so
/// the session can push events without awaiting.
#[derive(Default)]
pub struct ConnectionManager {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_connection(&self, id: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id);
        self.connections.insert(id, conn);
        receiver
    }

    pub fn remove_connection(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id).map(|(_, conn)| conn)
    }

    pub fn update_activity(&self, id: ConnectionId) {
        if let Some(mut connection) = self.connections.get_mut(&id) {
            connection.update_activity();
        }
    }

    pub fn mark_joined(&self, id: ConnectionId) {
        if let Some(mut connection) = self.connections.get_mut(&id) {
            connection.joined = true;
        }
    }

    pub fn is_joined(&self, id: ConnectionId) -> bool {
        self.connections
            .get(&id)
            .map(|conn| conn.joined)
            .unwrap_or(false)
    }

    pub fn send_to_connection(&self, id: ConnectionId, message: ServerMessage) -> Result<(), String> {
        match self.connections.get(&id) {
            Some(connection) => connection.send_message(message),
            None => Err("Connection not found".to_string()),
        }
    }

    /// Send to every joined connection.
    pub fn broadcast(&self, message: ServerMessage) {
        for connection in self.connections.iter().filter(|conn| conn.joined) {
            let _ = connection.send_message(message.clone());
        }
    }

    pub fn broadcast_except(&self, except_connection: ConnectionId, message: ServerMessage) {
        for connection in self
            .connections
            .iter()
            .filter(|conn| conn.joined && conn.id != except_connection)
        {
            let _ = connection.send_message(message.clone());
        }
    }

    /// Drops connections idle for longer than `timeout` and returns their ids.
    pub fn cleanup_inactive_connections(&self, timeout: Duration) -> Vec<ConnectionId> {
        let inactive_connections: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|conn| conn.is_inactive(timeout))
            .map(|conn| conn.id)
            .collect();

        for connection_id in &inactive_connections {
            tracing::info!("Removing inactive connection: {}", connection_id);
            self.remove_connection(*connection_id);
        }

        inactive_connections
    }

    /// Drop every outbound channel. Socket writers flush what is already
    /// queued, then close.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        count
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn joined_count(&self) -> usize {
        self.connections.iter().filter(|conn| conn.joined).count()
    }
}
