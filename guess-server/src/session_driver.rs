use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use guess_core::{
    Delivery, EventSink, GameSession, QuestionPool, Scheduler, SessionConfig, SystemClock, Timer,
    TimerHandle,
};
use guess_types::{ConnectionId, SessionStatus};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::websocket::ConnectionManager;

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Game session is no longer running")]
    Closed,
}

/// Everything that can change the session, in the order it happened.
#[derive(Debug)]
pub enum SessionCommand {
    Join {
        connection_id: ConnectionId,
        name: String,
        reconnect_token: Option<String>,
    },
    Guess {
        connection_id: ConnectionId,
        guess: String,
    },
    Heartbeat {
        connection_id: ConnectionId,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    Timer(Timer),
    Sweep,
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable front door to the session task.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.sender.send(command).map_err(|_| SessionError::Closed)
    }

    pub fn join(
        &self,
        connection_id: ConnectionId,
        name: String,
        reconnect_token: Option<String>,
    ) -> Result<(), SessionError> {
        self.send(SessionCommand::Join {
            connection_id,
            name,
            reconnect_token,
        })
    }

    pub fn submit_guess(&self, connection_id: ConnectionId, guess: String) -> Result<(), SessionError> {
        self.send(SessionCommand::Guess {
            connection_id,
            guess,
        })
    }

    pub fn heartbeat(&self, connection_id: ConnectionId) -> Result<(), SessionError> {
        self.send(SessionCommand::Heartbeat { connection_id })
    }

    pub fn disconnect(&self, connection_id: ConnectionId) -> Result<(), SessionError> {
        self.send(SessionCommand::Disconnect { connection_id })
    }

    pub fn sweep(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Sweep)
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Status { reply })?;
        response.await.map_err(|_| SessionError::Closed)
    }

    /// Broadcasts the shutdown notice and stops the session task.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Shutdown { reply })?;
        response.await.map_err(|_| SessionError::Closed)
    }
}

/// Timers as spawned sleeps that feed `SessionCommand::Timer` back into the
/// session queue. Holds only a weak sender so pending timers never keep the
/// session alive on their own.
pub struct TokioScheduler {
    commands: mpsc::WeakUnboundedSender<SessionCommand>,
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
    next_id: u64,
}

impl TokioScheduler {
    pub fn new(commands: mpsc::WeakUnboundedSender<SessionCommand>) -> Self {
        Self {
            commands,
            tasks: HashMap::new(),
            next_id: 0,
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerHandle {
        self.tasks.retain(|_, task| !task.is_finished());

        let handle = TimerHandle(self.next_id);
        self.next_id += 1;

        let commands = self.commands.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(SessionCommand::Timer(timer));
            }
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}

/// Routes session output to the open sockets.
pub struct ConnectionSink {
    connections: Arc<ConnectionManager>,
}

impl ConnectionSink {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }
}

impl EventSink for ConnectionSink {
    fn deliver(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Broadcast(message) => self.connections.broadcast(message),
            Delivery::BroadcastExcept { except, message } => {
                self.connections.broadcast_except(except, message)
            }
            Delivery::Unicast { target, message } => {
                if let Err(e) = self.connections.send_to_connection(target, message) {
                    debug!("Dropping message for {}: {}", target, e);
                }
            }
        }
    }
}

/// Start the session task. It runs until `SessionHandle::shutdown` or until
/// every handle is dropped.
pub fn spawn_session(
    config: SessionConfig,
    pool: QuestionPool,
    connections: Arc<ConnectionManager>,
) -> (SessionHandle, JoinHandle<()>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let scheduler = TokioScheduler::new(sender.downgrade());
    let session = GameSession::new(
        config,
        pool,
        Arc::new(SystemClock),
        Box::new(ConnectionSink::new(connections)),
        Box::new(scheduler),
    );

    let task = tokio::spawn(run_session(session, receiver));
    (SessionHandle { sender }, task)
}

async fn run_session(
    mut session: GameSession,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
) {
    info!("Game session started");

    while let Some(command) = commands.recv().await {
        match command {
            SessionCommand::Join {
                connection_id,
                name,
                reconnect_token,
            } => {
                let outcome = session.join(connection_id, &name, reconnect_token.as_deref());
                debug!("Join from {}: {:?}", connection_id, outcome);
            }
            SessionCommand::Guess {
                connection_id,
                guess,
            } => session.submit_guess(connection_id, &guess),
            SessionCommand::Heartbeat { connection_id } => session.heartbeat(connection_id),
            SessionCommand::Disconnect { connection_id } => session.disconnect(connection_id),
            SessionCommand::Timer(timer) => session.handle_timer(timer),
            SessionCommand::Sweep => {
                let purged = session.sweep();
                if purged > 0 {
                    info!("Purged {} players past the reconnect window", purged);
                }
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(session.status());
            }
            SessionCommand::Shutdown { reply } => {
                session.shutdown();
                let _ = reply.send(());
                break;
            }
        }
    }

    info!("Game session stopped");
}
