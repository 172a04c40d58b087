use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{ConnectionId, PlayerView, ProtocolError, RoundSnapshot};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    JoinGame {
        name: String,
        reconnect_token: Option<String>,
    },
    SubmitGuess {
        guess: String,
    },
    Heartbeat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    PlayerJoined {
        player_id: ConnectionId,
        reconnect_token: String,
        players: Vec<PlayerView>,
    },
    PlayerListUpdate {
        players: Vec<PlayerView>,
    },
    RoundStart(RoundSnapshot),
    TimerUpdate {
        seconds_remaining: u32,
    },
    ChatMessage {
        player_name: String,
        message: String,
        is_wrong: bool,
    },
    CorrectGuessSelf {
        points: i32,
        rank: u32,
        score: i32,
    },
    // The guess text is never included here.
    CorrectGuessOthers {
        name: String,
        points: i32,
        rank: u32,
    },
    RoundEnd {
        answer: String,
        correct_guessers: Vec<String>,
    },
    AlreadyAnswered {
        message: String,
    },
    ServerShutdown {
        message: String,
    },
    Error {
        error: ProtocolError,
    },
}
