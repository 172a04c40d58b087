use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ProtocolError {
    InvalidMessage { reason: String },
    RateLimitExceeded,
    NotJoined,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidMessage { reason } => write!(f, "Invalid message: {}", reason),
            ProtocolError::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            ProtocolError::NotJoined => write!(f, "Join the game before guessing"),
        }
    }
}
