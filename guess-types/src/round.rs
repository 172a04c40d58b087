use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum RoundPhaseKind {
    Idle,
    Active,
    Ending,
}

/// What a client needs to render the current round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoundSnapshot {
    pub round_number: u64,
    pub question: String,
    pub image_url: String,
    pub time_remaining: u32,
}

/// Read-only health snapshot for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionStatus {
    pub player_count: usize,
    pub round_number: u64,
    pub phase: RoundPhaseKind,
}
