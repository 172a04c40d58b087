use guess_types::{ConnectionId, PlayerStatus, PlayerView};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ReconnectPolicy;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: ConnectionId,
    pub name: String,
    pub score: i32,
    pub status: PlayerStatus,
    /// Set on the first guess of a round, correct or not. Only a new round
    /// clears it.
    pub has_submitted: bool,
    /// Guessed correctly in the current round. Survives a reconnect so the
    /// player comes back as `Answered`.
    pub answered_this_round: bool,
    pub last_seen: Instant,
    pub disconnected_at: Option<Instant>,
    pub reconnect_token: String,
    join_seq: u64,
}

impl Player {
    fn new(id: ConnectionId, name: String, join_seq: u64, now: Instant) -> Self {
        Self {
            id,
            name,
            score: 0,
            status: PlayerStatus::Active,
            has_submitted: false,
            answered_this_round: false,
            last_seen: now,
            disconnected_at: None,
            reconnect_token: new_token(),
            join_seq,
        }
    }

    /// Connected, whether or not they answered yet.
    pub fn is_present(&self) -> bool {
        self.status != PlayerStatus::Disconnected
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            score: self.score,
            status: self.status,
        }
    }
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectMatch {
    Token,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    New,
    /// The connection had already joined; only the name was refreshed.
    AlreadyJoined,
    Reconnected {
        previous_id: ConnectionId,
        matched_by: ReconnectMatch,
    },
}

/// Players keyed by connection id. Insertion order is tracked separately so
/// the public list stays in join order.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<ConnectionId, Player>,
    next_seq: u64,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: ConnectionId,
        name: String,
        reconnect_token: Option<&str>,
        policy: ReconnectPolicy,
        now: Instant,
    ) -> JoinOutcome {
        if let Some(existing) = self.players.get_mut(&id) {
            existing.name = name;
            existing.last_seen = now;
            return JoinOutcome::AlreadyJoined;
        }

        if let Some((previous_id, matched_by)) =
            self.find_reconnectable(&name, reconnect_token, policy)
        {
            if let Some(mut player) = self.players.remove(&previous_id) {
                player.id = id;
                player.name = name;
                player.status = if player.answered_this_round {
                    PlayerStatus::Answered
                } else {
                    PlayerStatus::Active
                };
                player.disconnected_at = None;
                player.last_seen = now;
                player.reconnect_token = new_token();

                match matched_by {
                    ReconnectMatch::Token => info!(
                        "Player '{}' reconnected by token ({} -> {}), score {}",
                        player.name, previous_id, id, player.score
                    ),
                    ReconnectMatch::Name => warn!(
                        "Player '{}' reinstated by display name only ({} -> {}), score {}",
                        player.name, previous_id, id, player.score
                    ),
                }

                self.players.insert(id, player);
                return JoinOutcome::Reconnected {
                    previous_id,
                    matched_by,
                };
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.players.insert(id, Player::new(id, name, seq, now));
        JoinOutcome::New
    }

    fn find_reconnectable(
        &self,
        name: &str,
        reconnect_token: Option<&str>,
        policy: ReconnectPolicy,
    ) -> Option<(ConnectionId, ReconnectMatch)> {
        if let Some(token) = reconnect_token {
            if let Some(player) = self
                .players
                .values()
                .find(|p| !p.is_present() && p.reconnect_token == token)
            {
                return Some((player.id, ReconnectMatch::Token));
            }
        }

        if policy == ReconnectPolicy::TokenOrName {
            // Oldest matching player wins if several share the name.
            return self
                .players
                .values()
                .filter(|p| !p.is_present() && p.name == name)
                .min_by_key(|p| p.join_seq)
                .map(|p| (p.id, ReconnectMatch::Name));
        }

        None
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Returns false if the player was unknown or already disconnected.
    pub fn mark_disconnected(&mut self, id: &ConnectionId, now: Instant) -> bool {
        match self.players.get_mut(id) {
            Some(player) if player.is_present() => {
                player.status = PlayerStatus::Disconnected;
                player.disconnected_at = Some(now);
                true
            }
            _ => false,
        }
    }

    pub fn touch(&mut self, id: &ConnectionId, now: Instant) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.last_seen = now;
                true
            }
            None => false,
        }
    }

    pub fn present_count(&self) -> usize {
        self.players.values().filter(|p| p.is_present()).count()
    }

    /// True when at least one player is connected and all of them answered.
    pub fn all_present_answered(&self) -> bool {
        let mut present = self.players.values().filter(|p| p.is_present()).peekable();
        present.peek().is_some() && present.all(|p| p.status == PlayerStatus::Answered)
    }

    /// Clears every submission flag, including those of disconnected players.
    pub fn reset_for_new_round(&mut self) {
        for player in self.players.values_mut() {
            player.has_submitted = false;
            player.answered_this_round = false;
            if player.status == PlayerStatus::Answered {
                player.status = PlayerStatus::Active;
            }
        }
    }

    pub fn settle_round(&mut self) {
        for player in self.players.values_mut() {
            player.answered_this_round = false;
            if player.status == PlayerStatus::Answered {
                player.status = PlayerStatus::Active;
            }
        }
    }

    pub fn views(&self) -> Vec<PlayerView> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.join_seq);
        players.into_iter().map(Player::view).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
