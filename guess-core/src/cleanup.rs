use std::time::{Duration, Instant};
use tracing::info;

use crate::{Player, PlayerRegistry};

/// Purges players whose grace window ran out before they reconnected.
pub struct DisconnectCleanup {
    pub grace_window: Duration,
}

impl Default for DisconnectCleanup {
    fn default() -> Self {
        Self {
            grace_window: Duration::from_secs(45),
        }
    }
}

impl DisconnectCleanup {
    pub fn new(grace_window: Duration) -> Self {
        Self { grace_window }
    }

    pub fn is_expired(&self, player: &Player, now: Instant) -> bool {
        match player.disconnected_at {
            Some(at) => now.saturating_duration_since(at) >= self.grace_window,
            None => false,
        }
    }

    /// Remove expired players and return them.
    pub fn purge_expired(&self, registry: &mut PlayerRegistry, now: Instant) -> Vec<Player> {
        let expired: Vec<_> = registry
            .iter()
            .filter(|player| self.is_expired(player, now))
            .map(|player| player.id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| registry.remove(&id))
            .inspect(|player| {
                info!(
                    "Purged player '{}' ({}) after grace window, score {} discarded",
                    player.name, player.id, player.score
                )
            })
            .collect()
    }
}
