use std::str::FromStr;
use std::time::Duration;

use crate::ScorePolicy;

/// How a join is matched to a disconnected player's retained state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Reconnection token first, then an exact display-name match.
    /// Name matching lets anyone claim a disconnected player's score.
    #[default]
    TokenOrName,
    TokenOnly,
}

impl FromStr for ReconnectPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "token-or-name" => Ok(ReconnectPolicy::TokenOrName),
            "token-only" => Ok(ReconnectPolicy::TokenOnly),
            other => Err(format!("unknown reconnect policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub round_duration: Duration,
    pub intermission: Duration,          // round end -> next round start
    pub early_end_grace: Duration,       // last correct guess -> reveal
    pub question_retry_delay: Duration,  // pool failure -> next attempt
    pub grace_window: Duration,          // disconnect -> purge
    pub scoring: ScorePolicy,
    pub reconnect_policy: ReconnectPolicy,
    pub max_name_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(60),
            intermission: Duration::from_secs(5),
            early_end_grace: Duration::from_millis(1500),
            question_retry_delay: Duration::from_secs(2),
            grace_window: Duration::from_secs(45),
            scoring: ScorePolicy::default(),
            reconnect_policy: ReconnectPolicy::default(),
            max_name_length: 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_policy_parsing() {
        assert_eq!(
            "token-only".parse::<ReconnectPolicy>(),
            Ok(ReconnectPolicy::TokenOnly)
        );
        assert_eq!(
            " Token-Or-Name ".parse::<ReconnectPolicy>(),
            Ok(ReconnectPolicy::TokenOrName)
        );
        assert!("name".parse::<ReconnectPolicy>().is_err());
    }
}
