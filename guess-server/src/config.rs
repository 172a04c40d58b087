use guess_core::{ReconnectPolicy, ScorePolicy, SessionConfig};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
    #[error("{name} must be greater than zero")]
    MustBePositive { name: &'static str },
    #[error("FIRST_CORRECT_POINTS ({first}) must be greater than OTHER_CORRECT_POINTS ({other})")]
    FirstMustExceedOthers { first: i32, other: i32 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub questions_file: String,
    pub round_duration_seconds: u64,
    pub intermission_seconds: u64,
    pub early_end_grace_ms: u64,
    pub question_retry_delay_ms: u64,
    pub grace_window_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub first_correct_points: i32,
    pub other_correct_points: i32,
    pub reconnect_policy: ReconnectPolicy,
    pub connection_timeout_seconds: u64,
    pub shutdown_timeout_seconds: u64,
    pub rate_limit_burst: u32,
    pub rate_limit_refill_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any key lookup; missing keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,
            questions_file: lookup("QUESTIONS_FILE").unwrap_or(defaults.questions_file),
            round_duration_seconds: parse_var(
                &lookup,
                "ROUND_DURATION_SECONDS",
                defaults.round_duration_seconds,
            )?,
            intermission_seconds: parse_var(
                &lookup,
                "INTERMISSION_SECONDS",
                defaults.intermission_seconds,
            )?,
            early_end_grace_ms: parse_var(&lookup, "EARLY_END_GRACE_MS", defaults.early_end_grace_ms)?,
            question_retry_delay_ms: parse_var(
                &lookup,
                "QUESTION_RETRY_DELAY_MS",
                defaults.question_retry_delay_ms,
            )?,
            grace_window_seconds: parse_var(
                &lookup,
                "GRACE_WINDOW_SECONDS",
                defaults.grace_window_seconds,
            )?,
            sweep_interval_seconds: parse_var(
                &lookup,
                "SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval_seconds,
            )?,
            first_correct_points: parse_var(
                &lookup,
                "FIRST_CORRECT_POINTS",
                defaults.first_correct_points,
            )?,
            other_correct_points: parse_var(
                &lookup,
                "OTHER_CORRECT_POINTS",
                defaults.other_correct_points,
            )?,
            reconnect_policy: parse_var(&lookup, "RECONNECT_POLICY", defaults.reconnect_policy)?,
            connection_timeout_seconds: parse_var(
                &lookup,
                "CONNECTION_TIMEOUT_SECONDS",
                defaults.connection_timeout_seconds,
            )?,
            shutdown_timeout_seconds: parse_var(
                &lookup,
                "SHUTDOWN_TIMEOUT_SECONDS",
                defaults.shutdown_timeout_seconds,
            )?,
            rate_limit_burst: parse_var(&lookup, "RATE_LIMIT_BURST", defaults.rate_limit_burst)?,
            rate_limit_refill_ms: parse_var(
                &lookup,
                "RATE_LIMIT_REFILL_MS",
                defaults.rate_limit_refill_ms,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("ROUND_DURATION_SECONDS", self.round_duration_seconds),
            ("SWEEP_INTERVAL_SECONDS", self.sweep_interval_seconds),
            ("RATE_LIMIT_REFILL_MS", self.rate_limit_refill_ms),
            ("RATE_LIMIT_BURST", u64::from(self.rate_limit_burst)),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::MustBePositive { name });
            }
        }
        if self.first_correct_points <= self.other_correct_points {
            return Err(ConfigError::FirstMustExceedOthers {
                first: self.first_correct_points,
                other: self.other_correct_points,
            });
        }
        Ok(())
    }

    /// The engine-facing subset.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            round_duration: Duration::from_secs(self.round_duration_seconds),
            intermission: Duration::from_secs(self.intermission_seconds),
            early_end_grace: Duration::from_millis(self.early_end_grace_ms),
            question_retry_delay: Duration::from_millis(self.question_retry_delay_ms),
            grace_window: Duration::from_secs(self.grace_window_seconds),
            scoring: ScorePolicy::new(self.first_correct_points, self.other_correct_points),
            reconnect_policy: self.reconnect_policy,
            ..SessionConfig::default()
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn rate_limit_refill(&self) -> Duration {
        Duration::from_millis(self.rate_limit_refill_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            questions_file: "./data/images.json".to_string(),
            round_duration_seconds: 60,
            intermission_seconds: 5,
            early_end_grace_ms: 1500,
            question_retry_delay_ms: 2000,
            grace_window_seconds: 45,
            sweep_interval_seconds: 10,
            first_correct_points: 100,
            other_correct_points: 50,
            reconnect_policy: ReconnectPolicy::TokenOrName,
            connection_timeout_seconds: 300,
            shutdown_timeout_seconds: 5,
            rate_limit_burst: 30,
            rate_limit_refill_ms: 500,
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.questions_file, "./data/images.json");

        let session = config.session_config();
        assert_eq!(session.round_duration, Duration::from_secs(60));
        assert_eq!(session.early_end_grace, Duration::from_millis(1500));
        assert_eq!(session.scoring.first_correct_points, 100);
        assert_eq!(session.reconnect_policy, ReconnectPolicy::TokenOrName);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("ROUND_DURATION_SECONDS", "30"),
            ("OTHER_CORRECT_POINTS", "25"),
            ("RECONNECT_POLICY", "token-only"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        let session = config.session_config();
        assert_eq!(session.round_duration, Duration::from_secs(30));
        assert_eq!(session.scoring.other_correct_points, 25);
        assert_eq!(session.reconnect_policy, ReconnectPolicy::TokenOnly);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        assert_eq!(
            config_from(&[("PORT", "not-a-port")]).unwrap_err(),
            ConfigError::InvalidValue {
                name: "PORT",
                value: "not-a-port".to_string()
            }
        );
        assert!(config_from(&[("RECONNECT_POLICY", "anyone")]).is_err());
        assert_eq!(
            config_from(&[("ROUND_DURATION_SECONDS", "0")]).unwrap_err(),
            ConfigError::MustBePositive {
                name: "ROUND_DURATION_SECONDS"
            }
        );
        assert_eq!(
            config_from(&[("FIRST_CORRECT_POINTS", "10"), ("OTHER_CORRECT_POINTS", "50")])
                .unwrap_err(),
            ConfigError::FirstMustExceedOthers {
                first: 10,
                other: 50
            }
        );
        assert!(
            config_from(&[("FIRST_CORRECT_POINTS", "50"), ("OTHER_CORRECT_POINTS", "50")])
                .is_err()
        );
    }
}
