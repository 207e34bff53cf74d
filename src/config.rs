//! Runtime configuration read from `PONDWATCH_*` environment variables

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::alerts::engine::{DEFAULT_CONCURRENCY, DEFAULT_COOLDOWN_MINUTES};

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub alert_interval: Duration,
    pub liveness_interval: Duration,
    pub default_cooldown_minutes: u32,
    pub failure_backoff: Duration,
    pub eval_concurrency: usize,
    /// JSON fixture loaded into the in-memory repository at startup
    pub seed_file: Option<PathBuf>,
    /// Push gateway URL; notifications are only logged when unset
    pub push_url: Option<String>,
    pub push_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            alert_interval: Duration::from_secs(60),
            liveness_interval: Duration::from_secs(60),
            default_cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            failure_backoff: Duration::from_secs(10),
            eval_concurrency: DEFAULT_CONCURRENCY,
            seed_file: None,
            push_url: None,
            push_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Config {
            host: get("PONDWATCH_HOST").unwrap_or(defaults.host),
            port: parse(&get, "PONDWATCH_PORT")?.unwrap_or(defaults.port),
            alert_interval: parse(&get, "PONDWATCH_ALERT_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.alert_interval),
            liveness_interval: parse(&get, "PONDWATCH_LIVENESS_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.liveness_interval),
            default_cooldown_minutes: parse(&get, "PONDWATCH_DEFAULT_COOLDOWN_MINUTES")?
                .unwrap_or(defaults.default_cooldown_minutes),
            failure_backoff: parse(&get, "PONDWATCH_FAILURE_BACKOFF_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.failure_backoff),
            eval_concurrency: parse(&get, "PONDWATCH_EVAL_CONCURRENCY")?
                .unwrap_or(defaults.eval_concurrency),
            seed_file: get("PONDWATCH_SEED_FILE").map(PathBuf::from),
            push_url: get("PONDWATCH_PUSH_URL"),
            push_timeout: parse(&get, "PONDWATCH_PUSH_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.push_timeout),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("PONDWATCH_ALERT_INTERVAL_SECS", self.alert_interval.is_zero()),
            ("PONDWATCH_LIVENESS_INTERVAL_SECS", self.liveness_interval.is_zero()),
            ("PONDWATCH_FAILURE_BACKOFF_SECS", self.failure_backoff.is_zero()),
            ("PONDWATCH_EVAL_CONCURRENCY", self.eval_concurrency == 0),
        ];
        for (key, is_zero) in positive {
            if is_zero {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: "0".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse<T, F>(get: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.alert_interval, Duration::from_secs(60));
        assert_eq!(config.default_cooldown_minutes, 30);
        assert_eq!(config.failure_backoff, Duration::from_secs(10));
        assert!(config.push_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PONDWATCH_PORT", "9000"),
            ("PONDWATCH_LIVENESS_INTERVAL_SECS", " 30 "),
            ("PONDWATCH_DEFAULT_COOLDOWN_MINUTES", "15"),
            ("PONDWATCH_PUSH_URL", "http://gateway/push"),
            ("PONDWATCH_SEED_FILE", ""),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.liveness_interval, Duration::from_secs(30));
        assert_eq!(config.default_cooldown_minutes, 15);
        assert_eq!(config.push_url.as_deref(), Some("http://gateway/push"));
        assert!(config.seed_file.is_none());
    }

    #[test]
    fn test_malformed_value() {
        let err = config(&[("PONDWATCH_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PONDWATCH_PORT"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(config(&[("PONDWATCH_ALERT_INTERVAL_SECS", "0")]).is_err());
        assert!(config(&[("PONDWATCH_EVAL_CONCURRENCY", "0")]).is_err());
    }
}
