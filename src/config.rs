//! Runtime settings. Defaults are hardcoded; a few can be overridden from the
//! environment so the client can point at a non-local service.

use std::env;
use std::time::Duration;

use thiserror::Error;

// -------- defaults --------

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_DOTS_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const ENV_API_URL: &str = "DOCSEARCH_API_URL";
pub const ENV_POLL_MS: &str = "DOCSEARCH_POLL_MS";
pub const ENV_TIMEOUT_SECS: &str = "DOCSEARCH_TIMEOUT_SECS";

// --------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be an http(s) URL, got '{value}'")]
    InvalidUrl { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    /// Cadence of status requests while a video is processing.
    pub poll_interval: Duration,
    /// Cadence of the "Starting upload..." ellipsis.
    pub dots_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            dots_interval: DEFAULT_DOTS_INTERVAL,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            let url = url.trim().to_string();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl {
                    var: ENV_API_URL,
                    value: url,
                });
            }
            cfg.api_url = url;
        }
        if let Some(ms) = lookup(ENV_POLL_MS) {
            cfg.poll_interval = Duration::from_millis(positive(ENV_POLL_MS, &ms)?);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            cfg.request_timeout = Duration::from_secs(positive(ENV_TIMEOUT_SECS, &secs)?);
        }

        Ok(cfg)
    }
}

fn positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.dots_interval, Duration::from_millis(500));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = Config::from_lookup(lookup(&[
            (ENV_API_URL, "https://search.internal:8443"),
            (ENV_POLL_MS, "250"),
            (ENV_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();

        assert_eq!(cfg.api_url, "https://search.internal:8443");
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = Config::from_lookup(lookup(&[(ENV_POLL_MS, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { var: ENV_POLL_MS, .. }));
    }

    #[test]
    fn rejects_non_http_url() {
        let err = Config::from_lookup(lookup(&[(ENV_API_URL, "localhost:5000")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }
}
