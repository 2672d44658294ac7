//! Client configuration loaded from environment variables.
//!
//! Every setting has a default suitable for a backend running locally, so
//! the client starts with zero configuration during development.

use std::path::PathBuf;
use std::time::Duration;

use chatty_shared::constants::{DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SOCKET_URL};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the REST API.
    /// Env: `CHATTY_API_URL`
    /// Default: `http://localhost:5001/api`
    pub api_url: String,

    /// Base URL of the push transport server.
    /// Env: `CHATTY_SOCKET_URL`
    /// Default: `http://localhost:5001`
    pub socket_url: String,

    /// Directory holding the settings database.
    /// Env: `CHATTY_DATA_DIR`
    /// Default: `None` (platform data directory).
    pub data_dir: Option<PathBuf>,

    /// Per-request timeout for REST calls and the push handshake.
    /// Env: `CHATTY_REQUEST_TIMEOUT_SECS`
    /// Default: 15 seconds.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            data_dir: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = non_empty(lookup("CHATTY_API_URL")) {
            config.api_url = url;
        }

        if let Some(url) = non_empty(lookup("CHATTY_SOCKET_URL")) {
            config.socket_url = url;
        }

        if let Some(dir) = non_empty(lookup("CHATTY_DATA_DIR")) {
            config.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(raw) = lookup("CHATTY_REQUEST_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(
                    value = %raw,
                    "Invalid CHATTY_REQUEST_TIMEOUT_SECS, using default"
                ),
            }
        }

        config
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_url, "http://localhost:5001/api");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CHATTY_API_URL", "https://chat.example.com/api"),
            ("CHATTY_SOCKET_URL", "https://chat.example.com"),
            ("CHATTY_DATA_DIR", "/tmp/chatty"),
            ("CHATTY_REQUEST_TIMEOUT_SECS", "30"),
        ]));
        assert_eq!(config.api_url, "https://chat.example.com/api");
        assert_eq!(config.socket_url, "https://chat.example.com");
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/chatty")));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CHATTY_API_URL", "   "),
            ("CHATTY_REQUEST_TIMEOUT_SECS", "soon"),
        ]));
        assert_eq!(config, ClientConfig::default());

        let config = ClientConfig::from_lookup(lookup_from(&[("CHATTY_REQUEST_TIMEOUT_SECS", "0")]));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
    }
}
