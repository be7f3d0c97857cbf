//! Server configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

/// Prefix for environment variables forwarded into action contexts.
const ACTION_ENV_PREFIX: &str = "QRGEN_ENV_";

/// Configuration for the action server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Environment variables for all actions.
    pub env: HashMap<String, String>,
    /// Serve `/_health`.
    pub enable_health: bool,
    /// Serve `/_actions`.
    pub enable_listing: bool,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Unwrap envelopes into native HTTP responses instead of returning them
    /// as JSON.
    pub web_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            env: HashMap::new(),
            enable_health: true,
            enable_listing: true,
            max_body_size: 1024 * 1024, // 1MB
            web_mode: false,
        }
    }
}

impl ServerConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from `QRGEN_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build a config from key/value pairs, ignoring unrelated keys.
    /// Unparseable values keep their defaults.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();

        for (key, value) in vars {
            let key = key.as_ref();
            let value = value.into();
            match key {
                "QRGEN_HOST" => config.host = value,
                "QRGEN_PORT" => parse_into(key, &value, &mut config.port),
                "QRGEN_MAX_BODY_SIZE" => parse_into(key, &value, &mut config.max_body_size),
                "QRGEN_WEB_MODE" => parse_into(key, &value, &mut config.web_mode),
                "QRGEN_ENABLE_HEALTH" => parse_into(key, &value, &mut config.enable_health),
                "QRGEN_ENABLE_LISTING" => parse_into(key, &value, &mut config.enable_listing),
                _ => {
                    if let Some(name) = key.strip_prefix(ACTION_ENV_PREFIX) {
                        config.env.insert(name.to_string(), value);
                    }
                }
            }
        }

        config
    }

    /// Set the maximum request body size.
    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// Enable or disable web mode.
    pub fn web_mode(mut self, web_mode: bool) -> Self {
        self.web_mode = web_mode;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_into<T: FromStr>(key: &str, value: &str, slot: &mut T) {
    match value.trim().parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!("Ignoring invalid value for {}: {:?}", key, value),
    }
}
