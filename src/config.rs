//! Server configuration from environment variables.
//!
//! Every knob has a default, so an empty environment yields a working
//! in-memory server on port 3000. Only a malformed `PORT` is fatal; other
//! numeric values fall back to their defaults when they do not parse.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;
const DEFAULT_CLIENT_QUEUE: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid PORT: {0:?}")]
    InvalidPort(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Listen port (`PORT`).
    pub port: u16,
    /// Directory for snapshot files (`DATA_DIR`). `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Delay between disk flushes (`STORE_FLUSH_INTERVAL_MS`).
    pub flush_interval: Duration,
    /// Directory served at `/` (`STATIC_DIR`), normally the repository's `web/`
    /// with the wasm package built into `web/pkg`.
    pub static_dir: Option<PathBuf>,
    /// Outbound frame queue per websocket connection (`WS_CLIENT_QUEUE`).
    pub client_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: None,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            static_dir: None,
            client_queue: DEFAULT_CLIENT_QUEUE,
        }
    }
}

impl Config {
    /// Read the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPort`] if `PORT` is set but not a port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPort`] if `PORT` is present but not a port number.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match non_empty(lookup("PORT")) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        let flush_ms = parse_or(lookup("STORE_FLUSH_INTERVAL_MS"), DEFAULT_FLUSH_INTERVAL_MS).max(1);
        let client_queue = parse_or(lookup("WS_CLIENT_QUEUE"), DEFAULT_CLIENT_QUEUE).max(1);

        Ok(Self {
            port,
            data_dir: non_empty(lookup("DATA_DIR")).map(PathBuf::from),
            flush_interval: Duration::from_millis(flush_ms),
            static_dir: non_empty(lookup("STATIC_DIR")).map(PathBuf::from),
            client_queue,
        })
    }
}

/// Parse `raw`, falling back to `default` when absent or unparsable.
pub(crate) fn parse_or<T>(raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr,
{
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.trim().is_empty())
}
