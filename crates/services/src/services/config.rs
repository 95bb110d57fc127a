//! Runtime configuration for the sync services.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_NOTIFY_CHANNEL: &str = "board_changes";
const DEFAULT_DEBOUNCE_MS: u64 = 250;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BOARD_DATABASE_URL (or DATABASE_URL) is not set")]
    MissingDatabaseUrl,
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Postgres connection string for the remote store.
    pub database_url: String,
    /// NOTIFY channel the table triggers fire on any write to the public
    /// tables.
    #[serde(default = "default_notify_channel")]
    pub notify_channel: String,
    /// Quiet window for collapsing notification bursts into one refresh.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_notify_channel() -> String {
    DEFAULT_NOTIFY_CHANNEL.to_string()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

impl SyncConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            notify_channel: default_notify_channel(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Read the configuration from the environment. `BOARD_DATABASE_URL`
    /// wins over `DATABASE_URL`; the rest falls back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("BOARD_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let mut config = Self::new(database_url);
        if let Ok(channel) = std::env::var("BOARD_NOTIFY_CHANNEL") {
            config.notify_channel = channel;
        }
        if let Ok(raw) = std::env::var("BOARD_DEBOUNCE_MS") {
            config.debounce_ms = raw
                .parse()
                .map_err(|_| ConfigError::Invalid("BOARD_DEBOUNCE_MS", raw))?;
        }
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"database_url": "postgres://localhost/board"}"#).unwrap();
        assert_eq!(config.notify_channel, DEFAULT_NOTIFY_CHANNEL);
        assert_eq!(config.debounce(), Duration::from_millis(DEFAULT_DEBOUNCE_MS));
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn explicit_values_are_kept() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"database_url": "postgres://localhost/board", "notify_channel": "pedidos", "debounce_ms": 50}"#,
        )
        .unwrap();
        assert_eq!(config.notify_channel, "pedidos");
        assert_eq!(config.debounce(), Duration::from_millis(50));
    }
}
