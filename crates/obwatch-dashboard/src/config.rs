//! Dashboard configuration.

use serde::{Deserialize, Serialize};

/// Dashboard server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Enable dashboard server.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Broadcast interval in milliseconds.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Events included in each broadcast update (newest first).
    #[serde(default = "default_update_event_limit")]
    pub update_event_limit: usize,
    /// Maximum concurrent WebSocket connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Basic auth username (empty = disabled).
    #[serde(default)]
    pub username: String,
    /// Basic auth password (empty = disabled).
    #[serde(default)]
    pub password: String,
}

fn default_enabled() -> bool {
    true
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_update_interval_ms() -> u64 {
    250
}

fn default_update_event_limit() -> usize {
    50
}

fn default_max_connections() -> usize {
    10
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            bind: default_bind(),
            port: default_port(),
            update_interval_ms: default_update_interval_ms(),
            update_event_limit: default_update_event_limit(),
            max_connections: default_max_connections(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl DashboardConfig {
    /// Check if basic auth is enabled.
    pub fn auth_enabled(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_requires_both_fields() {
        let mut config = DashboardConfig::default();
        assert!(!config.auth_enabled());
        config.username = "ops".to_string();
        assert!(!config.auth_enabled());
        config.password = "pw".to_string();
        assert!(config.auth_enabled());
    }
}
