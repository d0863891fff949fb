//! Application configuration.
//!
//! Loaded from a TOML file; every section and field has a default, so an
//! empty file (or no file at all) yields a working configuration. The API key
//! can be supplied through the environment instead of the file.

use crate::error::{AppError, AppResult};
use obwatch_core::ClassifierThresholds;
use obwatch_dashboard::DashboardConfig;
use obwatch_feed::FeedConfig;
use obwatch_ws::connection::DEFAULT_STREAMER_URL;
use obwatch_ws::reconnect::DEFAULT_RECONNECT_DELAY_MS;
use obwatch_ws::{ConnectionConfig, SubscriptionTarget};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variables checked for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["OBWATCH_API_KEY", "CRYPTOCOMPARE_API_KEY"];

/// Where the loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    /// The file did not exist; built-in defaults were used.
    Defaults,
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ws: WsSection,
    #[serde(default)]
    pub classifier: ClassifierThresholds,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub visibility: VisibilitySection,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// Streamer connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct WsSection {
    #[serde(default = "default_url")]
    pub url: String,
    /// Overridden by `OBWATCH_API_KEY` / `CRYPTOCOMPARE_API_KEY` when set.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub subscription: SubscriptionTarget,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
    /// Capacity of the manager -> feed event channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
    /// Open a session as soon as the application starts.
    #[serde(default = "default_true")]
    pub connect_on_start: bool,
}

fn default_url() -> String {
    DEFAULT_STREAMER_URL.to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

fn default_outbound_buffer() -> usize {
    100
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for WsSection {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: None,
            subscription: SubscriptionTarget::default(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            outbound_buffer: default_outbound_buffer(),
            event_channel_capacity: default_event_channel_capacity(),
            connect_on_start: default_true(),
        }
    }
}

impl std::fmt::Debug for WsSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSection")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("subscription", &self.subscription)
            .field("reconnect_delay_ms", &self.reconnect_delay_ms)
            .field("outbound_buffer", &self.outbound_buffer)
            .field("event_channel_capacity", &self.event_channel_capacity)
            .field("connect_on_start", &self.connect_on_start)
            .finish()
    }
}

/// Visibility handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilitySection {
    /// Reconnect when the consumer returns to the foreground.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
}

impl Default for VisibilitySection {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
        }
    }
}

/// Logging and stats output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySection {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Interval of the stats summary log line. 0 disables it.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_log_filter() -> String {
    "info,obwatch=debug".to_string()
}

fn default_stats_interval_secs() -> u64 {
    60
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, falling back to defaults if the file does not exist.
    ///
    /// Runs before logging is initialized, so the fallback is reported through
    /// the returned `ConfigSource` rather than logged here.
    pub fn load(path: &str) -> AppResult<(Self, ConfigSource)> {
        let (mut config, source) = if Path::new(path).exists() {
            (Self::from_file(path)?, ConfigSource::File)
        } else {
            (Self::default(), ConfigSource::Defaults)
        };
        config.apply_env();
        config.validate()?;
        Ok((config, source))
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty());
        if let Some(key) = key {
            self.ws.api_key = Some(key.trim().to_string());
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.ws.url.is_empty() {
            return Err(AppError::Config("ws.url must not be empty".to_string()));
        }
        if self.ws.reconnect_delay_ms == 0 {
            return Err(AppError::Config(
                "ws.reconnect_delay_ms must be positive".to_string(),
            ));
        }
        if self.ws.outbound_buffer == 0 || self.ws.event_channel_capacity == 0 {
            return Err(AppError::Config(
                "ws channel capacities must be positive".to_string(),
            ));
        }
        self.connection_config()
            .endpoint()
            .map_err(|e| AppError::Config(format!("ws.url is not a valid URL: {e}")))?;
        self.feed.validate()?;
        Ok(())
    }

    /// Connection manager configuration for the `ws` section.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws.url.clone(),
            api_key: self.ws.api_key.clone(),
            subscription: self.ws.subscription.clone(),
            reconnect_delay_ms: self.ws.reconnect_delay_ms,
            outbound_buffer: self.ws.outbound_buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();

        assert_eq!(config.ws.url, DEFAULT_STREAMER_URL);
        assert_eq!(config.ws.reconnect_delay_ms, 2000);
        assert_eq!(config.ws.subscription.channel(), "8~Binance~BTC~USDT");
        assert!(config.ws.connect_on_start);
        assert!(config.visibility.auto_reconnect);
        assert_eq!(config.feed.event_log_capacity, 500);
        assert_eq!(config.classifier.big_total, dec!(1000000));
        assert_eq!(config.telemetry.log_filter, "info,obwatch=debug");
        assert_ok!(config.validate());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [ws]
            url = "ws://127.0.0.1:9001"
            reconnect_delay_ms = 500

            [ws.subscription]
            exchange = "Coinbase"
            quote = "USD"

            [classifier]
            cheap_max_price = "30000"

            [visibility]
            auto_reconnect = false

            [dashboard]
            port = 9090
            "#,
        )
        .unwrap();

        assert_eq!(config.ws.url, "ws://127.0.0.1:9001");
        assert_eq!(config.ws.subscription.channel(), "8~Coinbase~BTC~USD");
        assert_eq!(config.classifier.cheap_max_price, dec!(30000));
        assert_eq!(config.classifier.solid_min_quantity, dec!(10));
        assert!(!config.visibility.auto_reconnect);
        assert_eq!(config.dashboard.port, 9090);

        let conn = config.connection_config();
        assert_eq!(conn.reconnect_delay_ms, 500);
        assert_eq!(conn.endpoint().unwrap(), "ws://127.0.0.1:9001/");
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            AppConfig::from_toml("[ws\nurl ="),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_api_key_env_precedence() {
        let mut config = AppConfig::default();
        config.ws.api_key = Some("from-file".to_string());

        config.apply_env_with(|name| match name {
            "OBWATCH_API_KEY" => Some("  ".to_string()),
            "CRYPTOCOMPARE_API_KEY" => Some("cc-key".to_string()),
            _ => None,
        });
        assert_eq!(config.ws.api_key.as_deref(), Some("cc-key"));

        config.apply_env_with(|name| (name == "OBWATCH_API_KEY").then(|| "ob-key".to_string()));
        assert_eq!(config.ws.api_key.as_deref(), Some("ob-key"));
    }

    #[test]
    fn test_file_key_kept_without_env() {
        let mut config = AppConfig::default();
        config.ws.api_key = Some("from-file".to_string());
        config.apply_env_with(|_| None);
        assert_eq!(config.ws.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_validate_rejects_zero_delay() {
        let mut config = AppConfig::default();
        config.ws.reconnect_delay_ms = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = AppConfig::default();
        config.feed.alert_window_ms = 0;
        assert_err!(config.validate());
    }

    #[test]
    fn test_validate_rejects_unparseable_url() {
        let mut config = AppConfig::default();
        config.ws.url = "streamer.cryptocompare.com/v2".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.ws.api_key = Some("secret-key".to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let (config, source) = AppConfig::load("/nonexistent/obwatch.toml").unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config.dashboard.port, 8080);
    }

    #[test]
    fn test_load_existing_file() {
        let path = std::env::temp_dir().join(format!("obwatch-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[dashboard]\nport = 9191\n").unwrap();

        let (config, source) = AppConfig::load(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.dashboard.port, 9191);
    }
}
