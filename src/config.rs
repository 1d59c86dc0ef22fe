use crate::api::binance::BINANCE_API_BASE;
use crate::api::binance_stream::BINANCE_WS_BASE;
use crate::strategy::SignalConfig;
use crate::{Error, Result};
use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory (any format `config` supports)
pub const DEFAULT_CONFIG_NAME: &str = "tickalert";
pub const ENV_PREFIX: &str = "TICKALERT";

/// Full runtime configuration
///
/// Layered as defaults, then the optional config file, then `TICKALERT_<SECTION>__<KEY>`
/// style environment variables (e.g. `TICKALERT_SIGNAL__ALERT_THRESHOLD=65`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub signal: SignalConfig,
    pub discovery: DiscoverySettings,
    pub stream: StreamSettings,
    pub alerts: AlertSettings,
    pub runtime: RuntimeSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    pub rest_base_url: String,
    pub quote_asset: String,
    pub max_symbols: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            rest_base_url: BINANCE_API_BASE.to_string(),
            quote_asset: "USDT".to_string(),
            max_symbols: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub ws_base_url: String,
    pub connect_timeout_secs: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            ws_base_url: BINANCE_WS_BASE.to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl StreamSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Discord webhook. Alerts are only logged when unset.
    pub webhook_url: Option<String>,
    /// Recent alerts kept in memory, 0 for unbounded
    pub log_capacity: usize,
    pub queue_capacity: usize,
    pub send_timeout_secs: u64,
    pub max_per_minute: u32,
    /// Look up support/resistance for each notification
    pub include_levels: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            log_capacity: 100,
            queue_capacity: 256,
            send_timeout_secs: 10,
            max_per_minute: 30,
            include_levels: true,
        }
    }
}

impl AlertSettings {
    pub fn log_capacity(&self) -> Option<usize> {
        (self.log_capacity > 0).then_some(self.log_capacity)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub learning_table_path: PathBuf,
    pub shutdown_grace_secs: u64,
    /// Seconds between recent-alert summaries, 0 disables them
    pub report_interval_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            learning_table_path: PathBuf::from("qtable.bin"),
            shutdown_grace_secs: 5,
            report_interval_secs: 60,
        }
    }
}

impl RuntimeSettings {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Settings {
    /// Load settings from `path` (required) or the default file (optional), then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let mut settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if settings.alerts.webhook_url.is_none() {
            settings.alerts.webhook_url = std::env::var("DISCORD_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty());
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        let signal = &self.signal;

        if signal.rsi_period == 0 || signal.zscore_window == 0 {
            return Err(invalid("indicator periods must be positive"));
        }
        if signal.window_size < signal.rsi_period {
            return Err(invalid(format!(
                "window_size ({}) must hold at least rsi_period ({}) prices",
                signal.window_size, signal.rsi_period
            )));
        }
        if signal.window_size < signal.zscore_window {
            tracing::warn!(
                "window_size ({}) is smaller than zscore_window ({}), z-score will never be defined",
                signal.window_size,
                signal.zscore_window
            );
        }
        if self.discovery.max_symbols == 0 {
            return Err(invalid("discovery.max_symbols must be positive"));
        }
        if self.alerts.queue_capacity == 0 {
            return Err(invalid("alerts.queue_capacity must be positive"));
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Config(ConfigError::Message(message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.signal.window_size, 60);
        assert_eq!(settings.signal.tick_interval_secs, 5);
        assert_eq!(settings.signal.rsi_period, 14);
        assert_eq!(settings.signal.zscore_window, 30);
        assert_eq!(settings.signal.alert_threshold, 70.0);
        assert_eq!(settings.discovery.max_symbols, 30);
        assert_eq!(settings.discovery.quote_asset, "USDT");
        assert_eq!(settings.alerts.log_capacity(), Some(100));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[signal]
alert_threshold = 65.0
window_size = 40

[discovery]
max_symbols = 5
quote_asset = "BTC"

[alerts]
log_capacity = 0
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();

        assert_eq!(settings.signal.alert_threshold, 65.0);
        assert_eq!(settings.signal.window_size, 40);
        assert_eq!(settings.signal.rsi_period, 14);
        assert_eq!(settings.discovery.max_symbols, 5);
        assert_eq!(settings.discovery.quote_asset, "BTC");
        assert_eq!(settings.alerts.log_capacity(), None);
        assert_eq!(settings.runtime.shutdown_grace_secs, 5);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = Settings::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[stream]\nconnect_timeout_secs = 3").unwrap();

        // Keys no other test asserts on, the environment is process-wide
        std::env::set_var("TICKALERT_STREAM__CONNECT_TIMEOUT_SECS", "42");
        std::env::set_var("TICKALERT_RUNTIME__REPORT_INTERVAL_SECS", "15");
        let settings = Settings::load(Some(file.path()));
        std::env::remove_var("TICKALERT_STREAM__CONNECT_TIMEOUT_SECS");
        std::env::remove_var("TICKALERT_RUNTIME__REPORT_INTERVAL_SECS");

        let settings = settings.unwrap();
        assert_eq!(settings.stream.connect_timeout_secs, 42);
        assert_eq!(settings.runtime.report_interval_secs, 15);
    }

    #[test]
    fn test_validate_rejects_small_window() {
        let mut settings = Settings::default();
        settings.signal.window_size = 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_queue() {
        let mut settings = Settings::default();
        settings.alerts.queue_capacity = 0;
        assert!(settings.validate().is_err());
    }
}
