//! Application configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_core::{CoreError, MarketKey};
use strata_executor::QueueConfig;

use crate::error::{AppError, AppResult};

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "STRATA_CONFIG";

/// Simulated venue and demo traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Delay before the simulated exchange answers a request (ms).
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Reject every Nth request. 0 disables rejects.
    #[serde(default)]
    pub reject_every: u64,
    /// Drop the connection on every Mth send. 0 disables disconnects.
    #[serde(default)]
    pub disconnect_every: u64,
    /// Time the simulated connection stays down after a drop (ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Offset of the simulated exchange clock from local time (ms).
    #[serde(default)]
    pub clock_skew_ms: i64,
    /// Interval between demo actions (ms).
    #[serde(default = "default_producer_interval_ms")]
    pub producer_interval_ms: u64,
    /// Markets the demo producer trades, as `venue:asset`.
    #[serde(default = "default_markets")]
    pub markets: Vec<String>,
    /// Trigger the hard stop after this many ticks.
    #[serde(default)]
    pub hard_stop_after_ticks: Option<u64>,
}

fn default_latency_ms() -> u64 {
    25
}

fn default_reconnect_delay_ms() -> u64 {
    500
}

fn default_producer_interval_ms() -> u64 {
    50
}

fn default_markets() -> Vec<String> {
    vec!["0:0".to_string(), "0:1".to_string(), "0:2".to_string()]
}

impl PaperConfig {
    /// Parse `markets` into keys.
    pub fn market_keys(&self) -> Result<Vec<MarketKey>, CoreError> {
        self.markets.iter().map(|m| m.parse()).collect()
    }
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            reject_every: 0,
            disconnect_every: 0,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            clock_skew_ms: 0,
            producer_interval_ms: default_producer_interval_ms(),
            markets: default_markets(),
            hard_stop_after_ticks: None,
        }
    }
}

/// Logging and periodic stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Interval between executor stats log lines (ms).
    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,
}

fn default_log_filter() -> String {
    "info,strata_executor=debug".to_string()
}

fn default_stats_interval_ms() -> u64 {
    5_000
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            stats_interval_ms: default_stats_interval_ms(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub executor: QueueConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Config path: CLI flag > `STRATA_CONFIG` > `config/default.toml`.
    pub fn resolve_path(cli: Option<String>) -> String {
        Self::resolve_path_from(cli, std::env::var(CONFIG_ENV_VAR).ok())
    }

    fn resolve_path_from(cli: Option<String>, env: Option<String>) -> String {
        cli.or(env)
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load configuration, falling back to defaults when the file is absent.
    ///
    /// The flag tells whether the file existed, so the caller can warn once
    /// logging is up.
    pub fn load(path: &str) -> AppResult<(Self, bool)> {
        if Path::new(path).exists() {
            Ok((Self::from_file(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.executor
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if self.paper.producer_interval_ms == 0 {
            return Err(AppError::Config("paper.producer_interval_ms must be > 0".to_string()));
        }
        if self.paper.markets.is_empty() {
            return Err(AppError::Config("paper.markets must not be empty".to_string()));
        }
        self.paper.market_keys()?;
        if self.telemetry.stats_interval_ms == 0 {
            return Err(AppError::Config(
                "telemetry.stats_interval_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.executor.inflight_limit, 100);
        assert_eq!(config.paper.reject_every, 0);
        assert!(config.paper.hard_stop_after_ticks.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [executor]
            inflight_limit = 10
            inflight_high_watermark = 8

            [paper]
            reject_every = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.executor.inflight_limit, 10);
        assert_eq!(config.executor.cancel_queue_capacity, 200);
        assert_eq!(config.paper.reject_every, 7);
        assert_eq!(config.paper.latency_ms, 25);
        assert_eq!(config.telemetry, TelemetryConfig::default());
    }

    #[test]
    fn test_invalid_executor_section_rejected() {
        let err = AppConfig::from_toml(
            r#"
            [executor]
            inflight_limit = 10
            inflight_high_watermark = 20
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_markets_parsed_from_toml() {
        let config = AppConfig::from_toml(
            r#"
            [paper]
            markets = ["1:27", " 2 : 4 "]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.paper.market_keys().unwrap(),
            vec![MarketKey::from_indices(1, 27), MarketKey::from_indices(2, 4)]
        );
    }

    #[test]
    fn test_malformed_market_rejected() {
        let err = AppConfig::from_toml(
            r#"
            [paper]
            markets = ["0:1", "btc"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Market(CoreError::InvalidMarketKey(ref key)) if key == "btc"));

        let err = AppConfig::from_toml("[paper]\nmarkets = []\n").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let (config, found) = AppConfig::load("does/not/exist.toml").unwrap();
        assert!(!found);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_path_precedence() {
        assert_eq!(
            AppConfig::resolve_path_from(Some("cli.toml".into()), Some("env.toml".into())),
            "cli.toml"
        );
        assert_eq!(
            AppConfig::resolve_path_from(None, Some("env.toml".into())),
            "env.toml"
        );
        assert_eq!(AppConfig::resolve_path_from(None, None), DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[executor]"));
        assert_eq!(AppConfig::from_toml(&toml_str).unwrap(), config);
    }
}
