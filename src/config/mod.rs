//! Configuration Module - TOML-based Monitor Configuration
//!
//! Loads and validates configuration from `config.toml`. Feed endpoint,
//! window capacity and the consumer-side re-open policy are externalized
//! here; nothing is hardcoded in the usecases layer.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::adapters::api::RestClientConfig;
use crate::domain::DEFAULT_WINDOW_CAPACITY;
use crate::usecases::{DEFAULT_OUTBOUND_CAPACITY, FeedSettings};

/// Top-level monitor configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the feed is opened.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Identity and logging.
  pub app: AppSection,
  /// Streaming feed subscription.
  pub feed: FeedConfig,
  /// Dashboard REST API.
  pub api: ApiConfig,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
  /// Human-readable instance name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Feed subscription configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// WebSocket endpoint, e.g. `ws://localhost:8000/ws/market-data`.
  pub url: String,
  /// Records kept in the trailing window.
  #[serde(default = "default_window_capacity")]
  pub window_capacity: usize,
  /// Outbound frames buffered before further sends are dropped.
  #[serde(default = "default_outbound_capacity")]
  pub outbound_capacity: usize,
  /// Seconds before the monitor re-opens an errored/closed feed (0 = never).
  #[serde(default)]
  pub reopen_delay_secs: u64,
}

impl FeedConfig {
  /// Settings for `FeedConnection`.
  pub const fn settings(&self) -> FeedSettings {
    FeedSettings {
      window_capacity: self.window_capacity,
      outbound_capacity: self.outbound_capacity,
    }
  }

  /// Re-open delay, `None` when re-open is disabled.
  pub const fn reopen_delay(&self) -> Option<Duration> {
    if self.reopen_delay_secs == 0 {
      None
    } else {
      Some(Duration::from_secs(self.reopen_delay_secs))
    }
  }
}

/// API endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// REST base URL including the `/api` prefix.
  pub base_url: String,
  /// Request timeout in milliseconds.
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
}

impl ApiConfig {
  /// Settings for `RestClient`.
  pub fn client_config(&self) -> RestClientConfig {
    RestClientConfig {
      base_url: self.base_url.clone(),
      timeout: Duration::from_millis(self.timeout_ms),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Serve /live, /ready and /metrics.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: default_true(),
      bind_address: default_metrics_addr(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

const fn default_window_capacity() -> usize {
  DEFAULT_WINDOW_CAPACITY
}

const fn default_outbound_capacity() -> usize {
  DEFAULT_OUTBOUND_CAPACITY
}

const fn default_timeout_ms() -> u64 {
  30_000
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}
