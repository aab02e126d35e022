//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    feed_url = %config.feed.url,
    window_capacity = config.feed.window_capacity,
    api = %config.api.base_url,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
///
/// # Errors
/// Fails on TOML errors or validation failures.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  // Feed validation
  anyhow::ensure!(!config.feed.url.is_empty(), "Feed URL must not be empty");
  anyhow::ensure!(
    config.feed.url.starts_with("ws://") || config.feed.url.starts_with("wss://"),
    "Feed URL must use ws:// or wss://, got {}",
    config.feed.url
  );
  anyhow::ensure!(
    config.feed.window_capacity > 0,
    "feed.window_capacity must be positive"
  );
  anyhow::ensure!(
    config.feed.outbound_capacity > 0,
    "feed.outbound_capacity must be positive"
  );

  // API validation
  anyhow::ensure!(
    !config.api.base_url.is_empty(),
    "API base URL must not be empty"
  );
  anyhow::ensure!(config.api.timeout_ms > 0, "api.timeout_ms must be positive");

  // Metrics validation
  if config.metrics.enabled {
    anyhow::ensure!(
      !config.metrics.bind_address.is_empty(),
      "metrics.bind_address must not be empty when metrics are enabled"
    );
  }

  Ok(())
}
