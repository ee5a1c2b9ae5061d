//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
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
    tools = config.policy.tools.len(),
    dust_threshold = %config.redeeming.dust_threshold,
    batch_size = config.redeeming.event_filtering_batch_size,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<()> {
  let redeeming = &config.redeeming;

  anyhow::ensure!(
    redeeming.dust_threshold >= Decimal::ZERO,
    "dust_threshold must not be negative, got {}",
    redeeming.dust_threshold
  );
  anyhow::ensure!(
    redeeming.redeeming_batch_size >= 1,
    "redeeming_batch_size must be at least 1"
  );
  anyhow::ensure!(
    redeeming.minimum_batch_size >= 1,
    "minimum_batch_size must be at least 1"
  );
  anyhow::ensure!(
    redeeming.minimum_batch_size <= redeeming.event_filtering_batch_size,
    "minimum_batch_size ({}) exceeds event_filtering_batch_size ({})",
    redeeming.minimum_batch_size,
    redeeming.event_filtering_batch_size
  );
  anyhow::ensure!(
    redeeming.reduce_factor > 0.0 && redeeming.reduce_factor < 1.0,
    "reduce_factor must be in (0, 1), got {}",
    redeeming.reduce_factor
  );
  anyhow::ensure!(
    redeeming.max_filtering_retries >= 1,
    "max_filtering_retries must be at least 1"
  );

  anyhow::ensure!(
    (0.0..=1.0).contains(&config.policy.epsilon),
    "policy epsilon must be in [0, 1], got {}",
    config.policy.epsilon
  );
  anyhow::ensure!(
    config.policy.quarantine_duration >= 0,
    "quarantine_duration must not be negative"
  );
  anyhow::ensure!(
    !config.policy.tools.is_empty(),
    "At least one prediction tool must be configured"
  );

  Ok(())
}
