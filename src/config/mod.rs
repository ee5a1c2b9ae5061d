//! Configuration Module - TOML-based Redeemer Configuration
//!
//! Loads and validates configuration from `config.toml`.
//! All contract addresses and redeeming parameters are externalized
//! here - nothing is hardcoded in the domain layer.

pub mod loader;

use std::time::Duration;

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Agent identity and metadata.
  pub bot: BotConfig,
  /// Contracts the redemption transactions are sent to.
  pub contracts: ContractsConfig,
  /// Redemption engine parameters.
  pub redeeming: RedeemingConfig,
  /// Tool selection policy parameters.
  pub policy: PolicyConfig,
  /// Persistence configuration.
  #[serde(default)]
  pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Human-readable agent name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// The safe that holds positions; redeemer and claim simulation sender.
  pub safe_address: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
  pub conditional_tokens: Address,
  pub realitio: Address,
  pub realitio_proxy: Address,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedeemingConfig {
  /// Claimable amounts strictly below this are not worth a transaction.
  pub dust_threshold: Decimal,
  /// Maximum positions bundled into one multisend.
  #[serde(default = "default_redeeming_batch_size")]
  pub redeeming_batch_size: usize,
  /// Initial block window for event filtering.
  #[serde(default = "default_event_filtering_batch_size")]
  pub event_filtering_batch_size: u64,
  /// Floor for the block window after failures.
  #[serde(default = "default_minimum_batch_size")]
  pub minimum_batch_size: u64,
  /// Fraction the block window shrinks by after a failed window.
  #[serde(default = "default_reduce_factor")]
  pub reduce_factor: f64,
  /// Failed windows tolerated before the round is abandoned.
  #[serde(default = "default_max_filtering_retries")]
  pub max_filtering_retries: u32,
  /// Timeout for a single gateway call (seconds).
  #[serde(default = "default_contract_timeout")]
  pub contract_timeout_secs: u64,
  /// Pause before re-invoking a step that asked to retry (milliseconds).
  #[serde(default = "default_step_retry_sleep")]
  pub step_retry_sleep_ms: u64,
  /// Retries of one candidate step before the candidate is skipped.
  #[serde(default = "default_max_step_retries")]
  pub max_step_retries: u32,
}

impl RedeemingConfig {
  pub fn contract_timeout(&self) -> Duration {
    Duration::from_secs(self.contract_timeout_secs)
  }

  pub fn step_retry_sleep(&self) -> Duration {
    Duration::from_millis(self.step_retry_sleep_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
  /// Exploration probability.
  pub epsilon: f64,
  /// Failures in a row tolerated before quarantine.
  #[serde(default = "default_failures_threshold")]
  pub consecutive_failures_threshold: u32,
  /// Quarantine length (seconds).
  #[serde(default = "default_quarantine_duration")]
  pub quarantine_duration: i64,
  /// Tools available for prediction requests.
  pub tools: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
  /// Directory for the ledger, policy and utilized tools files.
  #[serde(default = "default_data_dir")]
  pub data_dir: String,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_redeeming_batch_size() -> usize {
  5
}

fn default_event_filtering_batch_size() -> u64 {
  5_000
}

fn default_minimum_batch_size() -> u64 {
  500
}

fn default_reduce_factor() -> f64 {
  0.25
}

fn default_max_filtering_retries() -> u32 {
  6
}

fn default_contract_timeout() -> u64 {
  300
}

fn default_step_retry_sleep() -> u64 {
  1_000
}

fn default_max_step_retries() -> u32 {
  3
}

fn default_failures_threshold() -> u32 {
  2
}

fn default_quarantine_duration() -> i64 {
  10_800
}

fn default_data_dir() -> String {
  "data".to_string()
}
