//! Repository Port - Persisted Redemption State
//!
//! The ledger checkpoint, the policy and the tool attribution map must
//! survive round timeouts and restarts. Each is stored as a JSON
//! document whose concrete type the caller names up front.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::ledger::RedemptionLedger;
use crate::domain::policy::EGreedyPolicy;

#[async_trait]
pub trait StateRepository: Send + Sync + 'static {
  async fn save_ledger(&self, ledger: &RedemptionLedger) -> anyhow::Result<()>;

  /// `None` on first startup.
  async fn load_ledger(&self) -> anyhow::Result<Option<RedemptionLedger>>;

  async fn save_policy(&self, policy: &EGreedyPolicy) -> anyhow::Result<()>;

  async fn load_policy(&self) -> anyhow::Result<Option<EGreedyPolicy>>;

  /// Rewrites `utilized_tools.json` in full.
  async fn save_utilized_tools(&self, tools: &BTreeMap<String, String>) -> anyhow::Result<()>;

  async fn load_utilized_tools(&self) -> anyhow::Result<BTreeMap<String, String>>;

  /// Check if the storage directory is writable.
  async fn is_healthy(&self) -> bool;
}
