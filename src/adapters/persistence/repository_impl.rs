//! Repository Implementation - Concrete Adapter for the StateRepository Port
//!
//! Wraps `StateStore` (ledger and policy documents) and `ToolsStore`
//! (bet attribution) behind the `StateRepository` trait, so the use
//! cases never touch files or JSON directly.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;

use super::state::StateStore;
use super::tools::ToolsStore;
use crate::domain::ledger::RedemptionLedger;
use crate::domain::policy::EGreedyPolicy;
use crate::ports::repository::StateRepository;

/// File-backed repository rooted at one data directory.
pub struct RepositoryImpl {
    state_store: StateStore,
}

impl RepositoryImpl {
    pub fn new(state_store: StateStore) -> Self {
        Self { state_store }
    }

    /// Create a new repository with a data directory path.
    pub async fn from_data_dir(data_dir: &str) -> Result<Self> {
        Ok(Self::new(StateStore::new(data_dir).await?))
    }

    fn tools(&self) -> ToolsStore<'_> {
        ToolsStore::new(&self.state_store)
    }
}

#[async_trait]
impl StateRepository for RepositoryImpl {
    async fn save_ledger(&self, ledger: &RedemptionLedger) -> Result<()> {
        self.state_store.save_ledger(ledger).await
    }

    async fn load_ledger(&self) -> Result<Option<RedemptionLedger>> {
        self.state_store.load_ledger().await
    }

    async fn save_policy(&self, policy: &EGreedyPolicy) -> Result<()> {
        self.state_store.save_policy(policy).await
    }

    async fn load_policy(&self) -> Result<Option<EGreedyPolicy>> {
        self.state_store.load_policy().await
    }

    async fn save_utilized_tools(&self, tools: &BTreeMap<String, String>) -> Result<()> {
        self.tools().save(tools).await
    }

    async fn load_utilized_tools(&self) -> Result<BTreeMap<String, String>> {
        self.tools().load().await
    }

    async fn is_healthy(&self) -> bool {
        self.state_store.is_healthy().await
    }
}
