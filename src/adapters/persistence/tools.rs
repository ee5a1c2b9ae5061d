//! Utilized Tools Store - Bet Attribution File
//!
//! Keeps `utilized_tools.json`, the map from bet transaction hash to the
//! prediction tool that produced it. The trading side appends to it and
//! the redeemer consumes entries once the bet's market resolves.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{info, instrument};

use super::state::StateStore;

const TOOLS_FILE: &str = "utilized_tools.json";

/// Reads and rewrites the attribution map through the atomic store.
pub struct ToolsStore<'a> {
    store: &'a StateStore,
}

impl<'a> ToolsStore<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    #[instrument(skip(self, tools), fields(entries = tools.len()))]
    pub async fn save(&self, tools: &BTreeMap<String, String>) -> Result<()> {
        self.store.write_json(TOOLS_FILE, tools).await
    }

    /// Missing file means no bets were attributed yet.
    pub async fn load(&self) -> Result<BTreeMap<String, String>> {
        let tools: BTreeMap<String, String> =
            self.store.read_json(TOOLS_FILE).await?.unwrap_or_default();
        info!(entries = tools.len(), "Utilized tools loaded");
        Ok(tools)
    }
}
