//! State Store - Atomic JSON Documents
//!
//! Saves the ledger (`ledger.json`) and the policy (`policy.json`) using
//! atomic writes (write to a tmp file, then rename). A crash mid-write
//! leaves the previous document in place, never a partial one.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::domain::ledger::RedemptionLedger;
use crate::domain::policy::EGreedyPolicy;

const LEDGER_FILE: &str = "ledger.json";
const POLICY_FILE: &str = "policy.json";

/// Atomic JSON document store rooted at the data directory.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Create a new state store in the given data directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let dir = Path::new(data_dir);
        fs::create_dir_all(dir)
            .await
            .context("Failed to create data directory")?;

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[instrument(skip(self, ledger), fields(trades = ledger.trades.len()))]
    pub async fn save_ledger(&self, ledger: &RedemptionLedger) -> Result<()> {
        self.write_json(LEDGER_FILE, ledger).await
    }

    /// Returns `None` if no ledger was saved yet (first startup).
    pub async fn load_ledger(&self) -> Result<Option<RedemptionLedger>> {
        let ledger: Option<RedemptionLedger> = self.read_json(LEDGER_FILE).await?;
        if let Some(ledger) = &ledger {
            info!(
                trades = ledger.trades.len(),
                claiming = ledger.claiming_condition_ids.len(),
                batch_size = ledger.event_filtering_batch_size,
                "Ledger checkpoint loaded"
            );
        }
        Ok(ledger)
    }

    #[instrument(skip(self, policy), fields(tools = policy.n_tools()))]
    pub async fn save_policy(&self, policy: &EGreedyPolicy) -> Result<()> {
        self.write_json(POLICY_FILE, policy).await
    }

    /// Unknown fields are rejected, so a policy written by an incompatible
    /// version fails loudly instead of loading with defaults.
    pub async fn load_policy(&self) -> Result<Option<EGreedyPolicy>> {
        self.read_json(POLICY_FILE).await
    }

    /// Serializes `value` and swaps it in atomically (tmp → rename).
    pub(crate) async fn write_json<T: Serialize + Sync>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let tmp_path = self.dir.join(format!("{name}.tmp"));

        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {name}"))?;

        fs::write(&tmp_path, &json)
            .await
            .with_context(|| format!("Failed to write tmp file for {name}"))?;

        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to rename {name}"))?;

        debug!(path = %path.display(), bytes = json.len(), "Document saved");
        Ok(())
    }

    pub(crate) async fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.dir.join(name);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            info!(path = %path.display(), "No saved document found, starting fresh");
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {name}"))?;

        let value = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {name}"))?;
        Ok(Some(value))
    }

    /// Check if the data directory is writable.
    pub async fn is_healthy(&self) -> bool {
        let probe = self.dir.join(".health_check");
        let result = fs::write(&probe, b"ok").await;
        let _ = fs::remove_file(&probe).await;
        result.is_ok()
    }
}
