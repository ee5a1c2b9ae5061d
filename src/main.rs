//! Prediction Redeemer - Status Entry Point
//!
//! Loads the persisted redemption state and reports it. The chain and
//! subgraph gateway is provided by the hosting agent, which drives
//! `Settlement::prepare_round` once per round; this binary inspects and
//! normalizes the state that agent leaves behind.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate (path from argv, default `config.toml`)
//! 2. Init tracing (JSON structured logging)
//! 3. Open the data directory
//! 4. Load or create the policy, registering configured tools
//! 5. Load the ledger checkpoint and tool attributions
//! 6. Log policy statistics and export metrics
//! 7. Save the normalized state back (atomic writes)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use prediction_redeemer::adapters::metrics::RedemptionMetrics;
use prediction_redeemer::adapters::persistence::RepositoryImpl;
use prediction_redeemer::config;
use prediction_redeemer::domain::ledger::RedemptionLedger;
use prediction_redeemer::domain::policy::EGreedyPolicy;
use prediction_redeemer::ports::repository::StateRepository;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.bot.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        safe_address = %config.bot.safe_address,
        tools = config.policy.tools.len(),
        "Starting prediction redeemer"
    );

    // ── 3. Open the data directory ──────────────────────────
    let repository = RepositoryImpl::from_data_dir(&config.persistence.data_dir)
        .await
        .context("Failed to open data directory")?;
    if !repository.is_healthy().await {
        warn!(data_dir = %config.persistence.data_dir, "Data directory is not writable");
    }

    // ── 4. Policy ───────────────────────────────────────────
    let mut policy = match repository.load_policy().await? {
        Some(policy) => policy,
        None => EGreedyPolicy::new(
            config.policy.epsilon,
            config.policy.consecutive_failures_threshold,
            config.policy.quarantine_duration,
        )?,
    };
    policy.register_tools(config.policy.tools.iter().map(String::as_str));

    // ── 5. Ledger and attributions ──────────────────────────
    let mut ledger = repository
        .load_ledger()
        .await?
        .unwrap_or_else(|| RedemptionLedger::new(config.redeeming.event_filtering_batch_size));
    let attributions = repository.load_utilized_tools().await?;
    for (tx_hash, tool) in attributions {
        ledger.utilized_tools.entry(tx_hash).or_insert(tool);
    }

    info!(
        trades = ledger.trades.len(),
        claiming = ledger.claiming_condition_ids.len(),
        claimed = ledger.claimed_condition_ids.len(),
        payout_so_far = %ledger.payout_so_far,
        batch_size = ledger.event_filtering_batch_size,
        pending_attributions = ledger.utilized_tools.len(),
        "Redemption ledger"
    );

    // ── 6. Statistics and metrics ───────────────────────────
    let now = Utc::now().timestamp();
    info!("{}", policy.stats_report(now));

    let metrics = RedemptionMetrics::new()?;
    metrics.record_policy(&policy, now);
    metrics
        .filtering_batch_size
        .set(i64::try_from(ledger.event_filtering_batch_size).unwrap_or(i64::MAX));

    // ── 7. Persist normalized state ─────────────────────────
    repository.save_policy(&policy).await?;
    repository.save_ledger(&ledger).await?;
    repository.save_utilized_tools(&ledger.utilized_tools).await?;

    info!(metrics = %metrics.encode()?, "State saved");
    Ok(())
}
