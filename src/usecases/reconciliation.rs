//! Position Reconciliation - Trades Into the Redemption Ledger
//!
//! Folds freshly fetched trades into the ledger: only markets whose
//! answer finalized before the synced clock count, losing bets are
//! dropped, and each distinct winning trade adds its claimable amount to
//! its condition. Resolved bets also settle the accuracy of the tool
//! that predicted them.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::domain::ledger::RedemptionLedger;
use crate::domain::policy::EGreedyPolicy;
use crate::domain::position::Trade;
use crate::ports::gateway::LedgerGateway;

use super::timed;

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
  /// Trades whose market answer was final at the synced time.
  pub finalized: usize,
  pub winning: usize,
  /// Winning trades not seen before.
  pub inserted: usize,
  /// Tool accuracies updated from these trades.
  pub outcomes_recorded: usize,
}

/// Updates `ledger` and `policy` with `new_trades`.
///
/// Re-applying trades that are already in the ledger changes nothing.
#[instrument(skip_all, fields(synced_timestamp = synced_timestamp))]
pub async fn reconcile<G: LedgerGateway>(
  gateway: &G,
  timeout: Duration,
  ledger: &mut RedemptionLedger,
  policy: &mut EGreedyPolicy,
  new_trades: impl IntoIterator<Item = Trade>,
  synced_timestamp: u64,
) -> ReconcileSummary {
  let mut summary = ReconcileSummary::default();

  for trade in new_trades {
    if trade.market.answer_finalized_timestamp > synced_timestamp {
      continue;
    }
    summary.finalized += 1;

    // attribution is dropped once used so the map stays bounded
    if let Some(tool) = ledger.utilized_tools.remove(&trade.tx_hash) {
      if policy.record_outcome(&tool, trade.is_winning()) {
        summary.outcomes_recorded += 1;
      } else {
        warn!(
          tool = %tool,
          tx_hash = %trade.tx_hash,
          "Tool not present in the policy, outcome not recorded"
        );
      }
    }

    if !trade.is_winning() {
      continue;
    }
    summary.winning += 1;

    if ledger.lowers_earliest_block(trade.market.creation_timestamp) {
      resolve_earliest_block(gateway, timeout, ledger, &trade).await;
    }

    let condition_id = trade.condition_id();
    let amount = trade.claimable_amount();
    if ledger.trades.insert(trade) {
      *ledger.claimable_amounts.entry(condition_id).or_default() += amount;
      summary.inserted += 1;
    } else {
      debug!(condition_id = %condition_id, "Trade already reconciled");
    }
  }

  info!(
    finalized = summary.finalized,
    winning = summary.winning,
    inserted = summary.inserted,
    outcomes_recorded = summary.outcomes_recorded,
    "Reconciled trades"
  );

  summary
}

async fn resolve_earliest_block<G: LedgerGateway>(
  gateway: &G,
  timeout: Duration,
  ledger: &mut RedemptionLedger,
  trade: &Trade,
) {
  let timestamp = trade.market.creation_timestamp;
  match timed(timeout, gateway.block_at_timestamp(timestamp)).await {
    Ok(block) => {
      ledger.lower_earliest_block(block, timestamp);
      info!(
        block,
        timestamp,
        earliest_block = ?ledger.earliest_block,
        "Chose block closest to market creation as scan start"
      );
    }
    Err(e) => {
      warn!(
        timestamp,
        error = %e,
        "Block lookup failed, keeping the current scan start"
      );
    }
  }
}
