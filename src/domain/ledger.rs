//! Redemption ledger - the checkpoint of the redemption engine.
//!
//! Owned by the orchestrator and persisted between rounds. Cursors are
//! only moved right after a successful gateway call, so an interrupted
//! round resumes exactly where it stopped.

use std::collections::{BTreeMap, BTreeSet};

use alloy::primitives::{B256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::claim_params::AnswerEvent;
use super::position::Trade;

/// A resumable `[from_block, to_block]` scan position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanCursor {
    pub from_block: u64,
    pub to_block: u64,
    pub started: bool,
}

impl ScanCursor {
    /// Opens the range on first use. `from_block` is clamped to the head.
    pub fn start(&mut self, from_block: u64, head: u64) {
        self.to_block = head;
        self.from_block = from_block.min(head);
        self.started = true;
    }

    /// Upper end of the next window for the given batch size.
    pub fn window_end(&self, batch_size: u64) -> u64 {
        self.from_block.saturating_add(batch_size).min(self.to_block)
    }

    /// Commits a fetched window.
    pub fn advance(&mut self, window_end: u64) {
        self.from_block = window_end.min(self.to_block);
    }

    pub fn is_finished(&self) -> bool {
        self.started && self.from_block >= self.to_block
    }
}

/// Mutable progress of redeeming, shared by the scanner and orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionLedger {
    /// Distinct winning trades still awaiting settlement.
    pub trades: BTreeSet<Trade>,
    /// Claimable amount per condition, summed over distinct trades.
    pub claimable_amounts: BTreeMap<B256, Decimal>,
    /// Bet transaction hash -> tool that produced the prediction.
    pub utilized_tools: BTreeMap<String, String>,
    pub redeemed_condition_ids: BTreeSet<B256>,
    pub payout_so_far: U256,
    /// Agreed total carried in from previous rounds; `payout_so_far` is
    /// this plus the payouts found by the current scan.
    #[serde(default)]
    pub payout_base: U256,
    /// Lower bound for every scan, resolved from the oldest winning market.
    pub earliest_block: Option<u64>,
    /// Creation time `earliest_block` was resolved from.
    #[serde(default)]
    pub earliest_creation_timestamp: Option<u64>,
    pub check: ScanCursor,
    pub claim: ScanCursor,
    /// The question whose history the `answered` buffer holds.
    pub claim_question: Option<B256>,
    pub event_filtering_batch_size: u64,
    pub payouts: BTreeMap<B256, U256>,
    pub claiming_condition_ids: Vec<B256>,
    pub claimed_condition_ids: Vec<B256>,
    pub answered: Vec<AnswerEvent>,
}

impl RedemptionLedger {
    pub fn new(event_filtering_batch_size: u64) -> Self {
        Self {
            trades: BTreeSet::new(),
            claimable_amounts: BTreeMap::new(),
            utilized_tools: BTreeMap::new(),
            redeemed_condition_ids: BTreeSet::new(),
            payout_so_far: U256::ZERO,
            payout_base: U256::ZERO,
            earliest_block: None,
            earliest_creation_timestamp: None,
            check: ScanCursor::default(),
            claim: ScanCursor::default(),
            claim_question: None,
            event_filtering_batch_size,
            payouts: BTreeMap::new(),
            claiming_condition_ids: Vec::new(),
            claimed_condition_ids: Vec::new(),
            answered: Vec::new(),
        }
    }

    /// One representative trade per condition, in condition-id order.
    pub fn candidates(&self) -> Vec<Trade> {
        let mut by_condition: BTreeMap<B256, &Trade> = BTreeMap::new();
        for trade in &self.trades {
            by_condition.entry(trade.condition_id()).or_insert(trade);
        }
        by_condition.into_values().cloned().collect()
    }

    pub fn claimable_amount(&self, condition_id: &B256) -> Decimal {
        self.claimable_amounts
            .get(condition_id)
            .copied()
            .unwrap_or_default()
    }

    /// Shrinks the filtering batch, never below `minimum`. Returns the new size.
    pub fn shrink_batch(&mut self, minimum: u64, reduce_factor: f64) -> u64 {
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let reduced = (self.event_filtering_batch_size as f64 * (1.0 - reduce_factor)).floor() as u64;
        self.event_filtering_batch_size = reduced.max(minimum);
        self.event_filtering_batch_size
    }

    /// Adds payouts found in one window of the redeemed scan.
    pub fn merge_payouts(&mut self, found: BTreeMap<B256, U256>) {
        for (condition_id, amount) in found {
            let entry = self.payouts.entry(condition_id).or_insert(U256::ZERO);
            *entry = entry.saturating_add(amount);
        }
    }

    /// Folds a completed redeemed scan into the settled bookkeeping.
    pub fn commit_payouts(&mut self) {
        self.redeemed_condition_ids
            .extend(self.payouts.keys().copied());
        self.payout_so_far = self
            .payouts
            .values()
            .fold(self.payout_base, |acc, v| acc.saturating_add(*v));
        self.drop_redeemed_trades();
    }

    /// Adopts the agreed payout total as the base for later commits.
    pub fn adopt_payout(&mut self, total: U256) {
        self.payout_base = total;
        self.payout_so_far = total;
    }

    /// Whether a market created at `creation_timestamp` predates the
    /// current scan lower bound.
    pub fn lowers_earliest_block(&self, creation_timestamp: u64) -> bool {
        self.earliest_creation_timestamp
            .is_none_or(|resolved| creation_timestamp < resolved)
    }

    /// Records the scan lower bound for a market created at `creation_timestamp`.
    pub fn lower_earliest_block(&mut self, block: u64, creation_timestamp: u64) {
        self.earliest_block = Some(self.earliest_block.map_or(block, |known| known.min(block)));
        self.earliest_creation_timestamp = Some(creation_timestamp);
    }

    /// Removes trades whose condition is known to be redeemed.
    pub fn drop_redeemed_trades(&mut self) -> usize {
        let before = self.trades.len();
        let redeemed = &self.redeemed_condition_ids;
        self.trades
            .retain(|trade| !redeemed.contains(&trade.condition_id()));
        before - self.trades.len()
    }

    /// Points the claim scan at `question_id`, discarding any buffer that
    /// belongs to a different question.
    pub fn focus_claim_scan(&mut self, question_id: B256) {
        if self.claim_question != Some(question_id) {
            self.claim_question = Some(question_id);
            self.claim = ScanCursor::default();
            self.answered.clear();
        }
    }

    pub fn is_claiming(&self, condition_id: &B256) -> bool {
        self.claiming_condition_ids.contains(condition_id)
    }

    pub fn is_claimed(&self, condition_id: &B256) -> bool {
        self.claimed_condition_ids.contains(condition_id)
    }

    pub fn mark_claiming(&mut self, condition_id: B256) {
        if !self.is_claiming(&condition_id) {
            self.claiming_condition_ids.push(condition_id);
        }
    }

    /// The redemption transaction was confirmed: provisional claims become
    /// final and everything else starts over.
    #[must_use]
    pub fn settled(self) -> Self {
        let mut claimed = self.claimed_condition_ids;
        for condition_id in self.claiming_condition_ids {
            if !claimed.contains(&condition_id) {
                claimed.push(condition_id);
            }
        }
        Self {
            claimed_condition_ids: claimed,
            utilized_tools: self.utilized_tools,
            ..Self::new(self.event_filtering_batch_size)
        }
    }

    /// The agreed outcome diverged from this replica's candidate set.
    /// Claim bookkeeping survives so nothing is redeemed twice.
    #[must_use]
    pub fn rejected(self) -> Self {
        Self {
            claimed_condition_ids: self.claimed_condition_ids,
            claiming_condition_ids: self.claiming_condition_ids,
            utilized_tools: self.utilized_tools,
            ..Self::new(self.event_filtering_batch_size)
        }
    }
}
