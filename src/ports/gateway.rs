//! Ledger Gateway Port - Contract Reads, Event Filters, Tx Builders
//!
//! Everything the redemption engine needs from the chain. Implementations
//! wrap RPC calls to the conditional tokens contract, the answer
//! arbitrator (realitio) and its resolution proxy. Each call is one
//! suspension point of a redemption round; the engine applies its own
//! timeout around it.

use std::collections::BTreeMap;

use alloy::primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;

use crate::domain::claim_params::{AnswerEvent, ClaimParams};

/// Positions to look up in `PayoutRedemption` logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemedQuery {
  pub redeemer: Address,
  pub collateral_tokens: Vec<Address>,
  pub parent_collection_ids: Vec<B256>,
  pub condition_ids: Vec<B256>,
  pub index_sets: Vec<Vec<u64>>,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync + 'static {
  /// Current chain head.
  async fn latest_block(&self) -> anyhow::Result<u64>;

  /// Closest block mined at or after `timestamp`.
  async fn block_at_timestamp(&self, timestamp: u64) -> anyhow::Result<u64>;

  /// Payouts already redeemed per condition within `[from_block, to_block]`.
  async fn check_redeemed(
    &self,
    query: &RedeemedQuery,
    from_block: u64,
    to_block: u64,
  ) -> anyhow::Result<BTreeMap<B256, U256>>;

  /// Whether the condition's payout vector has been reported.
  async fn check_resolved(&self, condition_id: B256) -> anyhow::Result<bool>;

  async fn build_redeem_positions_tx(
    &self,
    collateral_token: Address,
    parent_collection_id: B256,
    condition_id: B256,
    index_sets: &[u64],
  ) -> anyhow::Result<Bytes>;

  /// Whether the arbitrator considers the question finalized.
  async fn check_finalized(&self, question_id: B256) -> anyhow::Result<bool>;

  /// Head of the question's answer history; zero once claimed.
  async fn get_history_hash(&self, question_id: B256) -> anyhow::Result<B256>;

  /// `LogNewAnswer` events for the question, ascending by block.
  async fn get_claim_params(
    &self,
    question_id: B256,
    from_block: u64,
    to_block: u64,
  ) -> anyhow::Result<Vec<AnswerEvent>>;

  /// Static call of `claimWinnings` against the current state.
  async fn simulate_claim_winnings(
    &self,
    question_id: B256,
    claim_params: &ClaimParams,
    sender: Address,
  ) -> anyhow::Result<bool>;

  async fn build_claim_winnings(
    &self,
    question_id: B256,
    claim_params: &ClaimParams,
  ) -> anyhow::Result<Bytes>;

  async fn build_resolve_tx(
    &self,
    question_id: B256,
    template_id: u64,
    question: &str,
    num_outcomes: u64,
  ) -> anyhow::Result<Bytes>;
}
