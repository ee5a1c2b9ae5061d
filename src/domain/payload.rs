//! Per-replica redeem payload handed to the consensus layer.
//!
//! Replicas must agree byte-for-byte, so every collection here has a
//! stable order and the blobs are produced by the same serializer.

use std::collections::{BTreeMap, BTreeSet};

use alloy::primitives::{B256, U256};
use serde::{Deserialize, Serialize};

use super::ledger::RedemptionLedger;
use super::policy::EGreedyPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemPayload {
    /// Round that will submit the transaction, `None` when there is nothing to redeem.
    pub tx_submitter: Option<String>,
    pub tx_hash: Option<String>,
    /// Serialized `EGreedyPolicy`.
    pub policy: Option<String>,
    /// Serialized `{tx_hash: tool_name}` map.
    pub utilized_tools: Option<String>,
    pub redeemed_condition_ids: Option<BTreeSet<B256>>,
    pub payout_so_far: Option<U256>,
}

impl RedeemPayload {
    /// Payload announcing that this round redeems nothing.
    pub fn no_redeeming() -> Self {
        Self {
            tx_submitter: None,
            tx_hash: None,
            policy: None,
            utilized_tools: None,
            redeemed_condition_ids: None,
            payout_so_far: None,
        }
    }

    /// Payload carrying a prepared redemption transaction and the state
    /// every replica should adopt next.
    pub fn redeem(
        tx_submitter: &str,
        tx_hash: String,
        policy: &EGreedyPolicy,
        ledger: &RedemptionLedger,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            tx_submitter: Some(tx_submitter.to_string()),
            tx_hash: Some(tx_hash),
            policy: Some(policy.to_json()?),
            utilized_tools: Some(encode_utilized_tools(&ledger.utilized_tools)?),
            redeemed_condition_ids: Some(ledger.redeemed_condition_ids.clone()),
            payout_so_far: Some(ledger.payout_so_far),
        })
    }
}

pub fn encode_utilized_tools(tools: &BTreeMap<String, String>) -> serde_json::Result<String> {
    serde_json::to_string(tools)
}

pub fn decode_utilized_tools(raw: &str) -> serde_json::Result<BTreeMap<String, String>> {
    serde_json::from_str(raw)
}
