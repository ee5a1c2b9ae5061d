//! Position model - one observed bet and the market it belongs to.
//!
//! Values are parsed from subgraph-shaped JSON (camelCase keys, integers
//! that may arrive as decimal strings) and are immutable afterwards.
//! Equality, ordering and hashing are structural over every field, which
//! is what the ledger relies on for deduplication.

use alloy::primitives::{Address, B256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Parent collection id used for top-level positions.
pub const ZERO_COLLECTION: B256 = B256::ZERO;

/// Accepts either a JSON number or a decimal string.
fn de_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Accepts a JSON number or a decimal string for a price.
fn de_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(f64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
        Raw::Num(n) => Decimal::try_from(n).map_err(serde::de::Error::custom),
    }
}

/// An on-chain resolution criterion of a market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub id: B256,
    #[serde(deserialize_with = "de_u64")]
    pub outcome_slot_count: u64,
}

impl Condition {
    /// One bit per outcome slot: `[1, 2, 4, ...]`.
    pub fn index_sets(&self) -> Vec<u64> {
        (0..self.outcome_slot_count).map(|i| 1u64 << i).collect()
    }
}

/// A single answer recorded for a question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub answer: B256,
    pub aggregate_bond: U256,
}

/// The question arbitrated independently of the betting pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Question {
    pub id: B256,
    /// Opaque question payload, passed verbatim to `resolve`.
    pub data: String,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

/// A fixed-product market maker pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub collateral_token: Address,
    pub condition: Condition,
    pub creator: Address,
    #[serde(default)]
    pub current_answer: Option<B256>,
    pub question: Question,
    #[serde(deserialize_with = "de_u64")]
    pub template_id: u64,
    #[serde(deserialize_with = "de_u64")]
    pub answer_finalized_timestamp: u64,
    #[serde(deserialize_with = "de_u64")]
    pub creation_timestamp: u64,
}

impl Market {
    /// Index of the market's current answer, `None` when unanswered.
    pub fn current_answer_index(&self) -> Option<U256> {
        self.current_answer
            .map(|answer| U256::from_be_bytes(answer.0))
    }
}

/// One observed bet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Trade {
    #[serde(rename = "fpmm")]
    pub market: Market,
    #[serde(rename = "outcomeIndex", deserialize_with = "de_u64")]
    pub outcome_index: u64,
    #[serde(rename = "outcomeTokenMarginalPrice", deserialize_with = "de_decimal")]
    pub outcome_token_marginal_price: Decimal,
    #[serde(rename = "outcomeTokensTraded", deserialize_with = "de_u64")]
    pub outcome_tokens_traded: u64,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
}

impl Trade {
    /// Whether the bet's outcome matches the market's current answer.
    pub fn is_winning(&self) -> bool {
        self.market
            .current_answer_index()
            .is_some_and(|index| index == U256::from(self.outcome_index))
    }

    pub fn claimable_amount(&self) -> Decimal {
        self.outcome_token_marginal_price * Decimal::from(self.outcome_tokens_traded)
    }

    pub fn condition_id(&self) -> B256 {
        self.market.condition.id
    }

    pub fn question_id(&self) -> B256 {
        self.market.question.id
    }
}
