//! Claim parameter builder.
//!
//! The arbitrator keeps answers as a hash-linked list. To claim, the full
//! history must be replayed newest-first: each entry carries the hash that
//! links it to the next older answer, and the oldest entry carries the
//! zero hash. Any reordering produces a call that reverts on-chain.

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use super::error::ClaimParamsError;

/// A raw "new answer submitted" event. Fields are optional because the
/// log decoder hands back whatever it could read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AnswerEvent {
    pub history_hash: Option<B256>,
    pub user: Option<Address>,
    pub bond: Option<U256>,
    pub answer: Option<B256>,
}

/// The four parallel arrays of a `claimWinnings` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClaimParams {
    pub history_hashes: Vec<B256>,
    pub addresses: Vec<Address>,
    pub bonds: Vec<U256>,
    pub answers: Vec<B256>,
}

impl ClaimParams {
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// Builds claim parameters from events in ascending block order.
///
/// Output position `i` describes `answered[n - 1 - i]`; its history hash is
/// `answered[n - 2 - i].history_hash`, or zero for the oldest answer.
pub fn build_claim_params(answered: &[AnswerEvent]) -> Result<ClaimParams, ClaimParamsError> {
    let n = answered.len();
    let mut params = ClaimParams {
        history_hashes: Vec::with_capacity(n),
        addresses: Vec::with_capacity(n),
        bonds: Vec::with_capacity(n),
        answers: Vec::with_capacity(n),
    };

    for (i, event) in answered.iter().rev().enumerate() {
        let history_hash = if i == n - 1 {
            B256::ZERO
        } else {
            let older = n - 2 - i;
            answered[older]
                .history_hash
                .ok_or(ClaimParamsError::MissingField { index: older, field: "history_hash" })?
        };
        let index = n - 1 - i;
        let user = event.user.ok_or(ClaimParamsError::MissingField { index, field: "user" })?;
        let bond = event.bond.ok_or(ClaimParamsError::MissingField { index, field: "bond" })?;
        let answer = event
            .answer
            .ok_or(ClaimParamsError::MissingField { index, field: "answer" })?;

        params.history_hashes.push(history_hash);
        params.addresses.push(user);
        params.bonds.push(bond);
        params.answers.push(answer);
    }

    Ok(params)
}
