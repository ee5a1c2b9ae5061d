//! Typed domain errors.

use thiserror::Error;

/// A malformed answer event prevented building claim parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimParamsError {
    #[error("answer event {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },
}

/// The adaptive scanner could not complete its range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error(
        "window [{from_block}, {to_block}] failed {retries} time(s), giving up this round: {reason}"
    )]
    RetriesExhausted {
        from_block: u64,
        to_block: u64,
        retries: u32,
        reason: String,
    },
    #[error("could not read the chain head: {0}")]
    HeadUnavailable(String),
}

impl ScanError {
    /// Failed windows behind this error.
    pub fn retries(&self) -> u32 {
        match self {
            Self::RetriesExhausted { retries, .. } => *retries,
            Self::HeadUnavailable(_) => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("epsilon must be within [0, 1], got {0}")]
    InvalidEpsilon(f64),
}
