//! Domain layer - redemption bookkeeping and tool selection.
//!
//! Pure value types and deterministic algorithms (hexagonal architecture
//! inner ring). Nothing here performs I/O; every input that could differ
//! between replicas, such as randomness or the clock, is passed in.

pub mod claim_params;
pub mod error;
pub mod ledger;
pub mod payload;
pub mod policy;
pub mod position;

pub use claim_params::{AnswerEvent, ClaimParams, build_claim_params};
pub use error::{ClaimParamsError, PolicyError, ScanError};
pub use ledger::{RedemptionLedger, ScanCursor};
pub use payload::RedeemPayload;
pub use policy::{AccuracyInfo, ConsecutiveFailures, EGreedyPolicy};
pub use position::{Answer, Condition, Market, Question, Trade, ZERO_COLLECTION};
