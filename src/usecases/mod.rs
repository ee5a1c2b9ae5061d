//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement
//! the redemption workflow. Each use case is a self-contained
//! business operation.
//!
//! Use cases:
//! - `reconciliation`: fold new trades into the ledger and the policy
//! - `EventScanner`: checkpointed, backoff-adaptive block range scans
//! - `Settlement`: per-candidate redemption state machine and batching

pub mod event_scanner;
pub mod reconciliation;
pub mod settlement;

use std::future::Future;
use std::time::Duration;

/// Bounds one gateway call; an elapsed timer counts as a failed call.
pub(crate) async fn timed<T>(
  limit: Duration,
  call: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
  match tokio::time::timeout(limit, call).await {
    Ok(result) => result,
    Err(_) => Err(anyhow::anyhow!("gateway call timed out after {limit:?}")),
  }
}
