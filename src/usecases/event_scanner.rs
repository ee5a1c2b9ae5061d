//! Event Scanner - Checkpointed, Backoff-Adaptive Block Range Scans
//!
//! Walks `[from_block, to_block]` in windows of the ledger's
//! `event_filtering_batch_size`. A failed window shrinks the batch and
//! is retried in place; a successful one is merged into the ledger and
//! only then is the cursor advanced. Because the cursor lives in the
//! ledger, a scan cut short by a round timeout resumes where it stopped.
//!
//! Two scans share this loop:
//! - `Redeemed`: payouts already redeemed for the ledger's positions
//! - `Answers`: the answer history of one question, for claiming

use std::collections::BTreeMap;

use alloy::primitives::{B256, U256};
use tracing::{debug, info, instrument, warn};

use crate::config::RedeemingConfig;
use crate::domain::claim_params::AnswerEvent;
use crate::domain::error::ScanError;
use crate::domain::ledger::{RedemptionLedger, ScanCursor};
use crate::ports::gateway::{LedgerGateway, RedeemedQuery};

use super::timed;

/// What a scan collects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
  Redeemed(RedeemedQuery),
  Answers { question_id: B256 },
}

impl ScanTarget {
  fn label(&self) -> &'static str {
    match self {
      Self::Redeemed(_) => "redeemed",
      Self::Answers { .. } => "answers",
    }
  }

  fn cursor<'a>(&self, ledger: &'a RedemptionLedger) -> &'a ScanCursor {
    match self {
      Self::Redeemed(_) => &ledger.check,
      Self::Answers { .. } => &ledger.claim,
    }
  }

  fn cursor_mut<'a>(&self, ledger: &'a mut RedemptionLedger) -> &'a mut ScanCursor {
    match self {
      Self::Redeemed(_) => &mut ledger.check,
      Self::Answers { .. } => &mut ledger.claim,
    }
  }
}

enum Fetched {
  Payouts(BTreeMap<B256, U256>),
  Answers(Vec<AnswerEvent>),
}

/// Progress made by one `scan` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
  /// Windows fetched and committed.
  pub windows: usize,
  /// Failed windows that were retried.
  pub retries: u32,
  /// Batch size when the scan finished.
  pub batch_size: u64,
}

pub struct EventScanner<'a, G: LedgerGateway> {
  gateway: &'a G,
  config: &'a RedeemingConfig,
}

impl<'a, G: LedgerGateway> EventScanner<'a, G> {
  pub fn new(gateway: &'a G, config: &'a RedeemingConfig) -> Self {
    Self { gateway, config }
  }

  /// Runs the scan to completion or until retries run out.
  ///
  /// On `Err` the cursor and batch size are left at the failing window so
  /// the next round continues from there.
  #[instrument(skip_all, fields(target = target.label()))]
  pub async fn scan(
    &self,
    ledger: &mut RedemptionLedger,
    target: &ScanTarget,
  ) -> Result<ScanReport, ScanError> {
    if !target.cursor(ledger).started {
      let head = timed(self.config.contract_timeout(), self.gateway.latest_block())
        .await
        .map_err(|e| ScanError::HeadUnavailable(e.to_string()))?;
      let from_block = ledger.earliest_block.unwrap_or(0);
      target.cursor_mut(ledger).start(from_block, head);
      info!(from_block, to_block = head, "Started scan");
    }

    let mut report = ScanReport::default();
    let mut failures = 0u32;

    loop {
      let cursor = *target.cursor(ledger);
      if cursor.from_block >= cursor.to_block {
        break;
      }
      let window_end = cursor.window_end(ledger.event_filtering_batch_size);

      match self.fetch(target, cursor.from_block, window_end).await {
        Ok(fetched) => {
          match fetched {
            Fetched::Payouts(payouts) => ledger.merge_payouts(payouts),
            Fetched::Answers(answers) => ledger.answered.extend(answers),
          }
          target.cursor_mut(ledger).advance(window_end);
          report.windows += 1;
          failures = 0;
          debug!(from_block = cursor.from_block, to_block = window_end, "Window committed");
        }
        Err(e) => {
          failures += 1;
          report.retries += 1;
          if failures >= self.config.max_filtering_retries {
            warn!(
              from_block = cursor.from_block,
              to_block = window_end,
              retries = failures,
              error = %e,
              "Event filtering kept failing, abandoning this round"
            );
            return Err(ScanError::RetriesExhausted {
              from_block: cursor.from_block,
              to_block: window_end,
              retries: failures,
              reason: e.to_string(),
            });
          }

          let batch_size =
            ledger.shrink_batch(self.config.minimum_batch_size, self.config.reduce_factor);
          warn!(
            from_block = cursor.from_block,
            to_block = window_end,
            batch_size,
            error = %e,
            "Event filtering failed, retrying with a smaller batch"
          );
        }
      }
    }

    report.batch_size = ledger.event_filtering_batch_size;
    Ok(report)
  }

  async fn fetch(
    &self,
    target: &ScanTarget,
    from_block: u64,
    to_block: u64,
  ) -> anyhow::Result<Fetched> {
    let limit = self.config.contract_timeout();
    match target {
      ScanTarget::Redeemed(query) => {
        timed(limit, self.gateway.check_redeemed(query, from_block, to_block))
          .await
          .map(Fetched::Payouts)
      }
      ScanTarget::Answers { question_id } => {
        timed(limit, self.gateway.get_claim_params(*question_id, from_block, to_block))
          .await
          .map(Fetched::Answers)
      }
    }
  }
}
