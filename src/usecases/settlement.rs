//! Settlement Use Case - Redeeming Winning Positions
//!
//! Turns the ledger's winning positions into one multisend batch.
//!
//! Round flow:
//! 1. Reconcile new trades into the ledger
//! 2. Drop positions known to be redeemed, then scan for payouts
//!    redeemed since the last round
//! 3. Walk the candidates through the per-candidate state machine,
//!    collecting resolve / claim / redeem sub-transactions
//! 4. Report a batch, an explicit "no redeeming", or an aborted scan
//!
//! Every candidate step is one gateway call and reports what should
//! happen next, so retries and skips are decided in one place.

use std::time::Duration;

use alloy::primitives::{Address, B256, Bytes, U256};
use anyhow::Context;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::config::{AppConfig, ContractsConfig, RedeemingConfig};
use crate::domain::claim_params::{ClaimParams, build_claim_params};
use crate::domain::error::{ClaimParamsError, ScanError};
use crate::domain::ledger::RedemptionLedger;
use crate::domain::payload::{RedeemPayload, decode_utilized_tools};
use crate::domain::policy::EGreedyPolicy;
use crate::domain::position::{Trade, ZERO_COLLECTION};
use crate::ports::gateway::{LedgerGateway, RedeemedQuery};

use super::event_scanner::{EventScanner, ScanTarget};
use super::reconciliation::{ReconcileSummary, reconcile};
use super::timed;

/// One sub-transaction of the redemption multisend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisendBatch {
  pub to: Address,
  pub data: Bytes,
  pub value: U256,
}

impl MultisendBatch {
  fn call(to: Address, data: Bytes) -> Self {
    Self {
      to,
      data,
      value: U256::ZERO,
    }
  }
}

/// Sub-transactions ready to be bundled and submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedemptionPlan {
  pub batches: Vec<MultisendBatch>,
  /// Conditions covered, in processing order.
  pub condition_ids: Vec<B256>,
  pub expected_winnings: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
  Redeem(RedemptionPlan),
  /// Nothing worth redeeming this round.
  NoRedeeming,
  /// Event filtering failed repeatedly; retry next round.
  ScanAborted(ScanError),
}

impl RoundOutcome {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Redeem(_) => "redeem",
      Self::NoRedeeming => "no_redeeming",
      Self::ScanAborted(_) => "scan_aborted",
    }
  }
}

/// Why a candidate was left out of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
  Dust { amount: Decimal },
  /// The arbitrator disagrees with the subgraph about finalization.
  NotFinalized,
  MalformedAnswers(ClaimParamsError),
  CallFailed { step: CandidateStep, reason: String },
}

impl SkipReason {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Dust { .. } => "dust",
      Self::NotFinalized => "not_finalized",
      Self::MalformedAnswers(_) => "malformed_answers",
      Self::CallFailed { .. } => "call_failed",
    }
  }
}

/// Everything a round decided, for logging and metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
  pub outcome: RoundOutcome,
  pub reconciled: ReconcileSummary,
  pub skipped: Vec<(B256, SkipReason)>,
  /// Failed event filtering windows across every scan of the round.
  pub scan_retries: u32,
  /// Event filtering batch size after the round.
  pub batch_size: u64,
}

/// States of one candidate, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStep {
  CheckFinalized,
  CheckAlreadyResolved,
  BuildResolveTx,
  GetHistoryHash,
  ScanClaimParams,
  SimulateClaim,
  BuildClaimTx,
  BuildRedeemTx,
  Done,
}

enum StepResult {
  Continue(CandidateStep),
  RetryAfter { delay: Duration, reason: String },
  Skip(SkipReason),
  Abort(ScanError),
}

enum CandidateOutcome {
  Ready(Vec<MultisendBatch>),
  Skipped(SkipReason),
  Aborted(ScanError),
}

struct CandidateTask {
  trade: Trade,
  step: CandidateStep,
  batches: Vec<MultisendBatch>,
  claim_params: Option<ClaimParams>,
  scan_retries: u32,
}

/// Redemption orchestrator for one agent.
pub struct Settlement<G: LedgerGateway> {
  gateway: G,
  config: RedeemingConfig,
  contracts: ContractsConfig,
  safe_address: Address,
}

impl<G: LedgerGateway> Settlement<G> {
  pub fn new(gateway: G, config: &AppConfig) -> Self {
    Self::with_config(
      gateway,
      config.redeeming.clone(),
      config.contracts.clone(),
      config.bot.safe_address,
    )
  }

  pub fn with_config(
    gateway: G,
    config: RedeemingConfig,
    contracts: ContractsConfig,
    safe_address: Address,
  ) -> Self {
    Self {
      gateway,
      config,
      contracts,
      safe_address,
    }
  }

  /// Prepares this round's redemption.
  ///
  /// Never fails as a whole: per-candidate problems become skips and only
  /// a scan that runs out of retries yields `ScanAborted`.
  #[instrument(skip_all, fields(synced_timestamp = synced_timestamp))]
  pub async fn prepare_round(
    &self,
    ledger: &mut RedemptionLedger,
    policy: &mut EGreedyPolicy,
    new_trades: Vec<Trade>,
    synced_timestamp: u64,
  ) -> RoundReport {
    let reconciled = reconcile(
      &self.gateway,
      self.config.contract_timeout(),
      ledger,
      policy,
      new_trades,
      synced_timestamp,
    )
    .await;

    let mut skipped = Vec::new();
    let mut scan_retries = 0;
    let outcome = match self.sweep(ledger, &mut skipped, &mut scan_retries).await {
      Ok(Some(plan)) => RoundOutcome::Redeem(plan),
      Ok(None) => RoundOutcome::NoRedeeming,
      Err(e) => RoundOutcome::ScanAborted(e),
    };

    RoundReport {
      outcome,
      reconciled,
      skipped,
      scan_retries,
      batch_size: ledger.event_filtering_batch_size,
    }
  }

  async fn sweep(
    &self,
    ledger: &mut RedemptionLedger,
    skipped: &mut Vec<(B256, SkipReason)>,
    scan_retries: &mut u32,
  ) -> Result<Option<RedemptionPlan>, ScanError> {
    if ledger.payout_so_far > U256::ZERO {
      let dropped = ledger.drop_redeemed_trades();
      if dropped > 0 {
        info!(dropped, "Dropped positions already known as redeemed");
      }
    }

    if ledger.trades.is_empty() {
      info!("No winning positions to redeem");
      return Ok(None);
    }

    self.check_redeemed(ledger, scan_retries).await?;

    let candidates = ledger.candidates();
    info!(candidates = candidates.len(), "Preparing a multisend tx to redeem payouts");

    let mut plan = RedemptionPlan {
      batches: Vec::new(),
      condition_ids: Vec::new(),
      expected_winnings: Decimal::ZERO,
    };

    for trade in candidates {
      if plan.condition_ids.len() >= self.config.redeeming_batch_size {
        info!(
          batch_size = self.config.redeeming_batch_size,
          "Redeeming batch is full, deferring the remaining positions"
        );
        break;
      }

      let condition_id = trade.condition_id();
      let amount = ledger.claimable_amount(&condition_id);
      if amount < self.config.dust_threshold {
        info!(condition_id = %condition_id, %amount, "Position's redeeming amount is dust");
        skipped.push((condition_id, SkipReason::Dust { amount }));
        continue;
      }

      info!(condition_id = %condition_id, "Processing position");
      match self.process_candidate(ledger, trade, scan_retries).await {
        CandidateOutcome::Ready(batches) => {
          plan.batches.extend(batches);
          plan.condition_ids.push(condition_id);
          plan.expected_winnings += amount;
          ledger.mark_claiming(condition_id);
        }
        CandidateOutcome::Skipped(reason) => {
          info!(condition_id = %condition_id, reason = ?reason, "Not redeeming position");
          skipped.push((condition_id, reason));
        }
        CandidateOutcome::Aborted(e) => return Err(e),
      }
    }

    if plan.condition_ids.is_empty() {
      info!("No winnings to redeem");
      return Ok(None);
    }

    info!(
      positions = plan.condition_ids.len(),
      sub_transactions = plan.batches.len(),
      expected_winnings = %plan.expected_winnings,
      "Redemption batch prepared"
    );
    Ok(Some(plan))
  }

  /// Scans for payouts redeemed since the last checkpoint and drops the
  /// matching positions.
  async fn check_redeemed(
    &self,
    ledger: &mut RedemptionLedger,
    scan_retries: &mut u32,
  ) -> Result<(), ScanError> {
    let candidates = ledger.candidates();
    let query = RedeemedQuery {
      redeemer: self.safe_address,
      collateral_tokens: candidates.iter().map(|t| t.market.collateral_token).collect(),
      parent_collection_ids: vec![ZERO_COLLECTION; candidates.len()],
      condition_ids: candidates.iter().map(Trade::condition_id).collect(),
      index_sets: candidates.iter().map(|t| t.market.condition.index_sets()).collect(),
    };

    let scanner = EventScanner::new(&self.gateway, &self.config);
    let report = scanner
      .scan(ledger, &ScanTarget::Redeemed(query))
      .await
      .inspect_err(|e| *scan_retries += e.retries())?;
    *scan_retries += report.retries;

    let before = ledger.trades.len();
    ledger.commit_payouts();
    info!(
      payout_so_far = %ledger.payout_so_far,
      redeemed = before - ledger.trades.len(),
      remaining = ledger.trades.len(),
      "Checked for redeemed positions"
    );
    Ok(())
  }

  async fn process_candidate(
    &self,
    ledger: &mut RedemptionLedger,
    trade: Trade,
    scan_retries: &mut u32,
  ) -> CandidateOutcome {
    let mut task = CandidateTask {
      trade,
      step: CandidateStep::CheckFinalized,
      batches: Vec::new(),
      claim_params: None,
      scan_retries: 0,
    };
    let mut attempts = 0u32;

    while task.step != CandidateStep::Done {
      let result = self.advance(ledger, &mut task).await;
      *scan_retries += std::mem::take(&mut task.scan_retries);
      match result {
        StepResult::Continue(next) => {
          task.step = next;
          attempts = 0;
        }
        StepResult::RetryAfter { delay, reason } => {
          attempts += 1;
          if attempts > self.config.max_step_retries {
            return CandidateOutcome::Skipped(SkipReason::CallFailed {
              step: task.step,
              reason,
            });
          }
          warn!(step = ?task.step, attempt = attempts, error = %reason, "Step failed, retrying");
          tokio::time::sleep(delay).await;
        }
        StepResult::Skip(reason) => return CandidateOutcome::Skipped(reason),
        StepResult::Abort(e) => return CandidateOutcome::Aborted(e),
      }
    }

    CandidateOutcome::Ready(task.batches)
  }

  fn retry(&self, e: &anyhow::Error) -> StepResult {
    StepResult::RetryAfter {
      delay: self.config.step_retry_sleep(),
      reason: e.to_string(),
    }
  }

  /// Executes the task's current step.
  async fn advance(&self, ledger: &mut RedemptionLedger, task: &mut CandidateTask) -> StepResult {
    let limit = self.config.contract_timeout();
    let market = &task.trade.market;
    let question_id = market.question.id;
    let condition_id = market.condition.id;

    match task.step {
      CandidateStep::CheckFinalized => {
        match timed(limit, self.gateway.check_finalized(question_id)).await {
          Ok(true) => StepResult::Continue(CandidateStep::CheckAlreadyResolved),
          Ok(false) => {
            warn!(
              condition_id = %condition_id,
              answer_finalized_timestamp = market.answer_finalized_timestamp,
              "Conflict found: the arbitrator reports the question as not finalized"
            );
            StepResult::Skip(SkipReason::NotFinalized)
          }
          Err(e) => self.retry(&e),
        }
      }
      CandidateStep::CheckAlreadyResolved => {
        match timed(limit, self.gateway.check_resolved(condition_id)).await {
          Ok(true) => StepResult::Continue(CandidateStep::GetHistoryHash),
          Ok(false) => StepResult::Continue(CandidateStep::BuildResolveTx),
          Err(e) => self.retry(&e),
        }
      }
      CandidateStep::BuildResolveTx => {
        let call = self.gateway.build_resolve_tx(
          question_id,
          market.template_id,
          &market.question.data,
          market.condition.outcome_slot_count,
        );
        match timed(limit, call).await {
          Ok(data) => {
            task.batches.push(MultisendBatch::call(self.contracts.realitio_proxy, data));
            StepResult::Continue(CandidateStep::GetHistoryHash)
          }
          Err(e) => self.retry(&e),
        }
      }
      CandidateStep::GetHistoryHash => {
        match timed(limit, self.gateway.get_history_hash(question_id)).await {
          Ok(hash) if hash == B256::ZERO || ledger.is_claimed(&condition_id) => {
            StepResult::Continue(CandidateStep::BuildRedeemTx)
          }
          Ok(_) => StepResult::Continue(CandidateStep::ScanClaimParams),
          Err(e) => self.retry(&e),
        }
      }
      CandidateStep::ScanClaimParams => {
        ledger.focus_claim_scan(question_id);
        let scanner = EventScanner::new(&self.gateway, &self.config);
        match scanner.scan(ledger, &ScanTarget::Answers { question_id }).await {
          Ok(report) => task.scan_retries += report.retries,
          Err(e) => {
            task.scan_retries += e.retries();
            return StepResult::Abort(e);
          }
        }
        match build_claim_params(&ledger.answered) {
          Ok(params) => {
            task.claim_params = Some(params);
            StepResult::Continue(CandidateStep::SimulateClaim)
          }
          Err(e) => {
            warn!(question_id = %question_id, error = %e, "Malformed answer history");
            StepResult::Skip(SkipReason::MalformedAnswers(e))
          }
        }
      }
      CandidateStep::SimulateClaim => {
        let Some(params) = task.claim_params.as_ref() else {
          return StepResult::Continue(CandidateStep::ScanClaimParams);
        };
        let call = self
          .gateway
          .simulate_claim_winnings(question_id, params, self.safe_address);
        match timed(limit, call).await {
          Ok(true) => StepResult::Continue(CandidateStep::BuildClaimTx),
          Ok(false) => {
            info!(question_id = %question_id, "Claim simulation failed, not claiming");
            StepResult::Continue(CandidateStep::BuildRedeemTx)
          }
          Err(e) => self.retry(&e),
        }
      }
      CandidateStep::BuildClaimTx => {
        let Some(params) = task.claim_params.as_ref() else {
          return StepResult::Continue(CandidateStep::ScanClaimParams);
        };
        match timed(limit, self.gateway.build_claim_winnings(question_id, params)).await {
          Ok(data) => {
            task.batches.push(MultisendBatch::call(self.contracts.realitio, data));
            StepResult::Continue(CandidateStep::BuildRedeemTx)
          }
          Err(e) => self.retry(&e),
        }
      }
      CandidateStep::BuildRedeemTx => {
        let index_sets = market.condition.index_sets();
        let call = self.gateway.build_redeem_positions_tx(
          market.collateral_token,
          ZERO_COLLECTION,
          condition_id,
          &index_sets,
        );
        match timed(limit, call).await {
          Ok(data) => {
            task.batches.push(MultisendBatch::call(self.contracts.conditional_tokens, data));
            StepResult::Continue(CandidateStep::Done)
          }
          Err(e) => self.retry(&e),
        }
      }
      CandidateStep::Done => StepResult::Continue(CandidateStep::Done),
    }
  }
}

/// How the replicas closed a round that proposed a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundVerdict {
  /// The agreed redemption transaction was confirmed on-chain.
  Settled(RedeemPayload),
  /// The agreed outcome differs from this replica's batch.
  Rejected,
}

/// Produces the ledger for the next round and adopts the agreed policy.
///
/// On settlement the agreed payload replaces the local policy, redeemed
/// set and payout total, and contributes attributions this replica has
/// not seen. On rejection only claim bookkeeping carries over.
pub fn conclude_round(
  ledger: RedemptionLedger,
  policy: &mut EGreedyPolicy,
  verdict: &RoundVerdict,
) -> anyhow::Result<RedemptionLedger> {
  let RoundVerdict::Settled(payload) = verdict else {
    info!(
      claiming = ledger.claiming_condition_ids.len(),
      "Round rejected, keeping claim bookkeeping only"
    );
    return Ok(ledger.rejected());
  };

  if let Some(raw) = payload.policy.as_deref() {
    *policy = EGreedyPolicy::from_json(raw).context("Failed to decode agreed policy")?;
  }
  let mut next = ledger.settled();
  if let Some(raw) = payload.utilized_tools.as_deref() {
    let agreed = decode_utilized_tools(raw).context("Failed to decode agreed utilized tools")?;
    for (tx_hash, tool) in agreed {
      next.utilized_tools.entry(tx_hash).or_insert(tool);
    }
  }
  if let Some(redeemed) = &payload.redeemed_condition_ids {
    next.redeemed_condition_ids.clone_from(redeemed);
  }
  if let Some(payout) = payload.payout_so_far {
    next.adopt_payout(payout);
  }

  info!(
    claimed = next.claimed_condition_ids.len(),
    redeemed = next.redeemed_condition_ids.len(),
    payout_so_far = %next.payout_so_far,
    "Round settled"
  );
  Ok(next)
}
