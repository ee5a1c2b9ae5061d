//! Prometheus Metrics Registry - Redemption Observability
//!
//! Records what each round decided and how the tool policy evolves.
//! Metrics follow the naming convention `redeemer_*`; the text exposition
//! is available through `encode` for whichever surface scrapes it.

use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use rust_decimal::prelude::ToPrimitive;

use crate::domain::policy::EGreedyPolicy;
use crate::usecases::settlement::{RoundOutcome, RoundReport};

/// Centralized Prometheus metrics for the redeemer.
pub struct RedemptionMetrics {
    registry: Registry,
    /// Rounds by outcome (redeem, no_redeeming, scan_aborted).
    pub rounds: IntCounterVec,
    /// Candidates left out of a batch, by reason.
    pub skipped_positions: IntCounterVec,
    /// Positions included in redemption batches.
    pub redeemed_positions: IntCounterVec,
    /// Failed event filtering windows.
    pub scan_retries: IntCounter,
    /// Current event filtering window in blocks.
    pub filtering_batch_size: IntGauge,
    /// Collateral expected from the last prepared batch.
    pub expected_winnings: Gauge,
    /// Weighted accuracy per tool.
    pub tool_accuracy: GaugeVec,
    /// Whether a tool is quarantined (1 = yes).
    pub tool_quarantined: GaugeVec,
}

impl RedemptionMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let rounds = IntCounterVec::new(
            Opts::new("redeemer_rounds_total", "Redemption rounds by outcome"),
            &["outcome"],
        )?;

        let skipped_positions = IntCounterVec::new(
            Opts::new(
                "redeemer_skipped_positions_total",
                "Positions not redeemed in a round, by reason",
            ),
            &["reason"],
        )?;

        let redeemed_positions = IntCounterVec::new(
            Opts::new(
                "redeemer_batched_positions_total",
                "Positions included in a redemption batch",
            ),
            &["agent"],
        )?;

        let scan_retries = IntCounter::new(
            "redeemer_scan_retries_total",
            "Event filtering windows that failed and were retried",
        )?;

        let filtering_batch_size = IntGauge::new(
            "redeemer_event_filtering_batch_size",
            "Current event filtering window in blocks",
        )?;

        let expected_winnings = Gauge::new(
            "redeemer_expected_winnings",
            "Collateral expected from the last redemption batch",
        )?;

        let tool_accuracy = GaugeVec::new(
            Opts::new("redeemer_tool_weighted_accuracy", "Weighted accuracy per tool"),
            &["tool"],
        )?;

        let tool_quarantined = GaugeVec::new(
            Opts::new(
                "redeemer_tool_quarantined",
                "Whether the tool is quarantined (1=yes, 0=no)",
            ),
            &["tool"],
        )?;

        registry.register(Box::new(rounds.clone()))?;
        registry.register(Box::new(skipped_positions.clone()))?;
        registry.register(Box::new(redeemed_positions.clone()))?;
        registry.register(Box::new(scan_retries.clone()))?;
        registry.register(Box::new(filtering_batch_size.clone()))?;
        registry.register(Box::new(expected_winnings.clone()))?;
        registry.register(Box::new(tool_accuracy.clone()))?;
        registry.register(Box::new(tool_quarantined.clone()))?;

        Ok(Self {
            registry,
            rounds,
            skipped_positions,
            redeemed_positions,
            scan_retries,
            filtering_batch_size,
            expected_winnings,
            tool_accuracy,
            tool_quarantined,
        })
    }

    pub fn record_round(&self, agent: &str, report: &RoundReport) {
        self.rounds.with_label_values(&[report.outcome.label()]).inc();
        for (_, reason) in &report.skipped {
            self.skipped_positions
                .with_label_values(&[reason.label()])
                .inc();
        }
        self.scan_retries.inc_by(u64::from(report.scan_retries));
        self.filtering_batch_size
            .set(i64::try_from(report.batch_size).unwrap_or(i64::MAX));

        if let RoundOutcome::Redeem(plan) = &report.outcome {
            self.redeemed_positions
                .with_label_values(&[agent])
                .inc_by(plan.condition_ids.len() as u64);
            self.expected_winnings
                .set(plan.expected_winnings.to_f64().unwrap_or_default());
        }
    }

    pub fn record_policy(&self, policy: &EGreedyPolicy, now: i64) {
        for tool in policy.tools() {
            let accuracy = policy.weighted_accuracy.get(tool).copied().unwrap_or_default();
            self.tool_accuracy.with_label_values(&[tool]).set(accuracy);
            let quarantined = if policy.is_quarantined(tool, now) { 1.0 } else { 0.0 };
            self.tool_quarantined.with_label_values(&[tool]).set(quarantined);
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
