//! Epsilon-greedy tool selection.
//!
//! Tracks per-tool accuracy over resolved markets, explores uniformly with
//! probability `eps`, and otherwise exploits the best weighted accuracy
//! among tools that are not quarantined for repeated failures. Every
//! branch is driven by the caller's randomness seed and synced clock, so
//! replicas given the same inputs pick the same tool.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize};

use super::error::PolicyError;

/// Weight of the settled-volume term relative to raw accuracy.
pub const VOLUME_FACTOR: f64 = 0.25;

/// Raw score range mapped onto `[0, 1]`.
const SCORE_RANGE: (f64, f64) = (-0.5, 80.5);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccuracyInfo {
    /// Responses evaluated against a resolved market.
    pub requests: u64,
    /// Responses still waiting for their market to resolve.
    pub pending: i64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsecutiveFailures {
    pub n_failures: u32,
    /// Time of the last response, success or failure.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EGreedyPolicy {
    #[serde(deserialize_with = "de_eps")]
    pub eps: f64,
    pub consecutive_failures_threshold: u32,
    pub quarantine_duration: i64,
    pub accuracy_store: BTreeMap<String, AccuracyInfo>,
    pub weighted_accuracy: BTreeMap<String, f64>,
    pub consecutive_failures: BTreeMap<String, ConsecutiveFailures>,
    pub updated_ts: i64,
}

/// Applies the same range check as `EGreedyPolicy::new` to stored policies.
fn de_eps<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let eps = f64::deserialize(deserializer)?;
    if (0.0..=1.0).contains(&eps) {
        Ok(eps)
    } else {
        Err(serde::de::Error::custom(PolicyError::InvalidEpsilon(eps)))
    }
}

fn minmax_scale(value: f64, from: (f64, f64), to: (f64, f64)) -> f64 {
    (value - from.0) / (from.1 - from.0) * (to.1 - to.0) + to.0
}

/// Accuracy with a bonus for settled volume.
fn weigh(info: &AccuracyInfo, total_requests: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let volume = if total_requests == 0 {
        0.0
    } else {
        (info.requests as f64 - info.pending as f64) / total_requests as f64
    };
    minmax_scale(info.accuracy + volume * VOLUME_FACTOR, SCORE_RANGE, (0.0, 1.0))
}

impl EGreedyPolicy {
    pub fn new(
        eps: f64,
        consecutive_failures_threshold: u32,
        quarantine_duration: i64,
    ) -> Result<Self, PolicyError> {
        if !(0.0..=1.0).contains(&eps) {
            return Err(PolicyError::InvalidEpsilon(eps));
        }
        Ok(Self {
            eps,
            consecutive_failures_threshold,
            quarantine_duration,
            accuracy_store: BTreeMap::new(),
            weighted_accuracy: BTreeMap::new(),
            consecutive_failures: BTreeMap::new(),
            updated_ts: 0,
        })
    }

    /// Adds tools that are not tracked yet. Known tools keep their stats.
    pub fn register_tools<'a>(&mut self, tools: impl IntoIterator<Item = &'a str>) {
        for tool in tools {
            self.accuracy_store.entry(tool.to_string()).or_default();
        }
        self.update_weighted_accuracy();
    }

    pub fn tools(&self) -> Vec<&str> {
        self.accuracy_store.keys().map(String::as_str).collect()
    }

    pub fn n_tools(&self) -> usize {
        self.accuracy_store.len()
    }

    pub fn n_requests(&self) -> u64 {
        self.accuracy_store.values().map(|info| info.requests).sum()
    }

    /// Whether any outcome has ever been recorded.
    pub fn has_updated(&self) -> bool {
        self.n_requests() > 0
    }

    pub fn update_weighted_accuracy(&mut self) {
        let total = self.n_requests();
        self.weighted_accuracy = self
            .accuracy_store
            .iter()
            .map(|(tool, info)| (tool.clone(), weigh(info, total)))
            .collect();
    }

    pub fn is_quarantined(&self, tool: &str, now: i64) -> bool {
        self.consecutive_failures.get(tool).is_some_and(|failures| {
            failures.n_failures > self.consecutive_failures_threshold
                && failures.timestamp.saturating_add(self.quarantine_duration) > now
        })
    }

    /// Highest weighted accuracy among non-quarantined tools, or among all
    /// tools when every one of them is quarantined. Ties go to the first
    /// tool in name order.
    pub fn best_tool(&self, now: i64) -> Option<&str> {
        let available: Vec<&str> = self
            .tools()
            .into_iter()
            .filter(|tool| !self.is_quarantined(tool, now))
            .collect();
        let pool = if available.is_empty() { self.tools() } else { available };

        let mut best: Option<(&str, f64)> = None;
        for tool in pool {
            let score = self.weighted_accuracy.get(tool).copied().unwrap_or(0.0);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((tool, score));
            }
        }
        best.map(|(tool, _)| tool)
    }

    /// Picks the tool for the next prediction.
    ///
    /// Exploration draws from every tool, quarantined or not, so a tool can
    /// earn its way back. Returns `None` only when no tool is registered.
    pub fn select_tool(&self, randomness: u64, now: i64) -> Option<&str> {
        if self.accuracy_store.is_empty() {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(randomness);
        let draw: f64 = rng.r#gen();
        if !self.has_updated() || draw < self.eps {
            let index = rng.gen_range(0..self.accuracy_store.len());
            return self.accuracy_store.keys().nth(index).map(String::as_str);
        }

        self.best_tool(now)
    }

    /// A request was sent to `tool`; its outcome is not known yet.
    pub fn record_use(&mut self, tool: &str) {
        self.accuracy_store.entry(tool.to_string()).or_default().pending += 1;
        self.update_weighted_accuracy();
    }

    /// The tool answered (or failed to). Independent of market outcomes.
    pub fn record_response(&mut self, tool: &str, timestamp: i64, failed: bool) {
        let failures = self.consecutive_failures.entry(tool.to_string()).or_default();
        failures.n_failures = if failed { failures.n_failures + 1 } else { 0 };
        failures.timestamp = timestamp;
        self.updated_ts = self.updated_ts.max(timestamp);
    }

    /// The market a tool predicted on has resolved.
    ///
    /// Returns `false`, leaving the policy untouched, when the tool is not
    /// tracked (attribution from an older run).
    pub fn record_outcome(&mut self, tool: &str, winning: bool) -> bool {
        let Some(info) = self.accuracy_store.get_mut(tool) else {
            return false;
        };
        #[allow(clippy::cast_precision_loss)]
        let requests = info.requests as f64;
        let hit = if winning { 1.0 } else { 0.0 };
        info.accuracy = (info.accuracy * requests + hit) / (requests + 1.0);
        info.requests += 1;
        info.pending -= 1;
        self.update_weighted_accuracy();
        true
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn stats_report(&self, now: i64) -> String {
        if !self.has_updated() {
            return "No policy statistics available.".to_string();
        }

        let mut report = String::from("Policy statistics so far (only for resolved markets):\n");
        for (tool, info) in &self.accuracy_store {
            let weighted = self.weighted_accuracy.get(tool).copied().unwrap_or(0.0);
            let _ = writeln!(
                report,
                "{tool} tool:\n\tTimes used: {}\n\tAccuracy: {:.4}\n\tWeighted accuracy: {weighted:.6}{}",
                info.requests,
                info.accuracy,
                if self.is_quarantined(tool, now) { "\n\tQuarantined" } else { "" },
            );
        }
        if let Some(best) = self.best_tool(now) {
            let _ = write!(report, "Best tool so far is {best:?}.");
        }
        report
    }
}
