//! Metrics Adapters
//!
//! Prometheus counters and gauges for redemption rounds and the tool
//! selection policy.

pub mod prometheus;

pub use prometheus::RedemptionMetrics;
