//! Prediction Redeemer - Library Root
//!
//! Redemption settlement engine and tool-selection policy for an
//! on-chain prediction market trader. Re-exports all modules for
//! integration tests and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
