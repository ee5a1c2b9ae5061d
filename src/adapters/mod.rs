//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies. Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `metrics`: Prometheus round and policy metrics
//! - `persistence`: atomic JSON documents for the ledger, policy and
//!   tool attribution
//!
//! The chain/subgraph gateway is supplied by the host service through
//! the `LedgerGateway` port.

pub mod metrics;
pub mod persistence;
