//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the domain/usecases layer
//! requires from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `LedgerGateway`: contract reads, event filtering and tx builders
//! - `StateRepository`: ledger, policy and tool attribution persistence

pub mod gateway;
pub mod repository;
