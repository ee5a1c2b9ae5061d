//! Persistence Adapters - JSON File Storage
//!
//! Implements the `StateRepository` port with atomic JSON documents in
//! the data directory: `ledger.json`, `policy.json` and
//! `utilized_tools.json`. No database dependency.

pub mod repository_impl;
pub mod state;
pub mod tools;

pub use repository_impl::RepositoryImpl;
pub use state::StateStore;
pub use tools::ToolsStore;
