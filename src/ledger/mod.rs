//! Run ledger for the Mud Density Aggregator.
//!
//! Keeps cumulative counts of how each invocation ended so that empty
//! windows, skipped windows and failures stay distinguishable after the fact.

pub mod log;

// Re-export commonly used types
pub use log::{LedgerStats, RunLedger};
