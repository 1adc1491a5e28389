//! Common types module for the flux aggregator monitor.
//!
//! This module defines the typed records produced by the contract layer: the
//! round snapshots returned by read-only queries and the decoded event records
//! delivered to log listeners. Keeping them in one crate lets the contract,
//! log and service crates agree on a single payload contract.

/// Decoded contract event records and their classification.
pub mod events;
/// Round snapshot records returned by contract queries.
pub mod round;

// Re-export all types for convenient access
pub use events::*;
pub use round::*;

pub use alloy_primitives::{Address, B256, I256, U256};
pub use alloy_rpc_types::Log;
