//! Decoded event records for the flux aggregator contract.
//!
//! Every record keeps the raw RPC log it was decoded from so that block and
//! transaction provenance travels with the event untouched. Records are created
//! fresh per log and moved to the listener that receives them.

use alloy_primitives::{Address, I256, U256};
use alloy_rpc_types::Log;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of aggregator events this layer knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FluxEventKind {
	NewRound,
	AnswerUpdated,
}

impl FluxEventKind {
	/// All known event kinds.
	pub const ALL: [FluxEventKind; 2] = [FluxEventKind::NewRound, FluxEventKind::AnswerUpdated];

	/// Event name as declared in the contract ABI.
	pub fn name(&self) -> &'static str {
		match self {
			FluxEventKind::NewRound => "NewRound",
			FluxEventKind::AnswerUpdated => "AnswerUpdated",
		}
	}
}

impl fmt::Display for FluxEventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A new reporting round was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogNewRound {
	/// Raw log the event was decoded from.
	pub log: Log,
	pub round_id: U256,
	pub started_by: Address,
	/// Seconds since the unix epoch.
	pub started_at: U256,
}

/// The aggregated answer changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAnswerUpdated {
	/// Raw log the event was decoded from.
	pub log: Log,
	pub current: I256,
	pub round_id: U256,
	pub updated_at: U256,
}

/// A recognized, fully decoded aggregator event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FluxAggregatorEvent {
	NewRound(LogNewRound),
	AnswerUpdated(LogAnswerUpdated),
}

impl FluxAggregatorEvent {
	pub fn kind(&self) -> FluxEventKind {
		match self {
			FluxAggregatorEvent::NewRound(_) => FluxEventKind::NewRound,
			FluxAggregatorEvent::AnswerUpdated(_) => FluxEventKind::AnswerUpdated,
		}
	}

	/// Raw log the event was decoded from.
	pub fn log(&self) -> &Log {
		match self {
			FluxAggregatorEvent::NewRound(event) => &event.log,
			FluxAggregatorEvent::AnswerUpdated(event) => &event.log,
		}
	}

	/// Round the event refers to.
	///
	/// Logs and query results carry no ordering relative to each other, so
	/// consumers should reconcile them by round rather than by arrival time.
	pub fn round_id(&self) -> U256 {
		match self {
			FluxAggregatorEvent::NewRound(event) => event.round_id,
			FluxAggregatorEvent::AnswerUpdated(event) => event.round_id,
		}
	}
}
