//! Typed contract layer for the flux aggregator monitor.
//!
//! This module turns a deployed FluxAggregator address into a typed handle. It
//! issues read-only calls through an RPC call service and decodes the results
//! into round records, and it classifies the contract's raw logs into decoded
//! event records for application listeners.
//!
//! ## Layers
//!
//! - [`codec`]: the JSON ABI used to encode calls and decode their results
//! - [`contract`]: the call gateway bound to one contract address
//! - [`registry`]: topic hash to event kind mapping, validated against the ABI
//! - [`listener`]: the log classification and decoding pipeline
//! - [`aggregator`]: the named queries and the subscription entry point

use std::fmt;
use thiserror::Error;

pub mod abi;
pub mod aggregator;
pub mod codec;
pub mod contract;
pub mod listener;
pub mod registry;
pub mod rpc;

pub use aggregator::{FluxAggregator, FLUX_AGGREGATOR_NAME};
pub use codec::ContractCodec;
pub use contract::ConnectedContract;
pub use listener::{DecodingLogListener, FluxEventListener, PipelineCounts, PipelineStats};
pub use registry::EventTopicRegistry;
pub use rpc::{AlloyCallService, CallService, CallServiceError};

pub use alloy_dyn_abi::DynSolValue;
pub use flux_logs::Subscription;

/// Errors that prevent a contract handle from being built.
///
/// These indicate a mismatch between the compiled-in event definitions and the
/// ABI the handle was built from, which is a deployment or programming error
/// rather than a runtime condition.
#[derive(Debug, Error)]
pub enum ConstructionError {
	/// The ABI document could not be parsed.
	#[error("Invalid {contract} ABI: {reason}")]
	InvalidAbi { contract: String, reason: String },
	/// An expected event is not declared in the ABI.
	#[error("Event {event} not found in {contract} ABI")]
	MissingEvent { contract: String, event: String },
	/// The ABI declares the event with a different signature.
	#[error("Event {event} in {contract} ABI has topic {found}, expected {expected}")]
	TopicMismatch {
		contract: String,
		event: String,
		expected: alloy_primitives::B256,
		found: alloy_primitives::B256,
	},
}

/// Errors raised by the call gateway. Every variant names the method called.
#[derive(Debug, Error)]
pub enum CallError {
	/// Arguments could not be encoded; nothing was sent to the chain.
	#[error("Unable to encode call to {method}: {reason}")]
	Encoding { method: String, reason: String },
	/// The RPC call itself failed.
	#[error("Remote invocation of {method} failed: {reason}")]
	RemoteInvocation { method: String, reason: String },
	/// The call returned data that does not match the declared outputs.
	#[error("Unable to decode result of {method}: {reason}")]
	Decoding { method: String, reason: String },
}

impl CallError {
	/// Returns true when the failure happened before any network activity.
	pub fn is_encoding(&self) -> bool {
		matches!(self, CallError::Encoding { .. })
	}
}

/// A failed named query.
///
/// The message names the logical operation and, where one exists, an
/// operator-facing hint about the likely cause, followed by the underlying
/// gateway error.
#[derive(Debug)]
pub struct QueryError {
	/// Logical operation that was attempted, e.g. `oracleRoundState`.
	pub operation: &'static str,
	/// Likely cause worth surfacing to operators.
	pub hint: Option<&'static str>,
	pub source: CallError,
}

impl QueryError {
	pub(crate) fn new(operation: &'static str, source: CallError) -> Self {
		Self {
			operation,
			hint: None,
			source,
		}
	}

	pub(crate) fn with_hint(mut self, hint: &'static str) -> Self {
		self.hint = Some(hint);
		self
	}
}

impl fmt::Display for QueryError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} query failed", self.operation)?;
		if let Some(hint) = self.hint {
			write!(f, " - {}", hint)?;
		}
		write!(f, ": {}", self.source)
	}
}

impl std::error::Error for QueryError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(&self.source)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_query_error_message_names_operation_and_cause() {
		let err = QueryError::new(
			"getOracles",
			CallError::RemoteInvocation {
				method: "getOracles".into(),
				reason: "connection refused".into(),
			},
		);
		assert_eq!(
			err.to_string(),
			"getOracles query failed: Remote invocation of getOracles failed: connection refused"
		);
	}

	#[test]
	fn test_query_error_message_includes_hint() {
		let err = QueryError::new(
			"latestRoundData",
			CallError::Decoding {
				method: "latestRoundData".into(),
				reason: "buffer overrun".into(),
			},
		)
		.with_hint("contract may have 0 rounds");

		let message = err.to_string();
		assert!(message.starts_with("latestRoundData query failed - contract may have 0 rounds: "));
		assert!(message.contains("buffer overrun"));
		assert!(std::error::Error::source(&err).is_some());
	}
}
