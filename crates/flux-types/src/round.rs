//! Round snapshot records returned by the aggregator queries.

use alloy_primitives::{I256, U256};
use serde::{Deserialize, Serialize};

/// One oracle's standing in the current or requested reporting round.
///
/// This is a read-only projection of on-chain state at call time, as returned
/// by `oracleRoundState`. It carries no lifecycle beyond the call that produced
/// it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundState {
	/// Round the oracle may report on next.
	#[serde(rename = "reportableRoundID")]
	pub reportable_round_id: u32,
	/// Whether the oracle is allowed to submit into the reportable round.
	pub eligible_to_submit: bool,
	/// Latest value submitted by the oracle, absent when it never submitted.
	#[serde(rename = "latestAnswer", skip_serializing_if = "Option::is_none")]
	pub latest_submission: Option<I256>,
	/// Round timeout in seconds.
	pub timeout: u64,
	/// Round start, in seconds since the unix epoch.
	pub started_at: u64,
	/// Funds available to pay oracles.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub available_funds: Option<U256>,
	/// Payment per submission.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub payment_amount: Option<U256>,
	/// Number of oracles currently enabled on the aggregator.
	pub oracle_count: u8,
}

impl RoundState {
	/// Returns the absolute time, in seconds since the unix epoch, at which the
	/// round times out.
	///
	/// The sum saturates at `u64::MAX` so that a huge timeout never wraps into
	/// a timestamp in the past.
	pub fn times_out_at(&self) -> u64 {
		self.started_at.saturating_add(self.timeout)
	}
}

/// The most recent completed round, as returned by `latestRoundData`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundData {
	pub round_id: U256,
	pub answer: I256,
	pub started_at: U256,
	pub updated_at: U256,
	pub answered_in_round: U256,
}
