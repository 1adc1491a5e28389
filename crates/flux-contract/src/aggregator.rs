//! Typed query surface for the FluxAggregator contract.

use crate::{
	CallError, CallService, ConnectedContract, ConstructionError, ContractCodec,
	DecodingLogListener, EventTopicRegistry, FluxEventListener, PipelineCounts, PipelineStats,
	QueryError,
};
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, I256, U256};
use flux_logs::{LogBroadcaster, Subscription};
use flux_types::{RoundData, RoundState};
use std::sync::Arc;

/// Name of the aggregator contract type.
pub const FLUX_AGGREGATOR_NAME: &str = "FluxAggregator";

const ORACLE_ROUND_STATE: &str = "oracleRoundState";
const GET_ORACLES: &str = "getOracles";
const LATEST_ROUND_DATA: &str = "latestRoundData";

/// Typed handle to a deployed FluxAggregator.
///
/// Queries may be issued concurrently from any number of tasks; the handle
/// holds no mutable state besides the log pipeline counters.
#[derive(Debug, Clone)]
pub struct FluxAggregator {
	contract: ConnectedContract,
	registry: Arc<EventTopicRegistry>,
	stats: Arc<PipelineStats>,
}

impl FluxAggregator {
	/// Builds a handle using the compiled-in FluxAggregator ABI.
	pub fn new(
		address: Address,
		call_service: Arc<dyn CallService>,
		broadcaster: Arc<dyn LogBroadcaster>,
	) -> Result<Self, ConstructionError> {
		Self::with_codec(
			ContractCodec::flux_aggregator()?,
			address,
			call_service,
			broadcaster,
		)
	}

	/// Builds a handle from an explicit codec.
	///
	/// Fails when the codec does not declare the events this handle decodes.
	pub fn with_codec(
		codec: ContractCodec,
		address: Address,
		call_service: Arc<dyn CallService>,
		broadcaster: Arc<dyn LogBroadcaster>,
	) -> Result<Self, ConstructionError> {
		let registry = Arc::new(EventTopicRegistry::new(&codec)?);
		let contract = ConnectedContract::new(Arc::new(codec), address, call_service, broadcaster);

		Ok(Self {
			contract,
			registry,
			stats: Arc::new(PipelineStats::default()),
		})
	}

	pub fn address(&self) -> Address {
		self.contract.address()
	}

	/// The underlying call gateway.
	pub fn contract(&self) -> &ConnectedContract {
		&self.contract
	}

	/// Subscribes `listener` to the decoded events of this contract.
	///
	/// Returns whether the log stream is currently attached, plus the handle
	/// that ends the subscription.
	pub fn subscribe_to_logs(&self, listener: Arc<dyn FluxEventListener>) -> (bool, Subscription) {
		let decoder = DecodingLogListener::new(self.registry.clone(), listener, self.stats.clone());
		let (connected, subscription) = self.contract.subscribe_to_logs(Arc::new(decoder));
		if !connected {
			tracing::warn!(
				contract = %self.address(),
				"Log stream not connected, no events until resubscription"
			);
		}
		(connected, subscription)
	}

	/// Counters across every subscription made through this handle.
	pub fn log_stats(&self) -> PipelineCounts {
		self.stats.snapshot()
	}

	/// Queries `oracle`'s standing for `round_id`.
	pub async fn round_state(&self, oracle: Address, round_id: u32) -> Result<RoundState, QueryError> {
		let args = [
			DynSolValue::Address(oracle),
			DynSolValue::Uint(U256::from(round_id), 32),
		];
		self.contract
			.call(ORACLE_ROUND_STATE, &args)
			.await
			.and_then(|outputs| round_state_from_outputs(&outputs))
			.map_err(|e| QueryError::new(ORACLE_ROUND_STATE, e))
	}

	/// Lists the oracles enabled on the aggregator. Empty when there are none.
	pub async fn get_oracles(&self) -> Result<Vec<Address>, QueryError> {
		self.contract
			.call(GET_ORACLES, &[])
			.await
			.and_then(|outputs| oracles_from_outputs(&outputs))
			.map_err(|e| QueryError::new(GET_ORACLES, e))
	}

	/// Queries the most recent completed round.
	///
	/// The contract reverts when no round has completed yet, so a failure here
	/// commonly means the aggregator has zero rounds.
	pub async fn latest_round_data(&self) -> Result<RoundData, QueryError> {
		self.contract
			.call(LATEST_ROUND_DATA, &[])
			.await
			.and_then(|outputs| round_data_from_outputs(&outputs))
			.map_err(|e| {
				QueryError::new(LATEST_ROUND_DATA, e).with_hint("contract may have 0 rounds")
			})
	}
}

/// Reads a typed output field, naming the method and index on mismatch.
struct Outputs<'a> {
	method: &'static str,
	values: &'a [DynSolValue],
}

impl<'a> Outputs<'a> {
	fn new(method: &'static str, values: &'a [DynSolValue], expected: usize) -> Result<Self, CallError> {
		if values.len() != expected {
			return Err(Self::mismatch(
				method,
				format!("expected {} outputs, got {}", expected, values.len()),
			));
		}
		Ok(Self { method, values })
	}

	fn mismatch(method: &str, reason: String) -> CallError {
		CallError::Decoding {
			method: method.to_string(),
			reason,
		}
	}

	fn uint(&self, index: usize) -> Result<U256, CallError> {
		self.values[index]
			.as_uint()
			.map(|(value, _)| value)
			.ok_or_else(|| Self::mismatch(self.method, format!("output {} is not a uint", index)))
	}

	fn small_uint<T: TryFrom<U256>>(&self, index: usize) -> Result<T, CallError> {
		let value = self.uint(index)?;
		T::try_from(value).map_err(|_| {
			Self::mismatch(self.method, format!("output {} out of range: {}", index, value))
		})
	}

	fn int(&self, index: usize) -> Result<I256, CallError> {
		self.values[index]
			.as_int()
			.map(|(value, _)| value)
			.ok_or_else(|| Self::mismatch(self.method, format!("output {} is not an int", index)))
	}

	fn bool(&self, index: usize) -> Result<bool, CallError> {
		self.values[index]
			.as_bool()
			.ok_or_else(|| Self::mismatch(self.method, format!("output {} is not a bool", index)))
	}

	fn addresses(&self, index: usize) -> Result<Vec<Address>, CallError> {
		let items = self.values[index].as_array().ok_or_else(|| {
			Self::mismatch(self.method, format!("output {} is not an array", index))
		})?;
		items
			.iter()
			.map(|item| {
				item.as_address().ok_or_else(|| {
					Self::mismatch(self.method, format!("output {} holds a non-address", index))
				})
			})
			.collect()
	}
}

fn round_state_from_outputs(values: &[DynSolValue]) -> Result<RoundState, CallError> {
	let outputs = Outputs::new(ORACLE_ROUND_STATE, values, 8)?;

	Ok(RoundState {
		eligible_to_submit: outputs.bool(0)?,
		reportable_round_id: outputs.small_uint(1)?,
		latest_submission: Some(outputs.int(2)?),
		started_at: outputs.small_uint(3)?,
		timeout: outputs.small_uint(4)?,
		available_funds: Some(outputs.uint(5)?),
		oracle_count: outputs.small_uint(6)?,
		payment_amount: Some(outputs.uint(7)?),
	})
}

fn oracles_from_outputs(values: &[DynSolValue]) -> Result<Vec<Address>, CallError> {
	Outputs::new(GET_ORACLES, values, 1)?.addresses(0)
}

fn round_data_from_outputs(values: &[DynSolValue]) -> Result<RoundData, CallError> {
	let outputs = Outputs::new(LATEST_ROUND_DATA, values, 5)?;

	Ok(RoundData {
		round_id: outputs.uint(0)?,
		answer: outputs.int(1)?,
		started_at: outputs.uint(2)?,
		updated_at: outputs.uint(3)?,
		answered_in_round: outputs.uint(4)?,
	})
}
