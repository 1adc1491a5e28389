//! ABI codec for contract calls.
//!
//! Wraps a JSON ABI document and encodes call arguments / decodes return data
//! against the declared parameter types of each method.

use crate::{CallError, ConstructionError};
use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::{Function, JsonAbi};
use alloy_primitives::{Bytes, B256};

/// ABI of the FluxAggregator contract.
const FLUX_AGGREGATOR_ABI: &str = include_str!("../abi/FluxAggregator.json");

/// ABI codec bound to one contract type.
#[derive(Debug, Clone)]
pub struct ContractCodec {
	/// Contract type name, used in error messages.
	name: String,
	abi: JsonAbi,
}

impl ContractCodec {
	/// Parses a JSON ABI document for the contract type `name`.
	pub fn from_json(name: &str, json: &str) -> Result<Self, ConstructionError> {
		let abi: JsonAbi =
			serde_json::from_str(json).map_err(|e| ConstructionError::InvalidAbi {
				contract: name.to_string(),
				reason: e.to_string(),
			})?;

		Ok(Self {
			name: name.to_string(),
			abi,
		})
	}

	/// Codec for the compiled-in FluxAggregator ABI.
	pub fn flux_aggregator() -> Result<Self, ConstructionError> {
		Self::from_json(crate::FLUX_AGGREGATOR_NAME, FLUX_AGGREGATOR_ABI)
	}

	/// Contract type name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// ABI entry of `method`. Returns the first overload.
	pub fn function(&self, method: &str) -> Option<&Function> {
		self.resolve(method, None)
	}

	/// Looks up `method`, preferring the overload whose arity matches `arity`.
	fn resolve(&self, method: &str, arity: Option<usize>) -> Option<&Function> {
		let overloads = self.abi.function(method)?;
		arity
			.and_then(|n| overloads.iter().find(|f| f.inputs.len() == n))
			.or_else(|| overloads.first())
	}

	/// Encodes a call to `method` with `args`, selector included.
	pub fn encode_args(&self, method: &str, args: &[DynSolValue]) -> Result<Bytes, CallError> {
		let function = self
			.resolve(method, Some(args.len()))
			.ok_or_else(|| CallError::Encoding {
				method: method.to_string(),
				reason: format!("method not found in {} ABI", self.name),
			})?;

		function
			.abi_encode_input(args)
			.map(Bytes::from)
			.map_err(|e| CallError::Encoding {
				method: method.to_string(),
				reason: e.to_string(),
			})
	}

	/// Decodes the return data of `method` into its declared outputs.
	pub fn decode_result(&self, method: &str, data: &[u8]) -> Result<Vec<DynSolValue>, CallError> {
		let function = self
			.resolve(method, None)
			.ok_or_else(|| CallError::Decoding {
				method: method.to_string(),
				reason: format!("method not found in {} ABI", self.name),
			})?;

		if data.is_empty() && !function.outputs.is_empty() {
			return Err(CallError::Decoding {
				method: method.to_string(),
				reason: "empty return data".to_string(),
			});
		}

		function
			.abi_decode_output(data, true)
			.map_err(|e| CallError::Decoding {
				method: method.to_string(),
				reason: e.to_string(),
			})
	}

	/// Topic hash of the event `event` as declared in the ABI.
	///
	/// A missing event is a construction error: the handle cannot operate
	/// against an ABI that does not know the events it is expected to decode.
	pub fn event_topic(&self, event: &str) -> Result<B256, ConstructionError> {
		self.abi
			.event(event)
			.and_then(|events| events.first())
			.map(|e| e.selector())
			.ok_or_else(|| ConstructionError::MissingEvent {
				contract: self.name.clone(),
				event: event.to_string(),
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, U256};

	#[test]
	fn test_flux_aggregator_abi_loads() {
		let codec = ContractCodec::flux_aggregator().unwrap();
		assert_eq!(codec.name(), "FluxAggregator");
		assert!(codec.event_topic("NewRound").is_ok());
		assert!(codec.event_topic("AnswerUpdated").is_ok());
	}

	#[test]
	fn test_invalid_json_rejected() {
		let result = ContractCodec::from_json("Broken", "{not json");
		assert!(matches!(result, Err(ConstructionError::InvalidAbi { .. })));
	}

	#[test]
	fn test_missing_event_rejected() {
		let codec = ContractCodec::from_json("Empty", "[]").unwrap();
		let err = codec.event_topic("NewRound").unwrap_err();
		assert_eq!(err.to_string(), "Event NewRound not found in Empty ABI");
	}

	#[test]
	fn test_encode_args_includes_selector() {
		let codec = ContractCodec::flux_aggregator().unwrap();
		let data = codec
			.encode_args(
				"oracleRoundState",
				&[
					DynSolValue::Address(address!("5555555555555555555555555555555555555555")),
					DynSolValue::Uint(U256::from(3u64), 32),
				],
			)
			.unwrap();

		// selector + two words
		assert_eq!(data.len(), 4 + 64);
		assert_eq!(data[4 + 63], 3);
	}

	#[test]
	fn test_encode_args_type_mismatch() {
		let codec = ContractCodec::flux_aggregator().unwrap();
		let err = codec
			.encode_args(
				"oracleRoundState",
				&[DynSolValue::Bool(true), DynSolValue::Bool(false)],
			)
			.unwrap_err();
		assert!(err.is_encoding());
		assert!(err.to_string().contains("oracleRoundState"));
	}

	#[test]
	fn test_encode_unknown_method() {
		let codec = ContractCodec::flux_aggregator().unwrap();
		let err = codec.encode_args("transmit", &[]).unwrap_err();
		assert!(err.is_encoding());
	}

	#[test]
	fn test_decode_empty_return_data() {
		let codec = ContractCodec::flux_aggregator().unwrap();
		let err = codec.decode_result("latestRoundData", &[]).unwrap_err();
		assert!(matches!(err, CallError::Decoding { .. }));
	}
}
