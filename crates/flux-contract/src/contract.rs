//! Call gateway bound to one deployed contract.

use crate::{CallError, CallService, ContractCodec};
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes};
use flux_logs::{LogBroadcaster, LogListener, Subscription};
use std::sync::Arc;

/// A deployed contract instance: its address, the codec for its ABI, and the
/// services used to call it and to receive its logs.
///
/// Immutable after construction and shared by every query issued against it.
#[derive(Clone)]
pub struct ConnectedContract {
	codec: Arc<ContractCodec>,
	address: Address,
	call_service: Arc<dyn CallService>,
	broadcaster: Arc<dyn LogBroadcaster>,
}

impl ConnectedContract {
	pub fn new(
		codec: Arc<ContractCodec>,
		address: Address,
		call_service: Arc<dyn CallService>,
		broadcaster: Arc<dyn LogBroadcaster>,
	) -> Self {
		Self {
			codec,
			address,
			call_service,
			broadcaster,
		}
	}

	pub fn address(&self) -> Address {
		self.address
	}

	pub fn codec(&self) -> &ContractCodec {
		&self.codec
	}

	/// Encodes calldata for `method` without sending it.
	pub fn encode_call(&self, method: &str, args: &[DynSolValue]) -> Result<Bytes, CallError> {
		self.codec.encode_args(method, args)
	}

	/// Calls the read-only `method` with `args` and decodes its outputs.
	///
	/// Encoding happens before any network activity, so an encoding failure
	/// never reaches the RPC service.
	pub async fn call(
		&self,
		method: &str,
		args: &[DynSolValue],
	) -> Result<Vec<DynSolValue>, CallError> {
		let data = self.codec.encode_args(method, args)?;

		tracing::trace!(contract = %self.address, method, "Calling contract");
		let raw = self
			.call_service
			.call(self.address, data)
			.await
			.map_err(|e| CallError::RemoteInvocation {
				method: method.to_string(),
				reason: e.to_string(),
			})?;

		self.codec.decode_result(method, &raw)
	}

	/// Registers a raw log listener for this contract's address.
	pub fn subscribe_to_logs(&self, listener: Arc<dyn LogListener>) -> (bool, Subscription) {
		self.broadcaster.register(self.address, listener)
	}
}

impl std::fmt::Debug for ConnectedContract {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConnectedContract")
			.field("contract", &self.codec.name())
			.field("address", &self.address)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rpc::MockCallService;
	use crate::CallServiceError;
	use alloy_primitives::{address, U256};
	use flux_logs::LogBroadcastService;

	const AGGREGATOR: Address = address!("6666666666666666666666666666666666666666");

	fn contract(call_service: MockCallService) -> ConnectedContract {
		ConnectedContract::new(
			Arc::new(ContractCodec::flux_aggregator().unwrap()),
			AGGREGATOR,
			Arc::new(call_service),
			Arc::new(LogBroadcastService::new()),
		)
	}

	#[tokio::test]
	async fn test_call_sends_encoded_args_to_bound_address() {
		let returned = DynSolValue::Tuple(vec![DynSolValue::Array(vec![DynSolValue::Address(
			address!("7777777777777777777777777777777777777777"),
		)])])
		.abi_encode_params();

		let mut call_service = MockCallService::new();
		call_service
			.expect_call()
			.withf(|to, data| *to == AGGREGATOR && data.len() == 4)
			.times(1)
			.returning(move |_, _| Ok(Bytes::from(returned.clone())));

		let outputs = contract(call_service).call("getOracles", &[]).await.unwrap();
		assert_eq!(outputs.len(), 1);
		assert_eq!(outputs[0].as_array().map(|a| a.len()), Some(1));
	}

	#[tokio::test]
	async fn test_encoding_failure_skips_rpc() {
		let mut call_service = MockCallService::new();
		call_service.expect_call().times(0);

		let err = contract(call_service)
			.call("oracleRoundState", &[DynSolValue::Uint(U256::from(1u64), 32)])
			.await
			.unwrap_err();
		assert!(err.is_encoding());
	}

	#[tokio::test]
	async fn test_rpc_failure_names_method() {
		let mut call_service = MockCallService::new();
		call_service
			.expect_call()
			.returning(|_, _| Err(CallServiceError("connection refused".into())));

		let err = contract(call_service).call("getOracles", &[]).await.unwrap_err();
		assert!(matches!(err, CallError::RemoteInvocation { .. }));
		assert_eq!(
			err.to_string(),
			"Remote invocation of getOracles failed: RPC error: connection refused"
		);
	}

	#[tokio::test]
	async fn test_undecodable_result() {
		let mut call_service = MockCallService::new();
		call_service
			.expect_call()
			.returning(|_, _| Ok(Bytes::from(vec![0u8; 7])));

		let err = contract(call_service)
			.call("latestRoundData", &[])
			.await
			.unwrap_err();
		assert!(matches!(err, CallError::Decoding { .. }));
	}
}
