//! RPC call service used by the contract gateway.

use alloy_primitives::{Address, Bytes};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::TransactionRequest;
use alloy_transport_http::Http;
use async_trait::async_trait;
use thiserror::Error;

/// Error returned by a call service.
#[derive(Debug, Error)]
#[error("RPC error: {0}")]
pub struct CallServiceError(pub String);

/// Performs read-only contract invocations.
///
/// Implementations must be safe for concurrent use; the contract handle shares
/// one service across every query issued against it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CallService: Send + Sync {
	/// Executes `eth_call` against `to` with `data` and returns the raw result.
	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, CallServiceError>;
}

/// Call service backed by an Alloy HTTP provider.
pub struct AlloyCallService {
	provider: RootProvider<Http<reqwest::Client>>,
}

impl AlloyCallService {
	/// Creates a call service for the RPC endpoint at `rpc_url`.
	pub fn new(rpc_url: &str) -> Result<Self, CallServiceError> {
		let provider = RootProvider::new_http(
			rpc_url
				.parse()
				.map_err(|e| CallServiceError(format!("Invalid RPC URL: {}", e)))?,
		);
		Ok(Self { provider })
	}
}

#[async_trait]
impl CallService for AlloyCallService {
	async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, CallServiceError> {
		let request = TransactionRequest::default().to(to).input(data.into());

		self.provider
			.call(&request)
			.await
			.map_err(|e| CallServiceError(format!("eth_call to {} failed: {}", to, e)))
	}
}
