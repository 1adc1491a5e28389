//! Polling log source backed by an Alloy HTTP provider.
//!
//! The source polls `eth_getLogs` for every contract address that has a
//! listener registered on the broadcaster and pushes each returned log into
//! it. RPC failures flip the broadcaster to disconnected until the next
//! successful poll, and stopping the source leaves it disconnected.

use crate::{LogBroadcastService, LogsError};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::Filter;
use alloy_transport_http::Http;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Default polling interval in seconds.
pub const DEFAULT_POLLING_INTERVAL_SECS: u64 = 3;

/// Default maximum number of blocks fetched per `eth_getLogs` request.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 1000;

/// Splits the inclusive range `from..=to` into chunks of at most `max_range`
/// blocks.
pub(crate) fn block_ranges(from: u64, to: u64, max_range: u64) -> Vec<(u64, u64)> {
	let max_range = max_range.max(1);
	let mut ranges = Vec::new();
	let mut start = from;
	while start <= to {
		let end = start.saturating_add(max_range - 1).min(to);
		ranges.push((start, end));
		if end == u64::MAX {
			break;
		}
		start = end + 1;
	}
	ranges
}

/// Log source that polls an HTTP RPC endpoint.
pub struct PollingLogSource {
	/// The Alloy provider for blockchain interaction.
	provider: RootProvider<Http<reqwest::Client>>,
	/// First block to fetch. Defaults to the block after the chain head at start.
	start_block: Option<u64>,
	/// Polling interval in seconds.
	polling_interval_secs: u64,
	/// Maximum number of blocks per request.
	max_block_range: u64,
	/// Flag indicating if polling is active.
	is_running: Arc<AtomicBool>,
	/// Channel for signaling shutdown.
	stop_signal: Arc<Mutex<Option<mpsc::Sender<()>>>>,
	/// The spawned polling task.
	task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingLogSource {
	/// Creates a new polling source for the RPC endpoint at `rpc_url`.
	pub fn new(
		rpc_url: &str,
		start_block: Option<u64>,
		polling_interval_secs: Option<u64>,
		max_block_range: Option<u64>,
	) -> Result<Self, LogsError> {
		let provider = RootProvider::new_http(
			rpc_url
				.parse()
				.map_err(|e| LogsError::Connection(format!("Invalid RPC URL: {}", e)))?,
		);

		Ok(Self {
			provider,
			start_block,
			polling_interval_secs: polling_interval_secs.unwrap_or(DEFAULT_POLLING_INTERVAL_SECS),
			max_block_range: max_block_range.unwrap_or(DEFAULT_MAX_BLOCK_RANGE),
			is_running: Arc::new(AtomicBool::new(false)),
			stop_signal: Arc::new(Mutex::new(None)),
			task: Mutex::new(None),
		})
	}

	/// Starts polling and pushing logs into `broadcaster`.
	///
	/// Fails if the chain head cannot be fetched, in which case the broadcaster
	/// stays disconnected and the source can be started again.
	pub async fn start(&self, broadcaster: LogBroadcastService) -> Result<(), LogsError> {
		if self
			.is_running
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.is_err()
		{
			return Err(LogsError::AlreadyRunning);
		}

		let current_block = match self.provider.get_block_number().await {
			Ok(block) => block,
			Err(e) => {
				broadcaster.set_connected(false);
				self.is_running.store(false, Ordering::SeqCst);
				return Err(LogsError::Connection(format!(
					"Failed to get block number: {}",
					e
				)));
			},
		};
		let next_block = self
			.start_block
			.unwrap_or_else(|| current_block.saturating_add(1));
		broadcaster.set_connected(true);

		let (stop_tx, stop_rx) = mpsc::channel(1);
		*self.stop_signal.lock().await = Some(stop_tx);

		let provider = self.provider.clone();
		let polling_interval_secs = self.polling_interval_secs;
		let max_block_range = self.max_block_range;

		let handle = tokio::spawn(async move {
			Self::polling_loop(
				provider,
				broadcaster,
				next_block,
				stop_rx,
				polling_interval_secs,
				max_block_range,
			)
			.await;
		});
		*self.task.lock().await = Some(handle);

		tracing::info!(from_block = next_block, "Started log polling");
		Ok(())
	}

	/// Stops polling and marks the broadcaster disconnected.
	///
	/// Waits for the polling task to exit. Does nothing if the source is not
	/// running.
	pub async fn stop(&self) {
		let Some(stop_tx) = self.stop_signal.lock().await.take() else {
			return;
		};
		let _ = stop_tx.send(()).await;

		if let Some(handle) = self.task.lock().await.take() {
			if let Err(e) = handle.await {
				tracing::error!("Log polling task failed: {}", e);
			}
		}

		self.is_running.store(false, Ordering::SeqCst);
		tracing::info!("Stopped log polling");
	}

	async fn polling_loop(
		provider: RootProvider<Http<reqwest::Client>>,
		broadcaster: LogBroadcastService,
		mut next_block: u64,
		mut stop_rx: mpsc::Receiver<()>,
		polling_interval_secs: u64,
		max_block_range: u64,
	) {
		let mut interval =
			tokio::time::interval(std::time::Duration::from_secs(polling_interval_secs));

		// Skip missed ticks instead of bursting
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				_ = interval.tick() => {
					let current_block = match provider.get_block_number().await {
						Ok(block) => block,
						Err(e) => {
							tracing::error!("Failed to get block number: {}", e);
							broadcaster.set_connected(false);
							continue;
						}
					};

					if current_block < next_block {
						continue;
					}

					// Hold the range open until someone listens
					let addresses = broadcaster.addresses();
					if addresses.is_empty() {
						continue;
					}

					for (from, to) in block_ranges(next_block, current_block, max_block_range) {
						let filter = Filter::new()
							.address(addresses.clone())
							.from_block(from)
							.to_block(to);

						let logs = match provider.get_logs(&filter).await {
							Ok(logs) => logs,
							Err(e) => {
								tracing::error!(from, to, "Failed to get logs: {}", e);
								broadcaster.set_connected(false);
								break;
							}
						};

						broadcaster.set_connected(true);
						tracing::debug!(from, to, count = logs.len(), "Fetched logs");
						for log in logs {
							broadcaster.broadcast(log);
						}
						next_block = to.saturating_add(1);
					}
				}
				_ = stop_rx.recv() => {
					break;
				}
			}
		}

		broadcaster.set_connected(false);
	}
}
