//! Log classification and decoding pipeline.
//!
//! Sits between a log broadcaster and an application listener: every raw log is
//! classified by its first topic, recognized logs are decoded into typed event
//! records and forwarded, everything else is dropped.

use crate::abi::{self, LogDecodeError};
use crate::EventTopicRegistry;
use flux_logs::LogListener;
use flux_types::{FluxAggregatorEvent, Log};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives decoded aggregator events.
pub trait FluxEventListener: Send + Sync {
	/// Handles one recognized, fully decoded event.
	fn handle_event(&self, event: FluxAggregatorEvent);

	/// Handles a log that matched a known event but failed to decode.
	///
	/// The pipeline has already logged the failure; the default does nothing.
	fn handle_decode_error(&self, _error: LogDecodeError) {}
}

impl FluxEventListener for mpsc::UnboundedSender<FluxAggregatorEvent> {
	fn handle_event(&self, event: FluxAggregatorEvent) {
		if self.send(event).is_err() {
			tracing::debug!("Event receiver dropped, discarding event");
		}
	}
}

/// Counters kept by the decoding pipeline.
#[derive(Debug, Default)]
pub struct PipelineStats {
	delivered: AtomicU64,
	unrecognized: AtomicU64,
	decode_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineCounts {
	/// Events decoded and handed to the listener.
	pub delivered: u64,
	/// Logs dropped because their topic is not a known event.
	pub unrecognized: u64,
	/// Topic-matched logs that failed to decode.
	pub decode_failures: u64,
}

impl PipelineStats {
	pub fn snapshot(&self) -> PipelineCounts {
		PipelineCounts {
			delivered: self.delivered.load(Ordering::Relaxed),
			unrecognized: self.unrecognized.load(Ordering::Relaxed),
			decode_failures: self.decode_failures.load(Ordering::Relaxed),
		}
	}
}

/// Adapter that decodes raw logs before handing them to a
/// [`FluxEventListener`].
pub struct DecodingLogListener {
	registry: Arc<EventTopicRegistry>,
	listener: Arc<dyn FluxEventListener>,
	stats: Arc<PipelineStats>,
}

impl DecodingLogListener {
	pub fn new(
		registry: Arc<EventTopicRegistry>,
		listener: Arc<dyn FluxEventListener>,
		stats: Arc<PipelineStats>,
	) -> Self {
		Self {
			registry,
			listener,
			stats,
		}
	}

	/// Classifies and decodes `log`.
	///
	/// `Ok(None)` means the log is not an event this layer models.
	pub fn decode(&self, log: Log) -> Result<Option<FluxAggregatorEvent>, LogDecodeError> {
		match self.registry.classify(&log) {
			Some(kind) => abi::decode_event(kind, log).map(Some),
			None => Ok(None),
		}
	}
}

impl LogListener for DecodingLogListener {
	fn handle_log(&self, log: Log) {
		let topic = log.topics().first().copied();
		let block_number = log.block_number;

		match self.decode(log) {
			Ok(Some(event)) => {
				self.stats.delivered.fetch_add(1, Ordering::Relaxed);
				self.listener.handle_event(event);
			}
			Ok(None) => {
				self.stats.unrecognized.fetch_add(1, Ordering::Relaxed);
				tracing::debug!(?topic, ?block_number, "Dropping unrecognized log");
			}
			Err(e) => {
				self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
				tracing::error!("{}", e);
				self.listener.handle_decode_error(e);
			}
		}
	}
}
