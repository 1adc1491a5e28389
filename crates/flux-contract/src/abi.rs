//! Compiled-in event definitions for the FluxAggregator contract.
//!
//! The JSON ABI drives call encoding, but event records are decoded through
//! these statically typed definitions, one decode function per event kind.

use alloy_primitives::B256;
use alloy_sol_types::{sol, SolEvent};
use flux_types::{FluxAggregatorEvent, FluxEventKind, Log, LogAnswerUpdated, LogNewRound};
use std::fmt;

// Solidity event definitions for the FluxAggregator contract.
//
// These must match the on-chain contract ABI for proper log decoding; the
// topic registry checks them against the loaded ABI at construction.
sol! {
	/// Emitted when a new reporting round starts.
	event NewRound(uint256 indexed roundId, address indexed startedBy, uint256 startedAt);

	/// Emitted when a round closes with a new aggregated answer.
	event AnswerUpdated(int256 indexed current, uint256 indexed roundId, uint256 updatedAt);
}

/// Compiled-in topic hash of an event kind.
pub fn signature_hash(kind: FluxEventKind) -> B256 {
	match kind {
		FluxEventKind::NewRound => NewRound::SIGNATURE_HASH,
		FluxEventKind::AnswerUpdated => AnswerUpdated::SIGNATURE_HASH,
	}
}

/// A topic-matched log that failed to decode.
///
/// This is isolated to the one log: it is reported and the stream continues.
#[derive(Debug)]
pub struct LogDecodeError {
	/// Kind the log was classified as.
	pub kind: FluxEventKind,
	/// The raw log that failed to decode.
	pub log: Log,
	pub reason: String,
}

impl fmt::Display for LogDecodeError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Failed to decode {} log", self.kind)?;
		if let Some(block) = self.log.block_number {
			write!(f, " at block {}", block)?;
		}
		if let Some(tx) = self.log.transaction_hash {
			write!(f, " in tx {}", tx)?;
		}
		write!(f, ": {}", self.reason)
	}
}

impl std::error::Error for LogDecodeError {}

/// Decodes `log` as an event of `kind`, keeping the raw log as provenance.
pub fn decode_event(kind: FluxEventKind, log: Log) -> Result<FluxAggregatorEvent, LogDecodeError> {
	let topics = log.topics().to_vec();
	let data = log.data().data.clone();

	let decoded = match kind {
		FluxEventKind::NewRound => NewRound::decode_raw_log(topics, &data, true).map(|event| {
			FluxAggregatorEvent::NewRound(LogNewRound {
				log: log.clone(),
				round_id: event.roundId,
				started_by: event.startedBy,
				started_at: event.startedAt,
			})
		}),
		FluxEventKind::AnswerUpdated => {
			AnswerUpdated::decode_raw_log(topics, &data, true).map(|event| {
				FluxAggregatorEvent::AnswerUpdated(LogAnswerUpdated {
					log: log.clone(),
					current: event.current,
					round_id: event.roundId,
					updated_at: event.updatedAt,
				})
			})
		}
	};

	decoded.map_err(|e| LogDecodeError {
		kind,
		log,
		reason: e.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{address, Bytes, LogData, I256, U256};

	fn rpc_log(data: LogData) -> Log {
		Log {
			inner: alloy_primitives::Log {
				address: address!("3333333333333333333333333333333333333333"),
				data,
			},
			block_number: Some(100),
			..Default::default()
		}
	}

	#[test]
	fn test_decode_new_round() {
		let event = NewRound {
			roundId: U256::from(5u64),
			startedBy: address!("4444444444444444444444444444444444444444"),
			startedAt: U256::from(1_700_000_000u64),
		};
		let log = rpc_log(event.encode_log_data());

		match decode_event(FluxEventKind::NewRound, log.clone()).unwrap() {
			FluxAggregatorEvent::NewRound(decoded) => {
				assert_eq!(decoded.round_id, U256::from(5u64));
				assert_eq!(decoded.started_by, event.startedBy);
				assert_eq!(decoded.started_at, U256::from(1_700_000_000u64));
				assert_eq!(decoded.log, log);
			}
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_decode_answer_updated_negative_answer() {
		let current = I256::try_from(-42i64).unwrap();
		let event = AnswerUpdated {
			current,
			roundId: U256::from(8u64),
			updatedAt: U256::from(99u64),
		};

		match decode_event(FluxEventKind::AnswerUpdated, rpc_log(event.encode_log_data())).unwrap() {
			FluxAggregatorEvent::AnswerUpdated(decoded) => {
				assert_eq!(decoded.current, current);
				assert_eq!(decoded.round_id, U256::from(8u64));
				assert_eq!(decoded.updated_at, U256::from(99u64));
			}
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_decode_truncated_data_fails() {
		let topics = vec![
			NewRound::SIGNATURE_HASH,
			B256::with_last_byte(1),
			B256::left_padding_from(&[0x44; 20]),
		];
		let log = rpc_log(LogData::new_unchecked(topics, Bytes::from(vec![0u8; 5])));

		let err = decode_event(FluxEventKind::NewRound, log).unwrap_err();
		assert_eq!(err.kind, FluxEventKind::NewRound);
		assert!(err.to_string().starts_with("Failed to decode NewRound log at block 100"));
	}

	#[test]
	fn test_decode_missing_indexed_topics_fails() {
		let log = rpc_log(LogData::new_unchecked(
			vec![AnswerUpdated::SIGNATURE_HASH],
			Bytes::from(vec![0u8; 32]),
		));

		assert!(decode_event(FluxEventKind::AnswerUpdated, log).is_err());
	}

	#[test]
	fn test_signature_hashes_are_distinct() {
		assert_ne!(
			signature_hash(FluxEventKind::NewRound),
			signature_hash(FluxEventKind::AnswerUpdated)
		);
	}
}
