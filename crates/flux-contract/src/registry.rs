//! Topic hash registry for the events this layer decodes.

use crate::{abi, ConstructionError, ContractCodec};
use alloy_primitives::B256;
use flux_types::{FluxEventKind, Log};
use std::collections::HashMap;

/// Fixed mapping from an event's topic hash to its kind.
///
/// Built once per contract handle. Every known event must be declared in the
/// codec's ABI with the same signature as the compiled-in definition.
#[derive(Debug, Clone)]
pub struct EventTopicRegistry {
	topics: HashMap<B256, FluxEventKind>,
}

impl EventTopicRegistry {
	pub fn new(codec: &ContractCodec) -> Result<Self, ConstructionError> {
		let mut topics = HashMap::with_capacity(FluxEventKind::ALL.len());

		for kind in FluxEventKind::ALL {
			let found = codec.event_topic(kind.name())?;
			let expected = abi::signature_hash(kind);
			if found != expected {
				return Err(ConstructionError::TopicMismatch {
					contract: codec.name().to_string(),
					event: kind.name().to_string(),
					expected,
					found,
				});
			}
			topics.insert(found, kind);
		}

		Ok(Self { topics })
	}

	/// Classifies a raw log by its first topic.
	///
	/// Returns `None` for logs this layer does not model, including anonymous
	/// logs without topics.
	pub fn classify(&self, log: &Log) -> Option<FluxEventKind> {
		log.topics()
			.first()
			.and_then(|topic| self.topics.get(topic))
			.copied()
	}

	/// Topic hash registered for `kind`.
	pub fn topic(&self, kind: FluxEventKind) -> Option<B256> {
		self.topics
			.iter()
			.find(|(_, k)| **k == kind)
			.map(|(topic, _)| *topic)
	}

	pub fn len(&self) -> usize {
		self.topics.len()
	}

	pub fn is_empty(&self) -> bool {
		self.topics.is_empty()
	}
}
