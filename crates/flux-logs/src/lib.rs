//! Log broadcasting module for the flux aggregator monitor.
//!
//! This module defines the seam between whatever fetches raw logs from the chain
//! and the contract layer that decodes them. A source pushes raw logs into a
//! broadcaster, and the broadcaster fans each log out to the listeners
//! registered for the emitting contract address.

use alloy_primitives::Address;
use flux_types::Log;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod alloy;
}

/// Errors that can occur while running a log source.
#[derive(Debug, Error)]
pub enum LogsError {
	/// Error that occurs when connecting to the chain fails.
	#[error("Connection error: {0}")]
	Connection(String),
	/// Error that occurs when trying to start a source that is already running.
	#[error("Already running")]
	AlreadyRunning,
}

/// Receives raw logs pushed by a broadcaster.
///
/// Implementations are called from the broadcaster's execution context, which
/// may differ from the one that registered them.
pub trait LogListener: Send + Sync {
	/// Handles a single raw log emitted by the contract the listener was
	/// registered for.
	fn handle_log(&self, log: Log);
}

/// Delivers raw logs for a contract address to registered listeners.
pub trait LogBroadcaster: Send + Sync {
	/// Registers a listener for logs emitted by `address`.
	///
	/// Returns whether the broadcaster is currently attached to a live log
	/// stream together with the handle that deregisters the listener. A
	/// `false` flag means no logs will arrive until the caller subscribes
	/// again; it is not an error.
	fn register(&self, address: Address, listener: Arc<dyn LogListener>) -> (bool, Subscription);
}

type UnsubscribeFn = Box<dyn FnOnce() + Send>;

/// Handle returned by a subscription.
///
/// Dropping the handle deregisters the listener.
pub struct Subscription {
	unsubscribe: Mutex<Option<UnsubscribeFn>>,
}

impl Subscription {
	/// Creates a handle that runs `unsubscribe` exactly once.
	pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
		Self {
			unsubscribe: Mutex::new(Some(Box::new(unsubscribe))),
		}
	}

	/// Creates a handle with nothing to deregister.
	pub fn noop() -> Self {
		Self {
			unsubscribe: Mutex::new(None),
		}
	}

	/// Deregisters the listener.
	///
	/// Idempotent. Once this returns the listener receives no further logs.
	pub fn unsubscribe(&self) {
		let unsubscribe = self
			.unsubscribe
			.lock()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.take();
		if let Some(unsubscribe) = unsubscribe {
			unsubscribe();
		}
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.unsubscribe();
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription").finish_non_exhaustive()
	}
}

/// A registered listener and the contract address it listens to.
struct Registration {
	address: Address,
	listener: Arc<dyn LogListener>,
}

#[derive(Default)]
struct Registry {
	listeners: RwLock<HashMap<u64, Registration>>,
	next_id: AtomicU64,
	connected: AtomicBool,
}

impl Registry {
	fn remove(&self, id: u64) {
		let mut listeners = self
			.listeners
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		if listeners.remove(&id).is_some() {
			tracing::debug!(subscription = id, "Removed log listener");
		}
	}
}

/// In-process log broadcaster.
///
/// Sources call [`LogBroadcastService::broadcast`] for every raw log they
/// fetch; each log is handed to every listener registered for the emitting
/// address. Delivery holds a read lock over the listener table, so a
/// deregistration waits for in-flight deliveries to finish and no delivery
/// starts after it returns. Listeners must not deregister from inside
/// `handle_log`.
#[derive(Clone, Default)]
pub struct LogBroadcastService {
	registry: Arc<Registry>,
}

impl LogBroadcastService {
	/// Creates a broadcaster that reports itself disconnected until a source
	/// marks it connected.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records whether the upstream source is attached to the chain.
	pub fn set_connected(&self, connected: bool) {
		let was = self.registry.connected.swap(connected, Ordering::SeqCst);
		if was != connected {
			tracing::info!(connected, "Log stream connection changed");
		}
	}

	pub fn is_connected(&self) -> bool {
		self.registry.connected.load(Ordering::SeqCst)
	}

	/// Distinct contract addresses that currently have listeners.
	pub fn addresses(&self) -> Vec<Address> {
		let listeners = self
			.registry
			.listeners
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner());
		let mut addresses: Vec<Address> = listeners.values().map(|r| r.address).collect();
		addresses.sort_unstable();
		addresses.dedup();
		addresses
	}

	/// Delivers `log` to every listener registered for its address.
	///
	/// Returns the number of listeners the log was handed to.
	pub fn broadcast(&self, log: Log) -> usize {
		let listeners = self
			.registry
			.listeners
			.read()
			.unwrap_or_else(|poisoned| poisoned.into_inner());

		let address = log.address();
		let mut delivered = 0;
		for registration in listeners.values().filter(|r| r.address == address) {
			registration.listener.handle_log(log.clone());
			delivered += 1;
		}
		delivered
	}
}

impl LogBroadcaster for LogBroadcastService {
	fn register(&self, address: Address, listener: Arc<dyn LogListener>) -> (bool, Subscription) {
		let id = self.registry.next_id.fetch_add(1, Ordering::SeqCst);
		self.registry
			.listeners
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.insert(id, Registration { address, listener });
		tracing::debug!(subscription = id, %address, "Registered log listener");

		let registry: Weak<Registry> = Arc::downgrade(&self.registry);
		let subscription = Subscription::new(move || {
			if let Some(registry) = registry.upgrade() {
				registry.remove(id);
			}
		});

		(self.is_connected(), subscription)
	}
}
