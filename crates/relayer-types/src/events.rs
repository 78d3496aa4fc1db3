//! Events published by the relayer as intents move through the pipeline.
//!
//! The [`EventBus`] is a broadcast channel: every subscriber sees every event
//! published after it subscribed, and publishing never blocks the worker.

use tokio::sync::broadcast;

use crate::{DedupKey, ExecutionError, GuardRejection, TxHash, TxReceipt, ValidationError};

#[derive(Debug, Clone)]
pub enum RelayerEvent {
	Discovered {
		key: DedupKey,
	},
	Rejected {
		key: DedupKey,
		reason: ValidationError,
	},
	Deferred {
		key: DedupKey,
		reason: GuardRejection,
	},
	Submitted {
		key: DedupKey,
		tx_hash: TxHash,
		sequence: u64,
	},
	Confirmed {
		key: DedupKey,
		receipt: TxReceipt,
	},
	Failed {
		key: DedupKey,
		error: ExecutionError,
	},
}

impl RelayerEvent {
	pub fn key(&self) -> &DedupKey {
		match self {
			RelayerEvent::Discovered { key }
			| RelayerEvent::Rejected { key, .. }
			| RelayerEvent::Deferred { key, .. }
			| RelayerEvent::Submitted { key, .. }
			| RelayerEvent::Confirmed { key, .. }
			| RelayerEvent::Failed { key, .. } => key,
		}
	}
}

/// Broadcast bus carrying [`RelayerEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<RelayerEvent>,
}

impl EventBus {
	/// Creates a bus that buffers up to `capacity` events per lagging subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<RelayerEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Having no subscribers is not an error.
	pub fn publish(&self, event: RelayerEvent) {
		let _ = self.sender.send(event);
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1024)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::IntentId;

	#[tokio::test]
	async fn test_publish_reaches_subscribers() {
		let bus = EventBus::new(8);
		let mut first = bus.subscribe();
		let mut second = bus.subscribe();

		bus.publish(RelayerEvent::Discovered {
			key: DedupKey::Stored(IntentId(1)),
		});

		assert_eq!(first.recv().await.unwrap().key(), &DedupKey::Stored(IntentId(1)));
		assert_eq!(second.recv().await.unwrap().key(), &DedupKey::Stored(IntentId(1)));
	}

	#[test]
	fn test_publish_without_subscribers() {
		let bus = EventBus::new(8);
		bus.publish(RelayerEvent::Discovered {
			key: DedupKey::Stored(IntentId(2)),
		});
	}
}
