//! Live intent feed following the ledger's intent events.
//!
//! The feed only shortens the time between an intent's creation and the
//! next scan. Every event becomes a [`WorkItem`] on the same queue the
//! scheduled scan uses.

use relayer_ledger::{IntentEvent, SharedLedger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::{DiscoveryError, WorkItem};

pub struct LiveIntentFeed {
	ledger: SharedLedger,
	poll_interval: Duration,
	is_monitoring: Arc<AtomicBool>,
	stop_signal: Mutex<Option<mpsc::Sender<()>>>,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveIntentFeed {
	pub fn new(ledger: SharedLedger, poll_interval: Duration) -> Self {
		Self {
			ledger,
			poll_interval,
			is_monitoring: Arc::new(AtomicBool::new(false)),
			stop_signal: Mutex::new(None),
			task: Mutex::new(None),
		}
	}

	pub fn is_monitoring(&self) -> bool {
		self.is_monitoring.load(Ordering::SeqCst)
	}

	/// Starts following events from the current block onwards.
	pub async fn start(&self, sender: mpsc::UnboundedSender<WorkItem>) -> Result<(), DiscoveryError> {
		if self.is_monitoring.swap(true, Ordering::SeqCst) {
			return Err(DiscoveryError::AlreadyMonitoring);
		}

		let start_block = match self.ledger.block_number().await {
			Ok(block) => block,
			Err(e) => {
				self.is_monitoring.store(false, Ordering::SeqCst);
				return Err(e.into());
			}
		};

		let (stop_tx, stop_rx) = mpsc::channel(1);
		*self.stop_signal.lock().await = Some(stop_tx);

		let ledger = self.ledger.clone();
		let poll_interval = self.poll_interval;
		let is_monitoring = self.is_monitoring.clone();

		let handle = tokio::spawn(async move {
			Self::monitoring_loop(ledger, poll_interval, start_block, sender, stop_rx).await;
			is_monitoring.store(false, Ordering::SeqCst);
		});
		*self.task.lock().await = Some(handle);

		tracing::info!(start_block, "Live intent feed started");
		Ok(())
	}

	/// Stops the feed and waits for its task to exit.
	pub async fn stop(&self) -> Result<(), DiscoveryError> {
		if let Some(stop_tx) = self.stop_signal.lock().await.take() {
			let _ = stop_tx.send(()).await;
		}
		if let Some(handle) = self.task.lock().await.take() {
			handle
				.await
				.map_err(|e| DiscoveryError::Source(format!("Feed task failed: {}", e)))?;
		}

		self.is_monitoring.store(false, Ordering::SeqCst);
		Ok(())
	}

	async fn monitoring_loop(
		ledger: SharedLedger,
		poll_interval: Duration,
		start_block: u64,
		sender: mpsc::UnboundedSender<WorkItem>,
		mut stop_rx: mpsc::Receiver<()>,
	) {
		let mut interval = tokio::time::interval(poll_interval);
		let mut last_block = start_block;

		loop {
			tokio::select! {
				_ = interval.tick() => {
					let current_block = match ledger.block_number().await {
						Ok(block) => block,
						Err(e) => {
							tracing::warn!("Failed to get block number: {}", e);
							continue;
						}
					};

					if current_block <= last_block {
						continue;
					}

					let events = match ledger.intent_events(last_block + 1, current_block).await {
						Ok(events) => events,
						Err(e) => {
							tracing::warn!("Failed to get intent events: {}", e);
							continue;
						}
					};

					for event in events {
						let item = match event {
							IntentEvent::Created { id, .. } => WorkItem::Stored(id),
							IntentEvent::Fulfilled { id } | IntentEvent::Cancelled { id } => {
								WorkItem::Closed(id)
							}
						};
						tracing::debug!(intent_id = %item_id(&item), "Intent event received");
						if sender.send(item).is_err() {
							tracing::debug!("Work queue closed, stopping live feed");
							return;
						}
					}

					last_block = current_block;
				}
				_ = stop_rx.recv() => {
					tracing::info!("Live intent feed stopped");
					break;
				}
			}
		}
	}
}

fn item_id(item: &WorkItem) -> String {
	match item {
		WorkItem::Stored(id) | WorkItem::Closed(id) => id.to_string(),
		WorkItem::Signed(_) => "signed".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_ledger::MemoryLedger;
	use relayer_types::{Address, IntentId, U256};

	async fn create(ledger: &MemoryLedger) -> IntentId {
		ledger
			.create_intent(
				Address::repeat_byte(1),
				Address::repeat_byte(2),
				Address::repeat_byte(3),
				U256::from(100u64),
				U256::from(90u64),
				U256::MAX,
			)
			.await
	}

	#[tokio::test]
	async fn test_new_intents_are_queued() {
		let ledger = Arc::new(MemoryLedger::new(
			Address::repeat_byte(0xaa),
			Address::repeat_byte(0xbb),
		));
		let existing = create(&ledger).await;

		let feed = LiveIntentFeed::new(ledger.clone(), Duration::from_millis(10));
		let (tx, mut rx) = mpsc::unbounded_channel();
		feed.start(tx).await.unwrap();
		assert!(feed.is_monitoring());

		let id = create(&ledger).await;
		ledger.cancel_intent(id).await;

		let first = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
		let second = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
		assert_eq!(first, Some(WorkItem::Stored(id)));
		assert_eq!(second, Some(WorkItem::Closed(id)));
		assert_ne!(id, existing);

		feed.stop().await.unwrap();
		assert!(!feed.is_monitoring());
	}

	#[tokio::test]
	async fn test_double_start_rejected() {
		let ledger = Arc::new(MemoryLedger::new(
			Address::repeat_byte(0xaa),
			Address::repeat_byte(0xbb),
		));
		let feed = LiveIntentFeed::new(ledger, Duration::from_millis(10));
		let (tx, _rx) = mpsc::unbounded_channel();

		feed.start(tx.clone()).await.unwrap();
		assert!(matches!(
			feed.start(tx).await,
			Err(DiscoveryError::AlreadyMonitoring)
		));
		feed.stop().await.unwrap();
	}
}
