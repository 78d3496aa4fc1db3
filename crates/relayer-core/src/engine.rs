//! The relayer's single worker.
//!
//! [`RelayerEngine`] owns the execution engine and every piece of mutable
//! relayer state. Scheduled cycles, live feed notifications and queued signed
//! intents are all handled by the same task, one intent at a time.

use relayer_delivery::{ExecutionEngine, ExecutionRequest};
use relayer_discovery::{LiveIntentFeed, SignedIntentSource, StoredIntentScanner, WorkItem};
use relayer_intent::{GasGuard, TypedDataCodec, Validator};
use relayer_ledger::{LedgerCall, LedgerError, SharedLedger};
use relayer_types::{
	Bytes, DedupKey, DedupRegistry, EventBus, Execution, ExecutionError, GuardRejection,
	IntentId, IntentTerms, RelayerEvent, SignedSubmission, ValidationError, B256,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// What happened to one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	/// Already terminal, or the ledger is paused.
	Skipped,
	Rejected(ValidationError),
	Deferred(GuardRejection),
	Confirmed(Execution),
	Failed(ExecutionError),
}

impl Outcome {
	/// Whether a signed intent with this outcome is worth holding for the
	/// next cycle.
	pub fn is_retryable(&self) -> bool {
		match self {
			Outcome::Skipped | Outcome::Confirmed(_) => false,
			Outcome::Rejected(reason) => !reason.is_permanent(),
			Outcome::Deferred(GuardRejection::BelowMinimumSize { .. }) => false,
			Outcome::Deferred(_) => true,
			Outcome::Failed(error) => error.is_retryable(),
		}
	}
}

/// Requests a cooperative stop of a running [`RelayerEngine`].
#[derive(Clone)]
pub struct StopHandle {
	sender: Arc<watch::Sender<bool>>,
}

impl StopHandle {
	/// No new cycle starts after this. A submission already in flight still
	/// runs to its outcome.
	pub fn stop(&self) {
		let _ = self.sender.send(true);
	}

	pub fn is_stopped(&self) -> bool {
		*self.sender.borrow()
	}
}

pub struct RelayerEngine {
	pub(crate) ledger: SharedLedger,
	pub(crate) validator: Validator,
	pub(crate) guard: GasGuard,
	pub(crate) executor: ExecutionEngine,
	pub(crate) scanner: StoredIntentScanner,
	pub(crate) live_feed: Option<LiveIntentFeed>,
	pub(crate) signed_sources: Vec<Box<dyn SignedIntentSource>>,
	pub(crate) pending_signed: VecDeque<SignedSubmission>,
	pub(crate) pending_keys: HashSet<(B256, Bytes)>,
	pub(crate) max_pending_signed: usize,
	pub(crate) event_bus: EventBus,
	pub(crate) poll_interval: Duration,
	pub(crate) paused: bool,
	pub(crate) queue_tx: mpsc::UnboundedSender<WorkItem>,
	pub(crate) queue_rx: mpsc::UnboundedReceiver<WorkItem>,
	pub(crate) stop_tx: Arc<watch::Sender<bool>>,
}

fn now() -> u64 {
	chrono::Utc::now().timestamp().max(0) as u64
}

fn signed_by_recipient(digest: &B256, submission: &SignedSubmission) -> bool {
	matches!(
		TypedDataCodec::recover_signer(digest, &submission.signature),
		Ok(signer) if signer == submission.intent.recipient
	)
}

impl RelayerEngine {
	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn registry(&self) -> &DedupRegistry {
		self.executor.registry()
	}

	/// Sender for pushing work onto the worker's queue.
	pub fn queue_sender(&self) -> mpsc::UnboundedSender<WorkItem> {
		self.queue_tx.clone()
	}

	pub fn stop_handle(&self) -> StopHandle {
		StopHandle {
			sender: self.stop_tx.clone(),
		}
	}

	/// Signed intents held for retry at the next cycle, oldest first.
	pub fn pending_signed(&self) -> &VecDeque<SignedSubmission> {
		&self.pending_signed
	}

	pub fn is_live_feed_running(&self) -> bool {
		self.live_feed
			.as_ref()
			.is_some_and(|feed| feed.is_monitoring())
	}

	/// Runs cycles and drains the queue until stopped.
	pub async fn run(mut self) -> Self {
		if let Some(feed) = &self.live_feed {
			if let Err(e) = feed.start(self.queue_tx.clone()).await {
				warn!(error = %e, "Live intent feed unavailable, relying on scheduled scans");
			}
		}

		let mut stop_rx = self.stop_tx.subscribe();
		let mut interval = tokio::time::interval(self.poll_interval);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

		info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "Relayer running");

		loop {
			if *stop_rx.borrow() {
				break;
			}

			tokio::select! {
				_ = interval.tick() => {
					self.run_cycle().await;
				}
				Some(item) = self.queue_rx.recv() => {
					self.process(item).await;
				}
				_ = stop_rx.changed() => {}
			}
		}

		info!("Stopping relayer");
		if let Some(feed) = &self.live_feed {
			if let Err(e) = feed.stop().await {
				warn!(error = %e, "Failed to stop live intent feed");
			}
		}

		self
	}

	/// One scheduled cycle: pause check, stored scan, then signed intents.
	pub async fn run_cycle(&mut self) {
		match self.ledger.paused().await {
			Ok(paused) => {
				if paused && !self.paused {
					warn!("Ledger is paused, skipping cycles until it resumes");
				} else if !paused && self.paused {
					info!("Ledger resumed");
				}
				self.paused = paused;
			}
			Err(e) => {
				warn!(error = %e, "Could not read pause state, skipping cycle");
				return;
			}
		}
		if self.paused {
			return;
		}

		let registry = self.executor.registry();
		let ids = match self
			.scanner
			.scan(|id| registry.contains(&DedupKey::Stored(id)))
			.await
		{
			Ok(ids) => ids,
			Err(e) => {
				warn!(error = %e, "Stored intent scan failed");
				Vec::new()
			}
		};
		for id in ids {
			self.process_stored(id).await;
		}

		self.collect_signed().await;
		let pending = std::mem::take(&mut self.pending_signed);
		self.pending_keys.clear();
		for submission in pending {
			let outcome = self.process_signed(&submission).await;
			if outcome.is_retryable() {
				self.retain_signed(submission);
			}
		}
	}

	/// Carries one work item to its outcome.
	pub async fn process(&mut self, item: WorkItem) -> Outcome {
		match item {
			WorkItem::Closed(id) => {
				if self.executor.mark_terminal(DedupKey::Stored(id)) {
					debug!(intent_id = %id, "Intent closed on the ledger");
				}
				Outcome::Skipped
			}
			WorkItem::Stored(id) => {
				if self.paused {
					return Outcome::Skipped;
				}
				self.process_stored(id).await
			}
			WorkItem::Signed(submission) => {
				if self.paused {
					self.retain_signed(submission);
					return Outcome::Skipped;
				}
				let outcome = self.process_signed(&submission).await;
				if outcome.is_retryable() {
					self.retain_signed(submission);
				}
				outcome
			}
		}
	}

	async fn process_stored(&mut self, id: IntentId) -> Outcome {
		let key = DedupKey::Stored(id);
		if self.executor.registry().contains(&key) {
			return Outcome::Skipped;
		}
		self.event_bus.publish(RelayerEvent::Discovered { key });

		let intent = match self.ledger.get_intent(id).await {
			Ok(intent) => intent,
			Err(e) => return self.read_failed(key, e),
		};

		if let Err(reason) = self.validator.validate_stored(&intent, now()) {
			if matches!(
				reason,
				ValidationError::Expired { .. } | ValidationError::AlreadyTerminal
			) {
				self.executor.mark_terminal(key);
			}
			return self.rejected(key, reason);
		}

		self.guard_and_execute(key, LedgerCall::FulfillIntent(id), intent.terms())
			.await
	}

	async fn process_signed(&mut self, submission: &SignedSubmission) -> Outcome {
		let digest = self.validator.codec().digest(&submission.intent);
		let key = DedupKey::Signed(digest);
		if self.executor.registry().contains(&key) {
			return Outcome::Skipped;
		}
		self.event_bus.publish(RelayerEvent::Discovered { key });

		let ledger_nonce = match self.ledger.nonce_of(submission.intent.recipient).await {
			Ok(nonce) => nonce,
			Err(e) => {
				if !signed_by_recipient(&digest, submission) {
					return self.rejected(key, ValidationError::InvalidSignature);
				}
				return self.read_failed(key, e);
			}
		};

		if let Err(reason) = self.validator.validate_signed(
			submission,
			ledger_nonce,
			self.executor.registry(),
			now(),
		) {
			// Only authentic intents are held for a future nonce.
			if !reason.is_permanent() && !signed_by_recipient(&digest, submission) {
				return self.rejected(key, ValidationError::InvalidSignature);
			}
			// A bad signature says nothing about the intent itself; a correctly
			// signed copy may still arrive.
			if reason.is_permanent() && reason != ValidationError::InvalidSignature {
				self.executor.mark_terminal(key);
			}
			return self.rejected(key, reason);
		}

		self.guard_and_execute(
			key,
			LedgerCall::ExecuteSwap(submission.clone()),
			submission.terms(),
		)
		.await
	}

	async fn guard_and_execute(
		&mut self,
		key: DedupKey,
		call: LedgerCall,
		terms: IntentTerms,
	) -> Outcome {
		let fee_level = match self.ledger.gas_price().await {
			Ok(fee_level) => fee_level,
			Err(e) => return self.read_failed(key, e),
		};
		if let Err(reason) = self.guard.check_fee_level(fee_level) {
			return self.deferred(key, reason);
		}

		let gas_estimate = match self.ledger.estimate_gas(&call).await {
			Ok(gas) => Some(gas),
			Err(e) => {
				debug!(%key, error = %e, "Gas estimation failed, using default estimate");
				None
			}
		};

		let quote = match self.guard.evaluate(&terms, fee_level, gas_estimate) {
			Ok(quote) => quote,
			Err(reason) => return self.deferred(key, reason),
		};

		info!(
			%key,
			call = call.name(),
			gas_price = quote.gas_price,
			gas_limit = quote.gas_limit,
			"Submitting fulfilment"
		);

		let request = ExecutionRequest {
			key,
			call,
			gas_price: quote.gas_price,
			gas_limit: quote.gas_limit,
		};
		match self.executor.execute(request).await {
			Ok(execution) => Outcome::Confirmed(execution),
			Err(error) => {
				warn!(%key, kind = error.kind(), error = %error, "Fulfilment failed");
				Outcome::Failed(error)
			}
		}
	}

	async fn collect_signed(&mut self) {
		let mut arrived = Vec::new();
		for source in &self.signed_sources {
			match source.poll_pending().await {
				Ok(submissions) => {
					if !submissions.is_empty() {
						debug!(source = source.name(), count = submissions.len(), "Signed intents received");
					}
					arrived.extend(submissions);
				}
				Err(e) => warn!(source = source.name(), error = %e, "Signed intent source failed"),
			}
		}
		for submission in arrived {
			self.retain_signed(submission);
		}
	}

	fn pending_key(&self, submission: &SignedSubmission) -> (B256, Bytes) {
		(
			self.validator.codec().digest(&submission.intent),
			submission.signature.clone(),
		)
	}

	/// Holds a signed intent for the next cycle. At the limit the oldest held
	/// intent is dropped.
	fn retain_signed(&mut self, submission: SignedSubmission) {
		let key = self.pending_key(&submission);
		if !self.pending_keys.insert(key) {
			return;
		}

		if self.pending_signed.len() >= self.max_pending_signed {
			if let Some(oldest) = self.pending_signed.pop_front() {
				let (digest, signature) = self.pending_key(&oldest);
				warn!(
					%digest,
					limit = self.max_pending_signed,
					"Signed intent retry queue full, dropping oldest"
				);
				self.pending_keys.remove(&(digest, signature));
			}
		}
		self.pending_signed.push_back(submission);
	}

	fn rejected(&self, key: DedupKey, reason: ValidationError) -> Outcome {
		debug!(%key, kind = reason.kind(), reason = %reason, "Intent rejected");
		self.event_bus.publish(RelayerEvent::Rejected {
			key,
			reason: reason.clone(),
		});
		Outcome::Rejected(reason)
	}

	fn deferred(&self, key: DedupKey, reason: GuardRejection) -> Outcome {
		debug!(%key, kind = reason.kind(), reason = %reason, "Intent deferred");
		self.event_bus.publish(RelayerEvent::Deferred {
			key,
			reason: reason.clone(),
		});
		Outcome::Deferred(reason)
	}

	fn read_failed(&self, key: DedupKey, error: LedgerError) -> Outcome {
		warn!(%key, error = %error, "Ledger read failed");
		let error = ExecutionError::Network(error.to_string());
		self.event_bus.publish(RelayerEvent::Failed {
			key,
			error: error.clone(),
		});
		Outcome::Failed(error)
	}
}
