//! Bounded backward scan over recently created stored intents.

use relayer_ledger::SharedLedger;
use relayer_types::IntentId;

use crate::DiscoveryError;

pub struct StoredIntentScanner {
	ledger: SharedLedger,
	window: u64,
}

impl StoredIntentScanner {
	pub fn new(ledger: SharedLedger, window: u64) -> Self {
		Self { ledger, window }
	}

	/// Returns up to `window` of the newest intent ids, newest first,
	/// omitting those `is_terminal` reports as already done.
	pub async fn scan<F>(&self, is_terminal: F) -> Result<Vec<IntentId>, DiscoveryError>
	where
		F: Fn(IntentId) -> bool,
	{
		let next_id = self.ledger.next_intent_id().await?;
		let latest = next_id.saturating_sub(1);
		let oldest = latest.saturating_sub(self.window).saturating_add(1).max(1);

		let ids: Vec<IntentId> = (oldest..=latest)
			.rev()
			.map(IntentId)
			.filter(|id| !is_terminal(*id))
			.collect();

		tracing::debug!(
			latest,
			window = self.window,
			pending = ids.len(),
			"Scanned stored intents"
		);

		Ok(ids)
	}
}
