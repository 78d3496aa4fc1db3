//! In-process signed intent source.
//!
//! Producers (the HTTP intake endpoint, tests) push through a cloneable
//! [`SignedIntentSender`]; the relayer drains whatever arrived on each poll.

use async_trait::async_trait;
use relayer_types::SignedSubmission;
use tokio::sync::{mpsc, Mutex};

use crate::{DiscoveryError, SignedIntentSource};

/// Handle for pushing signed intents into a [`ChannelSignedIntentSource`].
#[derive(Clone)]
pub struct SignedIntentSender {
	sender: mpsc::UnboundedSender<SignedSubmission>,
}

impl SignedIntentSender {
	pub fn send(&self, submission: SignedSubmission) -> Result<(), DiscoveryError> {
		self.sender
			.send(submission)
			.map_err(|_| DiscoveryError::Source("signed intent source is closed".to_string()))
	}
}

pub struct ChannelSignedIntentSource {
	receiver: Mutex<mpsc::UnboundedReceiver<SignedSubmission>>,
}

impl ChannelSignedIntentSource {
	pub fn new() -> (Self, SignedIntentSender) {
		let (sender, receiver) = mpsc::unbounded_channel();
		(
			Self {
				receiver: Mutex::new(receiver),
			},
			SignedIntentSender { sender },
		)
	}
}

#[async_trait]
impl SignedIntentSource for ChannelSignedIntentSource {
	fn name(&self) -> &str {
		"channel"
	}

	async fn poll_pending(&self) -> Result<Vec<SignedSubmission>, DiscoveryError> {
		let mut receiver = self.receiver.lock().await;
		let mut pending = Vec::new();
		while let Ok(submission) = receiver.try_recv() {
			pending.push(submission);
		}
		Ok(pending)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_types::{Address, SwapIntent, U256};

	fn submission(nonce: u64) -> SignedSubmission {
		SignedSubmission::new(
			SwapIntent {
				fromToken: Address::repeat_byte(1),
				toToken: Address::repeat_byte(2),
				amountIn: U256::from(100u64),
				minAmountOut: U256::from(90u64),
				recipient: Address::repeat_byte(3),
				deadline: U256::MAX,
				nonce: U256::from(nonce),
			},
			vec![0u8; 65],
		)
	}

	#[tokio::test]
	async fn test_poll_drains_in_order() {
		let (source, sender) = ChannelSignedIntentSource::new();
		sender.send(submission(0)).unwrap();
		sender.clone().send(submission(1)).unwrap();

		let pending = source.poll_pending().await.unwrap();
		assert_eq!(pending, vec![submission(0), submission(1)]);
		assert!(source.poll_pending().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_send_after_source_dropped() {
		let (source, sender) = ChannelSignedIntentSource::new();
		drop(source);
		assert!(sender.send(submission(0)).is_err());
	}
}
