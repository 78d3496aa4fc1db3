//! Intent sources feeding the relayer's work queue.
//!
//! Three feeds exist: a bounded backward scan over recently created stored
//! intents, a live feed that follows the ledger's intent events, and any
//! number of [`SignedIntentSource`]s supplying pre-signed intents. All of them
//! only produce [`WorkItem`]s; none of them validates or executes anything.

use async_trait::async_trait;
use relayer_ledger::LedgerError;
use relayer_types::{IntentId, SignedSubmission};
use thiserror::Error;

pub mod feed;
pub mod payload;
pub mod scanner;

pub mod implementations {
	pub mod channel;
	pub mod http;
}

pub use feed::LiveIntentFeed;
pub use implementations::channel::{ChannelSignedIntentSource, SignedIntentSender};
pub use implementations::http::HttpSignedIntentSource;
pub use payload::SignedIntentPayload;
pub use scanner::StoredIntentScanner;

#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("Ledger error: {0}")]
	Ledger(#[from] LedgerError),
	#[error("Source error: {0}")]
	Source(String),
	#[error("Invalid signed intent payload: {0}")]
	InvalidPayload(String),
	#[error("Already monitoring")]
	AlreadyMonitoring,
}

/// A unit of work for the relayer's single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
	/// A stored intent that may need fulfilling.
	Stored(IntentId),
	/// A pre-signed intent to validate and execute.
	Signed(SignedSubmission),
	/// The ledger reported the intent fulfilled or cancelled.
	Closed(IntentId),
}

/// A feed of externally supplied signed intents.
#[async_trait]
pub trait SignedIntentSource: Send + Sync {
	/// Short name used in logs.
	fn name(&self) -> &str;

	/// Returns the signed intents that arrived since the last poll.
	async fn poll_pending(&self) -> Result<Vec<SignedSubmission>, DiscoveryError>;
}
