//! Record of intents the relayer already brought to a terminal outcome.

use alloy::primitives::B256;
use std::collections::HashSet;

use crate::{DedupKey, IntentId};

/// In-memory set of terminal intents, keyed by stored id or signed digest.
///
/// The registry only lets the relayer skip work early. It is never a reason
/// to skip the ledger re-read that precedes every submission.
#[derive(Debug, Default, Clone)]
pub struct DedupRegistry {
	stored: HashSet<IntentId>,
	signed: HashSet<B256>,
}

impl DedupRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn contains(&self, key: &DedupKey) -> bool {
		match key {
			DedupKey::Stored(id) => self.stored.contains(id),
			DedupKey::Signed(digest) => self.signed.contains(digest),
		}
	}

	/// Marks `key` terminal. Returns `false` if it already was.
	pub fn insert(&mut self, key: DedupKey) -> bool {
		match key {
			DedupKey::Stored(id) => self.stored.insert(id),
			DedupKey::Signed(digest) => self.signed.insert(digest),
		}
	}

	pub fn contains_stored(&self, id: IntentId) -> bool {
		self.stored.contains(&id)
	}

	pub fn contains_signed(&self, digest: &B256) -> bool {
		self.signed.contains(digest)
	}

	pub fn len(&self) -> usize {
		self.stored.len() + self.signed.len()
	}

	pub fn is_empty(&self) -> bool {
		self.stored.is_empty() && self.signed.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_insert_is_idempotent() {
		let mut registry = DedupRegistry::new();
		assert!(registry.is_empty());

		assert!(registry.insert(DedupKey::Stored(IntentId(1))));
		assert!(!registry.insert(DedupKey::Stored(IntentId(1))));
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn test_stored_and_signed_are_separate() {
		let mut registry = DedupRegistry::new();
		let digest = B256::repeat_byte(1);

		registry.insert(DedupKey::Signed(digest));

		assert!(registry.contains_signed(&digest));
		assert!(registry.contains(&DedupKey::Signed(digest)));
		assert!(!registry.contains_stored(IntentId(1)));

		registry.insert(DedupKey::Stored(IntentId(1)));
		assert!(registry.contains_stored(IntentId(1)));
		assert_eq!(registry.len(), 2);
	}
}
