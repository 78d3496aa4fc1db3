//! Process-local state owned by the execution engine.

use relayer_types::{DedupKey, DedupRegistry, B256};

/// Chain binding, sequence counter and terminal-intent registry.
///
/// The sequence counter is advisory. `None` means the next submission must
/// first read the ledger's pending count.
#[derive(Debug, Clone)]
pub struct RelayerContext {
	pub chain_id: u64,
	pub domain_separator: B256,
	sequence: Option<u64>,
	registry: DedupRegistry,
}

impl RelayerContext {
	pub fn new(chain_id: u64, domain_separator: B256) -> Self {
		Self {
			chain_id,
			domain_separator,
			sequence: None,
			registry: DedupRegistry::new(),
		}
	}

	pub fn sequence(&self) -> Option<u64> {
		self.sequence
	}

	pub(crate) fn set_sequence(&mut self, sequence: Option<u64>) {
		self.sequence = sequence;
	}

	pub fn registry(&self) -> &DedupRegistry {
		&self.registry
	}

	pub(crate) fn mark_terminal(&mut self, key: DedupKey) -> bool {
		self.registry.insert(key)
	}
}
