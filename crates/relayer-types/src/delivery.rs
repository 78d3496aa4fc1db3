//! Transaction delivery types for the relayer.
//!
//! This module defines what the ledger client hands back after a
//! fulfilment transaction was broadcast and mined.

use alloy::primitives::B256;

use crate::DedupKey;

/// Hash of a transaction sent by the relayer.
pub type TxHash = B256;

/// Transaction receipt containing execution details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
	/// The hash of the transaction.
	pub hash: TxHash,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
	/// Gas consumed by the transaction.
	pub gas_used: u64,
}

/// A confirmed fulfilment, as reported by the execution engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
	pub key: DedupKey,
	pub sequence: u64,
	pub receipt: TxReceipt,
}

/// Truncate a hash or long identifier for display purposes.
///
/// Keeps the first 6 and last 4 characters, e.g.
/// `0xa096c418...89a0b4` becomes `0xa096...a0b4`. Strings of 12 characters
/// or fewer are returned unchanged.
pub fn truncate_hash(hash: &str) -> String {
	if hash.len() <= 12 {
		hash.to_string()
	} else {
		format!("{}...{}", &hash[..6], &hash[hash.len() - 4..])
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_truncate_hash() {
		let hash = "0xa096c418fd1192ba7f5b506beea682a633f9ab82911fa3d7a249b8d80889a0b4";
		assert_eq!(truncate_hash(hash), "0xa096...a0b4");

		let short = "0x12345";
		assert_eq!(truncate_hash(short), "0x12345");

		let exact = "0x1234567890";
		assert_eq!(truncate_hash(exact), "0x1234567890");
	}
}
