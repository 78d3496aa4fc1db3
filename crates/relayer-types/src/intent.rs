//! Intent types for the relayer.
//!
//! An intent reaches the relayer in one of two shapes: a [`StoredIntent`]
//! that the ledger created when the user deposited funds, or a
//! [`SignedIntent`] that the user authorised off-ledger with an EIP-712
//! signature. Both are reduced to [`IntentTerms`] for fee and profitability
//! decisions.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol;
use std::fmt;

sol! {
	/// EIP-712 message authorising an off-ledger swap.
	///
	/// Field order is part of the type hash and must match the ledger's verifier.
	#[derive(Debug, PartialEq, Eq)]
	struct SwapIntent {
		address fromToken;
		address toToken;
		uint256 amountIn;
		uint256 minAmountOut;
		address recipient;
		uint256 deadline;
		uint256 nonce;
	}
}

/// An off-ledger intent, authenticated by the recipient's signature.
pub type SignedIntent = SwapIntent;

/// Ledger-assigned identifier of a stored intent. Zero means "absent".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntentId(pub u64);

impl IntentId {
	pub const ABSENT: IntentId = IntentId(0);

	pub fn is_absent(&self) -> bool {
		self.0 == 0
	}
}

impl fmt::Display for IntentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

impl From<u64> for IntentId {
	fn from(value: u64) -> Self {
		IntentId(value)
	}
}

/// Intent as recorded by the ledger on deposit.
///
/// The relayer never mutates this; it only reads it and asks the ledger to
/// fulfil it. `fulfilled` and `cancelled` are mutually exclusive and final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredIntent {
	pub id: IntentId,
	pub from_token: Address,
	pub to_token: Address,
	pub amount_in: U256,
	pub min_amount_out: U256,
	pub creator: Address,
	pub deadline: U256,
	pub fulfilled: bool,
	pub cancelled: bool,
}

impl StoredIntent {
	/// The ledger returns a zeroed record for unknown ids.
	pub fn is_absent(&self) -> bool {
		self.id.is_absent()
	}

	pub fn is_terminal(&self) -> bool {
		self.fulfilled || self.cancelled
	}

	pub fn terms(&self) -> IntentTerms {
		IntentTerms {
			from_token: self.from_token,
			to_token: self.to_token,
			amount_in: self.amount_in,
			min_amount_out: self.min_amount_out,
			deadline: self.deadline,
		}
	}
}

/// A signed intent together with the signature the recipient produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSubmission {
	pub intent: SignedIntent,
	pub signature: Bytes,
}

impl SignedSubmission {
	pub fn new(intent: SignedIntent, signature: impl Into<Bytes>) -> Self {
		Self {
			intent,
			signature: signature.into(),
		}
	}

	pub fn terms(&self) -> IntentTerms {
		IntentTerms {
			from_token: self.intent.fromToken,
			to_token: self.intent.toToken,
			amount_in: self.intent.amountIn,
			min_amount_out: self.intent.minAmountOut,
			deadline: self.intent.deadline,
		}
	}
}

/// The economic terms shared by both intent shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentTerms {
	pub from_token: Address,
	pub to_token: Address,
	pub amount_in: U256,
	pub min_amount_out: U256,
	pub deadline: U256,
}

/// Key under which an intent's terminal outcome is remembered.
///
/// Stored intents are keyed by ledger id, signed intents by their EIP-712
/// digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupKey {
	Stored(IntentId),
	Signed(B256),
}

impl fmt::Display for DedupKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DedupKey::Stored(id) => write!(f, "stored:{}", id),
			DedupKey::Signed(digest) => {
				write!(f, "signed:{}", crate::truncate_hash(&digest.to_string()))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::address;

	fn stored(fulfilled: bool, cancelled: bool) -> StoredIntent {
		StoredIntent {
			id: IntentId(7),
			from_token: address!("0x1111111111111111111111111111111111111111"),
			to_token: address!("0x2222222222222222222222222222222222222222"),
			amount_in: U256::from(100u64),
			min_amount_out: U256::from(90u64),
			creator: address!("0x3333333333333333333333333333333333333333"),
			deadline: U256::from(1_700_000_000u64),
			fulfilled,
			cancelled,
		}
	}

	#[test]
	fn test_terminal_flags() {
		assert!(!stored(false, false).is_terminal());
		assert!(stored(true, false).is_terminal());
		assert!(stored(false, true).is_terminal());
	}

	#[test]
	fn test_absent_intent() {
		let mut intent = stored(false, false);
		assert!(!intent.is_absent());
		intent.id = IntentId::ABSENT;
		assert!(intent.is_absent());
	}

	#[test]
	fn test_terms_match_across_shapes() {
		let intent = stored(false, false);
		let signed = SignedSubmission::new(
			SwapIntent {
				fromToken: intent.from_token,
				toToken: intent.to_token,
				amountIn: intent.amount_in,
				minAmountOut: intent.min_amount_out,
				recipient: intent.creator,
				deadline: intent.deadline,
				nonce: U256::ZERO,
			},
			vec![0u8; 65],
		);

		assert_eq!(intent.terms(), signed.terms());
	}

	#[test]
	fn test_dedup_key_display() {
		assert_eq!(DedupKey::Stored(IntentId(3)).to_string(), "stored:#3");
		let key = DedupKey::Signed(B256::repeat_byte(0xab));
		assert_eq!(key.to_string(), "signed:0xabab...abab");
	}
}
