//! Validity checks for stored and signed intents.
//!
//! Checks run in a fixed order and stop at the first failure: structure,
//! deadline, terminal state, then (signed intents only) nonce and signature.
//! The validator reads nothing itself; callers pass the ledger state they
//! just fetched.

use alloy::primitives::{Address, B256, U256};
use relayer_types::{DedupKey, DedupRegistry, SignedSubmission, StoredIntent, ValidationError};

use crate::TypedDataCodec;

pub struct Validator {
	codec: TypedDataCodec,
}

impl Validator {
	pub fn new(codec: TypedDataCodec) -> Self {
		Self { codec }
	}

	pub fn codec(&self) -> &TypedDataCodec {
		&self.codec
	}

	/// Validates a stored intent as just read from the ledger.
	pub fn validate_stored(&self, intent: &StoredIntent, now: u64) -> Result<(), ValidationError> {
		if intent.is_absent() {
			return Err(ValidationError::StructuralInvalid(
				"intent not found".to_string(),
			));
		}
		check_structure(
			&[("creator", intent.creator)],
			intent.from_token,
			intent.to_token,
			intent.amount_in,
			intent.min_amount_out,
		)?;
		check_deadline(intent.deadline, now)?;

		if intent.is_terminal() {
			return Err(ValidationError::AlreadyTerminal);
		}

		Ok(())
	}

	/// Validates a signed intent and returns its EIP-712 digest.
	///
	/// `ledger_nonce` is the recipient's current nonce on the ledger.
	pub fn validate_signed(
		&self,
		submission: &SignedSubmission,
		ledger_nonce: U256,
		registry: &DedupRegistry,
		now: u64,
	) -> Result<B256, ValidationError> {
		let intent = &submission.intent;

		check_structure(
			&[("recipient", intent.recipient)],
			intent.fromToken,
			intent.toToken,
			intent.amountIn,
			intent.minAmountOut,
		)?;
		check_deadline(intent.deadline, now)?;

		let digest = self.codec.digest(intent);
		if registry.contains(&DedupKey::Signed(digest)) {
			return Err(ValidationError::AlreadyTerminal);
		}

		if intent.nonce != ledger_nonce {
			return Err(ValidationError::NonceMismatch {
				provided: intent.nonce,
				expected: ledger_nonce,
			});
		}

		match TypedDataCodec::recover_signer(&digest, &submission.signature) {
			Ok(signer) if signer == intent.recipient => Ok(digest),
			Ok(signer) => {
				tracing::debug!(%signer, recipient = %intent.recipient, "Signer does not match recipient");
				Err(ValidationError::InvalidSignature)
			}
			Err(e) => {
				tracing::debug!(error = %e, "Unusable signature");
				Err(ValidationError::InvalidSignature)
			}
		}
	}
}

fn check_structure(
	parties: &[(&str, Address)],
	from_token: Address,
	to_token: Address,
	amount_in: U256,
	min_amount_out: U256,
) -> Result<(), ValidationError> {
	let invalid = |reason: String| Err(ValidationError::StructuralInvalid(reason));

	for (name, address) in parties
		.iter()
		.chain(&[("fromToken", from_token), ("toToken", to_token)])
	{
		if address.is_zero() {
			return invalid(format!("{} is the zero address", name));
		}
	}
	if from_token == to_token {
		return invalid("fromToken equals toToken".to_string());
	}
	if amount_in.is_zero() {
		return invalid("amountIn is zero".to_string());
	}
	if min_amount_out.is_zero() {
		return invalid("minAmountOut is zero".to_string());
	}
	Ok(())
}

fn check_deadline(deadline: U256, now: u64) -> Result<(), ValidationError> {
	if deadline > U256::from(now) {
		Ok(())
	} else {
		Err(ValidationError::Expired { deadline, now })
	}
}
