//! JSON representation of a signed intent.
//!
//! Numeric fields are strings (decimal or `0x` hex) so 256-bit values survive
//! JSON clients that only have doubles.

use relayer_types::{Address, Bytes, SignedSubmission, SwapIntent, U256};
use serde::{Deserialize, Serialize};

use crate::DiscoveryError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedIntentPayload {
	pub from_token: String,
	pub to_token: String,
	pub amount_in: String,
	pub min_amount_out: String,
	pub recipient: String,
	pub deadline: String,
	pub nonce: String,
	/// 65-byte `r ‖ s ‖ v` signature, hex encoded.
	pub signature: String,
}

fn address(field: &str, value: &str) -> Result<Address, DiscoveryError> {
	value
		.parse()
		.map_err(|e| DiscoveryError::InvalidPayload(format!("{} '{}': {}", field, value, e)))
}

fn uint(field: &str, value: &str) -> Result<U256, DiscoveryError> {
	value
		.parse()
		.map_err(|e| DiscoveryError::InvalidPayload(format!("{} '{}': {}", field, value, e)))
}

impl TryFrom<SignedIntentPayload> for SignedSubmission {
	type Error = DiscoveryError;

	fn try_from(payload: SignedIntentPayload) -> Result<Self, Self::Error> {
		let intent = SwapIntent {
			fromToken: address("fromToken", &payload.from_token)?,
			toToken: address("toToken", &payload.to_token)?,
			amountIn: uint("amountIn", &payload.amount_in)?,
			minAmountOut: uint("minAmountOut", &payload.min_amount_out)?,
			recipient: address("recipient", &payload.recipient)?,
			deadline: uint("deadline", &payload.deadline)?,
			nonce: uint("nonce", &payload.nonce)?,
		};
		let signature: Bytes = payload.signature.parse().map_err(|e| {
			DiscoveryError::InvalidPayload(format!("signature '{}': {}", payload.signature, e))
		})?;

		Ok(SignedSubmission::new(intent, signature))
	}
}

impl From<&SignedSubmission> for SignedIntentPayload {
	fn from(submission: &SignedSubmission) -> Self {
		let intent = &submission.intent;
		Self {
			from_token: intent.fromToken.to_string(),
			to_token: intent.toToken.to_string(),
			amount_in: intent.amountIn.to_string(),
			min_amount_out: intent.minAmountOut.to_string(),
			recipient: intent.recipient.to_string(),
			deadline: intent.deadline.to_string(),
			nonce: intent.nonce.to_string(),
			signature: submission.signature.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_parse_camel_case_payload() {
		let payload: SignedIntentPayload = serde_json::from_value(json!({
			"fromToken": "0x1111111111111111111111111111111111111111",
			"toToken": "0x2222222222222222222222222222222222222222",
			"amountIn": "100",
			"minAmountOut": "0x5a",
			"recipient": "0x3333333333333333333333333333333333333333",
			"deadline": "1900000000",
			"nonce": "0",
			"signature": format!("0x{}", "11".repeat(65)),
		}))
		.unwrap();

		let submission = SignedSubmission::try_from(payload).unwrap();
		assert_eq!(submission.intent.amountIn, U256::from(100u64));
		assert_eq!(submission.intent.minAmountOut, U256::from(90u64));
		assert_eq!(submission.signature.len(), 65);
	}

	#[test]
	fn test_bad_address_named_in_error() {
		let payload = SignedIntentPayload {
			from_token: "0x11".into(),
			to_token: "0x2222222222222222222222222222222222222222".into(),
			amount_in: "1".into(),
			min_amount_out: "1".into(),
			recipient: "0x3333333333333333333333333333333333333333".into(),
			deadline: "1".into(),
			nonce: "0".into(),
			signature: "0x".into(),
		};

		match SignedSubmission::try_from(payload) {
			Err(DiscoveryError::InvalidPayload(message)) => assert!(message.starts_with("fromToken")),
			other => panic!("unexpected result: {:?}", other),
		}
	}
}
