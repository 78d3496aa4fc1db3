//! Built-in profitability policies.

use alloy::primitives::U256;
use relayer_types::{GuardRejection, IntentTerms};

use crate::ProfitabilityPolicy;

/// Rejects intents below a minimum size, and intents whose execution cost
/// exceeds a tenth of their input amount.
///
/// Input amounts are compared to native-asset costs unit for unit; no price
/// conversion between assets is attempted.
#[derive(Debug, Clone)]
pub struct DefaultPolicy {
	min_intent_size: U256,
}

impl DefaultPolicy {
	pub fn new(min_intent_size: U256) -> Self {
		Self { min_intent_size }
	}
}

impl ProfitabilityPolicy for DefaultPolicy {
	fn evaluate(&self, terms: &IntentTerms, estimated_cost: U256) -> Result<(), GuardRejection> {
		if terms.amount_in < self.min_intent_size {
			return Err(GuardRejection::BelowMinimumSize {
				amount_in: terms.amount_in,
				minimum: self.min_intent_size,
			});
		}

		let limit = terms.amount_in / U256::from(10u64);
		if estimated_cost > limit {
			return Err(GuardRejection::Unprofitable {
				estimated_cost,
				limit,
			});
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::Address;

	fn terms(amount_in: u64) -> IntentTerms {
		IntentTerms {
			from_token: Address::repeat_byte(1),
			to_token: Address::repeat_byte(2),
			amount_in: U256::from(amount_in),
			min_amount_out: U256::from(1u64),
			deadline: U256::MAX,
		}
	}

	#[test]
	fn test_minimum_size() {
		let policy = DefaultPolicy::new(U256::from(1_000u64));
		assert_eq!(
			policy.evaluate(&terms(999), U256::ZERO),
			Err(GuardRejection::BelowMinimumSize {
				amount_in: U256::from(999u64),
				minimum: U256::from(1_000u64),
			})
		);
		assert!(policy.evaluate(&terms(1_000), U256::ZERO).is_ok());
	}

	#[test]
	fn test_tenth_of_input_boundary() {
		let policy = DefaultPolicy::new(U256::ZERO);
		assert!(policy.evaluate(&terms(1_000), U256::from(100u64)).is_ok());
		assert_eq!(
			policy.evaluate(&terms(1_000), U256::from(101u64)),
			Err(GuardRejection::Unprofitable {
				estimated_cost: U256::from(101u64),
				limit: U256::from(100u64),
			})
		);
	}
}
