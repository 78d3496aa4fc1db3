//! Fee ceiling and profitability gate.
//!
//! The guard never talks to the network. The caller supplies the current fee
//! level and, when available, a gas estimate for the fulfilment call.

use alloy::primitives::U256;
use relayer_types::{GuardRejection, IntentTerms};

/// Decides whether an intent is worth its execution cost.
///
/// Implementations are heuristics. None of them protects against
/// adversarial transaction ordering.
pub trait ProfitabilityPolicy: Send + Sync {
	fn evaluate(&self, terms: &IntentTerms, estimated_cost: U256) -> Result<(), GuardRejection>;
}

/// Fee figures the guard approved an intent under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
	/// Fee level in wei per gas unit.
	pub gas_price: u128,
	/// Gas units the submission is budgeted for.
	pub gas_limit: u64,
	/// `gas_price * gas_limit`, in wei.
	pub estimated_cost: U256,
}

pub struct GasGuard {
	max_gas_price: u128,
	default_gas_estimate: u64,
	policy: Box<dyn ProfitabilityPolicy>,
}

impl GasGuard {
	pub fn new(
		max_gas_price: u128,
		default_gas_estimate: u64,
		policy: Box<dyn ProfitabilityPolicy>,
	) -> Self {
		Self {
			max_gas_price,
			default_gas_estimate,
			policy,
		}
	}

	/// Ceiling in wei per gas unit.
	pub fn max_gas_price(&self) -> u128 {
		self.max_gas_price
	}

	/// Rejects a fee level above the ceiling. Equal to the ceiling passes.
	pub fn check_fee_level(&self, fee_level: u128) -> Result<(), GuardRejection> {
		if fee_level > self.max_gas_price {
			return Err(GuardRejection::GasPriceExceeded {
				fee_level,
				ceiling: self.max_gas_price,
			});
		}
		Ok(())
	}

	/// Checks the ceiling, prices the call and applies the policy.
	///
	/// `gas_estimate` is `None` when dynamic estimation failed; the configured
	/// default is used instead.
	pub fn evaluate(
		&self,
		terms: &IntentTerms,
		fee_level: u128,
		gas_estimate: Option<u64>,
	) -> Result<FeeQuote, GuardRejection> {
		self.check_fee_level(fee_level)?;

		let gas_limit = gas_estimate.unwrap_or(self.default_gas_estimate);
		let estimated_cost = U256::from(fee_level) * U256::from(gas_limit);

		self.policy.evaluate(terms, estimated_cost)?;

		Ok(FeeQuote {
			gas_price: fee_level,
			gas_limit,
			estimated_cost,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::DefaultPolicy;
	use alloy::primitives::{utils::parse_ether, Address};

	const GWEI: u128 = 1_000_000_000;

	fn guard() -> GasGuard {
		GasGuard::new(
			50 * GWEI,
			500_000,
			Box::new(DefaultPolicy::new(parse_ether("0.001").unwrap())),
		)
	}

	fn terms(amount_in: &str) -> IntentTerms {
		IntentTerms {
			from_token: Address::repeat_byte(1),
			to_token: Address::repeat_byte(2),
			amount_in: parse_ether(amount_in).unwrap(),
			min_amount_out: U256::from(1u64),
			deadline: U256::MAX,
		}
	}

	#[test]
	fn test_fee_above_ceiling_rejected() {
		assert_eq!(
			guard().evaluate(&terms("10"), 60 * GWEI, Some(100_000)),
			Err(GuardRejection::GasPriceExceeded {
				fee_level: 60 * GWEI,
				ceiling: 50 * GWEI,
			})
		);
	}

	#[test]
	fn test_fee_at_ceiling_accepted() {
		let quote = guard()
			.evaluate(&terms("10"), 50 * GWEI, Some(100_000))
			.unwrap();
		assert_eq!(quote.gas_limit, 100_000);
		assert_eq!(quote.estimated_cost, U256::from(50 * GWEI * 100_000));
	}

	#[test]
	fn test_default_estimate_used_on_failure() {
		let quote = guard().evaluate(&terms("10"), GWEI, None).unwrap();
		assert_eq!(quote.gas_limit, 500_000);
		assert_eq!(quote.estimated_cost, U256::from(GWEI * 500_000));
	}

	#[test]
	fn test_policy_applied_to_cost() {
		// 0.01 native at 50 gwei * 500k gas = 0.025 native, above a tenth of 0.01
		assert!(matches!(
			guard().evaluate(&terms("0.01"), 50 * GWEI, None),
			Err(GuardRejection::Unprofitable { .. })
		));
	}
}
