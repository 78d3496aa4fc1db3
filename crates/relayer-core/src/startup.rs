//! Checks run once before the relayer starts working.

use relayer_ledger::{LedgerError, LedgerInterface};
use relayer_types::{Address, FatalInit, U256};
use tracing::{info, warn};

/// Ledger facts gathered by [`preflight`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatus {
	pub chain_id: u64,
	pub balance: U256,
	pub authorized: bool,
	pub paused: bool,
	pub fee_bps: U256,
	pub fee_recipient: Address,
}

fn unreachable(error: LedgerError) -> FatalInit {
	FatalInit::Unreachable(error.to_string())
}

/// Verifies the endpoint, the contract and the relayer's funds.
///
/// A missing fulfiller authorization or a paused ledger only warns: stored
/// intent fulfilments will revert until it changes, signed swaps still work.
pub async fn preflight(ledger: &dyn LedgerInterface) -> Result<LedgerStatus, FatalInit> {
	let chain_id = ledger.chain_id().await.map_err(unreachable)?;
	let contract = ledger.contract_address();
	let relayer = ledger.relayer_address();

	if !ledger.has_code().await.map_err(unreachable)? {
		return Err(FatalInit::ContractNotFound(contract));
	}

	let balance = ledger.balance_of(relayer).await.map_err(unreachable)?;
	if balance.is_zero() {
		return Err(FatalInit::InsufficientBalance {
			address: relayer,
			balance,
		});
	}

	let authorized = ledger
		.is_authorized_fulfiller(relayer)
		.await
		.map_err(unreachable)?;
	if !authorized {
		warn!(%relayer, "Relayer is not an authorized fulfiller; stored intent fulfilments will revert");
	}

	let paused = ledger.paused().await.map_err(unreachable)?;
	if paused {
		warn!(%contract, "Ledger is paused");
	}

	let fee_bps = ledger.fee_bps().await.map_err(unreachable)?;
	let fee_recipient = ledger.fee_recipient().await.map_err(unreachable)?;

	info!(
		chain_id,
		%contract,
		%relayer,
		%balance,
		%fee_bps,
		%fee_recipient,
		"Ledger preflight passed"
	);

	Ok(LedgerStatus {
		chain_id,
		balance,
		authorized,
		paused,
		fee_bps,
		fee_recipient,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_ledger::MemoryLedger;

	fn ledger() -> MemoryLedger {
		MemoryLedger::new(Address::repeat_byte(0xaa), Address::repeat_byte(0xbb))
	}

	#[tokio::test]
	async fn test_healthy_ledger_passes() {
		let status = preflight(&ledger()).await.unwrap();
		assert_eq!(status.chain_id, 31337);
		assert!(status.authorized);
		assert!(!status.paused);
		assert_eq!(status.fee_bps, U256::from(30u64));
	}

	#[tokio::test]
	async fn test_missing_contract_is_fatal() {
		let ledger = ledger();
		ledger.set_has_code(false).await;
		assert!(matches!(
			preflight(&ledger).await,
			Err(FatalInit::ContractNotFound(address)) if address == Address::repeat_byte(0xaa)
		));
	}

	#[tokio::test]
	async fn test_empty_balance_is_fatal() {
		let ledger = ledger();
		ledger.set_balance(Address::repeat_byte(0xbb), U256::ZERO).await;
		assert!(matches!(
			preflight(&ledger).await,
			Err(FatalInit::InsufficientBalance { .. })
		));
	}

	#[tokio::test]
	async fn test_unauthorized_and_paused_only_warn() {
		let ledger = ledger();
		ledger.set_authorized(Address::repeat_byte(0xbb), false).await;
		ledger.set_paused(true).await;

		let status = preflight(&ledger).await.unwrap();
		assert!(!status.authorized);
		assert!(status.paused);
	}
}
