//! Relayer signing identity.
//!
//! The relayer's key signs two things: the fulfilment transactions it sends
//! to the ledger, and (for tooling) EIP-712 digests of signed intents.

use alloy::network::EthereumWallet;
use async_trait::async_trait;
use relayer_types::{Address, Bytes, B256};
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

pub use implementations::local::{create_account, LocalWallet};

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

#[async_trait]
pub trait AccountInterface: Send + Sync {
	fn address(&self) -> Address;

	/// Signs a 32-byte digest, returning `r ‖ s ‖ v` with `v` in {27, 28}.
	async fn sign_hash(&self, hash: &B256) -> Result<Bytes, AccountError>;

	/// Wallet used by the ledger provider to sign transactions.
	fn wallet(&self) -> EthereumWallet;
}
