//! EIP-712 encoding of signed swap intents.
//!
//! The digest must be byte-identical to the one the ledger's verifier
//! computes, otherwise every signature is rejected on-chain. The domain binds
//! a signature to the protocol name and version, the chain and the ledger
//! contract; the struct hash covers all seven intent fields in declaration
//! order.

use alloy::primitives::{b256, Address, Signature, B256, U256};
use alloy::sol_types::{eip712_domain, Eip712Domain, SolStruct};
use relayer_account::{AccountError, AccountInterface};
use relayer_types::{Bytes, SwapIntent};
use thiserror::Error;

/// Protocol name in the ledger's EIP-712 domain.
pub const DOMAIN_NAME: &str = "IntentSwap";
/// Protocol version in the ledger's EIP-712 domain.
pub const DOMAIN_VERSION: &str = "1";

/// Half the secp256k1 group order; signatures with a larger `s` are malleable.
const SECP256K1_HALF_ORDER: B256 =
	b256!("0x7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0");

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
	#[error("Signature must be 65 bytes, got {0}")]
	InvalidLength(usize),
	#[error("Unsupported recovery id {0}")]
	InvalidRecoveryId(u8),
	#[error("Signature s value is in the upper half of the curve order")]
	Malleable,
	#[error("Signer recovery failed: {0}")]
	Recovery(String),
}

/// Computes domain separator, struct hashes and digests for one ledger.
#[derive(Debug, Clone)]
pub struct TypedDataCodec {
	domain: Eip712Domain,
	separator: B256,
}

impl TypedDataCodec {
	pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
		let domain = eip712_domain! {
			name: DOMAIN_NAME,
			version: DOMAIN_VERSION,
			chain_id: chain_id,
			verifying_contract: verifying_contract,
		};
		let separator = domain.separator();
		Self { domain, separator }
	}

	pub fn domain(&self) -> &Eip712Domain {
		&self.domain
	}

	pub fn domain_separator(&self) -> B256 {
		self.separator
	}

	/// `keccak256(typeHash ‖ encodeData(intent))`.
	pub fn struct_hash(intent: &SwapIntent) -> B256 {
		intent.eip712_hash_struct()
	}

	/// `keccak256(0x1901 ‖ domainSeparator ‖ structHash)`.
	pub fn digest(&self, intent: &SwapIntent) -> B256 {
		intent.eip712_signing_hash(&self.domain)
	}

	/// Recovers the address that produced `signature` over `digest`.
	///
	/// Accepts `r ‖ s ‖ v` with `v` in {0, 1, 27, 28} and a low `s`.
	pub fn recover_signer(digest: &B256, signature: &[u8]) -> Result<Address, SignatureError> {
		if signature.len() != 65 {
			return Err(SignatureError::InvalidLength(signature.len()));
		}

		let v = signature[64];
		if !matches!(v, 0 | 1 | 27 | 28) {
			return Err(SignatureError::InvalidRecoveryId(v));
		}

		let s = U256::from_be_slice(&signature[32..64]);
		if s > U256::from_be_bytes(SECP256K1_HALF_ORDER.0) {
			return Err(SignatureError::Malleable);
		}

		let signature =
			Signature::from_raw(signature).map_err(|e| SignatureError::Recovery(e.to_string()))?;
		signature
			.recover_address_from_prehash(digest)
			.map_err(|e| SignatureError::Recovery(e.to_string()))
	}

	/// Signs `intent` for this domain with the given account.
	pub async fn sign(
		&self,
		intent: &SwapIntent,
		account: &dyn AccountInterface,
	) -> Result<Bytes, AccountError> {
		account.sign_hash(&self.digest(intent)).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{address, keccak256};
	use alloy::sol_types::SolValue;
	use relayer_account::LocalWallet;

	const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
	const LEDGER: Address = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");

	fn intent(recipient: Address) -> SwapIntent {
		SwapIntent {
			fromToken: address!("0x1111111111111111111111111111111111111111"),
			toToken: address!("0x2222222222222222222222222222222222222222"),
			amountIn: U256::from(100u64),
			minAmountOut: U256::from(90u64),
			recipient,
			deadline: U256::from(1_900_000_000u64),
			nonce: U256::ZERO,
		}
	}

	#[test]
	fn test_domain_separator_matches_manual_encoding() {
		let codec = TypedDataCodec::new(31337, LEDGER);

		let type_hash = keccak256(
			"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
		);
		let expected = keccak256(
			(
				type_hash,
				keccak256(DOMAIN_NAME),
				keccak256(DOMAIN_VERSION),
				U256::from(31337u64),
				LEDGER,
			)
				.abi_encode(),
		);

		assert_eq!(codec.domain_separator(), expected);
	}

	#[test]
	fn test_struct_hash_matches_manual_encoding() {
		let intent = intent(Address::repeat_byte(0x33));
		let type_hash = keccak256(
			"SwapIntent(address fromToken,address toToken,uint256 amountIn,uint256 minAmountOut,address recipient,uint256 deadline,uint256 nonce)",
		);
		let expected = keccak256(
			(
				type_hash,
				intent.fromToken,
				intent.toToken,
				intent.amountIn,
				intent.minAmountOut,
				intent.recipient,
				intent.deadline,
				intent.nonce,
			)
				.abi_encode(),
		);

		assert_eq!(TypedDataCodec::struct_hash(&intent), expected);
	}

	#[test]
	fn test_digest_matches_manual_encoding() {
		let codec = TypedDataCodec::new(1, LEDGER);
		let intent = intent(Address::repeat_byte(0x33));

		let mut preimage = vec![0x19, 0x01];
		preimage.extend_from_slice(codec.domain_separator().as_slice());
		preimage.extend_from_slice(TypedDataCodec::struct_hash(&intent).as_slice());

		assert_eq!(codec.digest(&intent), keccak256(preimage));
	}

	#[test]
	fn test_domain_changes_digest() {
		let intent = intent(Address::repeat_byte(0x33));
		let base = TypedDataCodec::new(1, LEDGER).digest(&intent);

		assert_ne!(base, TypedDataCodec::new(2, LEDGER).digest(&intent));
		assert_ne!(
			base,
			TypedDataCodec::new(1, Address::repeat_byte(0x44)).digest(&intent)
		);
	}

	#[tokio::test]
	async fn test_sign_and_recover() {
		let wallet = LocalWallet::new(KEY).unwrap();
		let codec = TypedDataCodec::new(31337, LEDGER);
		let intent = intent(wallet.address());

		let signature = codec.sign(&intent, &wallet).await.unwrap();
		let recovered = TypedDataCodec::recover_signer(&codec.digest(&intent), &signature).unwrap();
		assert_eq!(recovered, wallet.address());

		let mut zero_based = signature.to_vec();
		zero_based[64] -= 27;
		let recovered = TypedDataCodec::recover_signer(&codec.digest(&intent), &zero_based).unwrap();
		assert_eq!(recovered, wallet.address());
	}

	#[test]
	fn test_malformed_signatures() {
		let digest = B256::repeat_byte(1);

		assert_eq!(
			TypedDataCodec::recover_signer(&digest, &[0u8; 64]),
			Err(SignatureError::InvalidLength(64))
		);

		let mut bad_v = [1u8; 65];
		bad_v[64] = 29;
		assert_eq!(
			TypedDataCodec::recover_signer(&digest, &bad_v),
			Err(SignatureError::InvalidRecoveryId(29))
		);

		let mut high_s = [0u8; 65];
		high_s[0] = 1;
		high_s[32] = 0xff;
		high_s[64] = 27;
		assert_eq!(
			TypedDataCodec::recover_signer(&digest, &high_s),
			Err(SignatureError::Malleable)
		);
	}
}
