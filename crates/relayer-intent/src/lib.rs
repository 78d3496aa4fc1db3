//! Intent checks that run before the relayer spends anything.
//!
//! - [`typed_data`] reproduces the ledger's EIP-712 digest and recovers signers.
//! - [`validator`] decides whether an intent is valid against ledger state.
//! - [`guard`] decides whether executing it now is economically acceptable,
//!   delegating the profitability rule to a [`ProfitabilityPolicy`].

pub mod guard;
pub mod typed_data;
pub mod validator;

pub mod implementations {
	pub mod policies;
}

pub use guard::{FeeQuote, GasGuard, ProfitabilityPolicy};
pub use implementations::policies::DefaultPolicy;
pub use typed_data::{SignatureError, TypedDataCodec};
pub use validator::Validator;
