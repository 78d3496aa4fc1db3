//! Solidity bindings for the intent ledger contract.

use alloy::sol;

sol! {
	/// Intent record as returned by `getIntent`.
	#[derive(Debug, PartialEq, Eq)]
	struct Intent {
		uint256 id;
		address fromToken;
		address toToken;
		uint256 amountIn;
		uint256 minAmountOut;
		address creator;
		uint256 deadline;
		bool fulfilled;
		bool cancelled;
	}

	/// ABI shape of the signed swap message accepted by `executeSwap`.
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

	interface IIntentLedger {
		function getIntent(uint256 intentId) external view returns (Intent memory);
		function nextIntentId() external view returns (uint256);
		function userIntents(address user) external view returns (uint256[] memory);
		function nonces(address user) external view returns (uint256);
		function authorizedFulfillers(address fulfiller) external view returns (bool);
		function paused() external view returns (bool);
		function feeBps() external view returns (uint256);
		function feeRecipient() external view returns (address);

		function fulfillIntent(uint256 intentId) external;
		function executeSwap(SwapIntent calldata intent, bytes calldata signature) external;

		event IntentCreated(
			uint256 indexed intentId,
			address indexed creator,
			address fromToken,
			address toToken,
			uint256 amountIn,
			uint256 minAmountOut,
			uint256 deadline
		);
		event IntentFulfilled(uint256 indexed intentId, address indexed fulfiller, uint256 amountOut);
		event IntentCancelled(uint256 indexed intentId);
	}
}

impl From<&relayer_types::SwapIntent> for SwapIntent {
	fn from(intent: &relayer_types::SwapIntent) -> Self {
		Self {
			fromToken: intent.fromToken,
			toToken: intent.toToken,
			amountIn: intent.amountIn,
			minAmountOut: intent.minAmountOut,
			recipient: intent.recipient,
			deadline: intent.deadline,
			nonce: intent.nonce,
		}
	}
}
