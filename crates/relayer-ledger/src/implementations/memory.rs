//! In-process ledger for tests and local dry runs.
//!
//! Mirrors the contract rules the relayer depends on: stored intents become
//! fulfilled once, signed swaps consume the recipient's nonce, and a
//! transaction is only accepted with the exact next sequence number. Signed
//! intent signatures are not verified here.

use crate::{IntentEvent, LedgerCall, LedgerError, LedgerInterface};
use alloy::primitives::keccak256;
use async_trait::async_trait;
use relayer_types::{Address, IntentId, StoredIntent, TxHash, TxReceipt, U256};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tokio::sync::Mutex;

/// A transaction accepted by the [`MemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
	pub call: LedgerCall,
	pub sequence: u64,
	pub gas_price: u128,
	pub tx_hash: TxHash,
}

/// Injected result for the next submission.
#[derive(Debug, Clone)]
enum SubmitFault {
	Error(LedgerError),
	Revert,
}

struct MemoryState {
	chain_id: u64,
	intents: BTreeMap<u64, StoredIntent>,
	next_intent_id: u64,
	nonces: HashMap<Address, U256>,
	authorized: HashSet<Address>,
	paused: bool,
	fee_bps: U256,
	fee_recipient: Address,
	has_code: bool,
	balances: HashMap<Address, U256>,
	gas_price: u128,
	gas_estimate: Option<u64>,
	sequence: u64,
	block: u64,
	events: Vec<(u64, IntentEvent)>,
	submissions: Vec<Submission>,
	receipts: HashMap<TxHash, TxReceipt>,
	faults: VecDeque<SubmitFault>,
	receipt_fault: Option<LedgerError>,
}

/// Ledger double holding all state in memory.
pub struct MemoryLedger {
	contract: Address,
	relayer: Address,
	state: Mutex<MemoryState>,
}

fn now() -> u64 {
	chrono::Utc::now().timestamp().max(0) as u64
}

impl MemoryLedger {
	/// Creates an unpaused ledger where `relayer` is funded and authorized.
	pub fn new(contract: Address, relayer: Address) -> Self {
		let mut balances = HashMap::new();
		balances.insert(relayer, U256::from(10u64).pow(U256::from(18u64)));

		Self {
			contract,
			relayer,
			state: Mutex::new(MemoryState {
				chain_id: 31337,
				intents: BTreeMap::new(),
				next_intent_id: 1,
				nonces: HashMap::new(),
				authorized: HashSet::from([relayer]),
				paused: false,
				fee_bps: U256::from(30u64),
				fee_recipient: Address::ZERO,
				has_code: true,
				balances,
				gas_price: 1_000_000_000,
				gas_estimate: Some(150_000),
				sequence: 0,
				block: 1,
				events: Vec::new(),
				submissions: Vec::new(),
				receipts: HashMap::new(),
				faults: VecDeque::new(),
				receipt_fault: None,
			}),
		}
	}

	/// Records a new stored intent and emits its creation event.
	pub async fn create_intent(
		&self,
		creator: Address,
		from_token: Address,
		to_token: Address,
		amount_in: U256,
		min_amount_out: U256,
		deadline: U256,
	) -> IntentId {
		let mut state = self.state.lock().await;
		let id = IntentId(state.next_intent_id);
		state.next_intent_id += 1;
		state.intents.insert(
			id.0,
			StoredIntent {
				id,
				from_token,
				to_token,
				amount_in,
				min_amount_out,
				creator,
				deadline,
				fulfilled: false,
				cancelled: false,
			},
		);
		state.block += 1;
		let block = state.block;
		state.events.push((block, IntentEvent::Created { id, creator }));
		id
	}

	pub async fn cancel_intent(&self, id: IntentId) {
		let mut state = self.state.lock().await;
		if let Some(intent) = state.intents.get_mut(&id.0) {
			if !intent.is_terminal() {
				intent.cancelled = true;
				state.block += 1;
				let block = state.block;
				state.events.push((block, IntentEvent::Cancelled { id }));
			}
		}
	}

	pub async fn set_gas_price(&self, gas_price: u128) {
		self.state.lock().await.gas_price = gas_price;
	}

	/// `None` makes every estimate fail.
	pub async fn set_gas_estimate(&self, estimate: Option<u64>) {
		self.state.lock().await.gas_estimate = estimate;
	}

	pub async fn set_nonce(&self, user: Address, nonce: U256) {
		self.state.lock().await.nonces.insert(user, nonce);
	}

	pub async fn set_paused(&self, paused: bool) {
		self.state.lock().await.paused = paused;
	}

	pub async fn set_authorized(&self, fulfiller: Address, authorized: bool) {
		let mut state = self.state.lock().await;
		if authorized {
			state.authorized.insert(fulfiller);
		} else {
			state.authorized.remove(&fulfiller);
		}
	}

	pub async fn set_balance(&self, account: Address, balance: U256) {
		self.state.lock().await.balances.insert(account, balance);
	}

	pub async fn set_has_code(&self, has_code: bool) {
		self.state.lock().await.has_code = has_code;
	}

	/// Moves the relayer's sequence as if it had sent transactions elsewhere.
	pub async fn set_sequence(&self, sequence: u64) {
		self.state.lock().await.sequence = sequence;
	}

	/// The next submission fails with `error` before reaching the ledger.
	pub async fn fail_next_submit(&self, error: LedgerError) {
		self.state
			.lock()
			.await
			.faults
			.push_back(SubmitFault::Error(error));
	}

	/// The next submission is mined but reverts.
	pub async fn revert_next_submit(&self) {
		self.state.lock().await.faults.push_back(SubmitFault::Revert);
	}

	/// The next receipt wait fails with `error`.
	pub async fn fail_next_receipt(&self, error: LedgerError) {
		self.state.lock().await.receipt_fault = Some(error);
	}

	pub async fn submissions(&self) -> Vec<Submission> {
		self.state.lock().await.submissions.clone()
	}

	pub async fn intent(&self, id: IntentId) -> Option<StoredIntent> {
		self.state.lock().await.intents.get(&id.0).cloned()
	}

	fn apply(state: &mut MemoryState, relayer: Address, call: &LedgerCall) -> bool {
		let now = U256::from(now());
		match call {
			LedgerCall::FulfillIntent(id) => {
				if state.paused || !state.authorized.contains(&relayer) {
					return false;
				}
				let Some(intent) = state.intents.get_mut(&id.0) else {
					return false;
				};
				if intent.is_terminal() || intent.deadline <= now {
					return false;
				}
				intent.fulfilled = true;
				state
					.events
					.push((state.block, IntentEvent::Fulfilled { id: *id }));
				true
			}
			LedgerCall::ExecuteSwap(submission) => {
				let intent = &submission.intent;
				let current = state
					.nonces
					.get(&intent.recipient)
					.copied()
					.unwrap_or_default();
				if state.paused || intent.nonce != current || intent.deadline <= now {
					return false;
				}
				state.nonces.insert(intent.recipient, current + U256::from(1u64));
				true
			}
		}
	}
}

#[async_trait]
impl LedgerInterface for MemoryLedger {
	fn contract_address(&self) -> Address {
		self.contract
	}

	fn relayer_address(&self) -> Address {
		self.relayer
	}

	async fn chain_id(&self) -> Result<u64, LedgerError> {
		Ok(self.state.lock().await.chain_id)
	}

	async fn get_intent(&self, id: IntentId) -> Result<StoredIntent, LedgerError> {
		let state = self.state.lock().await;
		Ok(state.intents.get(&id.0).cloned().unwrap_or(StoredIntent {
			id: IntentId::ABSENT,
			from_token: Address::ZERO,
			to_token: Address::ZERO,
			amount_in: U256::ZERO,
			min_amount_out: U256::ZERO,
			creator: Address::ZERO,
			deadline: U256::ZERO,
			fulfilled: false,
			cancelled: false,
		}))
	}

	async fn next_intent_id(&self) -> Result<u64, LedgerError> {
		Ok(self.state.lock().await.next_intent_id)
	}

	async fn user_intents(&self, user: Address) -> Result<Vec<IntentId>, LedgerError> {
		let state = self.state.lock().await;
		Ok(state
			.intents
			.values()
			.filter(|intent| intent.creator == user)
			.map(|intent| intent.id)
			.collect())
	}

	async fn nonce_of(&self, user: Address) -> Result<U256, LedgerError> {
		Ok(self
			.state
			.lock()
			.await
			.nonces
			.get(&user)
			.copied()
			.unwrap_or_default())
	}

	async fn is_authorized_fulfiller(&self, fulfiller: Address) -> Result<bool, LedgerError> {
		Ok(self.state.lock().await.authorized.contains(&fulfiller))
	}

	async fn paused(&self) -> Result<bool, LedgerError> {
		Ok(self.state.lock().await.paused)
	}

	async fn fee_bps(&self) -> Result<U256, LedgerError> {
		Ok(self.state.lock().await.fee_bps)
	}

	async fn fee_recipient(&self) -> Result<Address, LedgerError> {
		Ok(self.state.lock().await.fee_recipient)
	}

	async fn has_code(&self) -> Result<bool, LedgerError> {
		Ok(self.state.lock().await.has_code)
	}

	async fn balance_of(&self, account: Address) -> Result<U256, LedgerError> {
		Ok(self
			.state
			.lock()
			.await
			.balances
			.get(&account)
			.copied()
			.unwrap_or_default())
	}

	async fn gas_price(&self) -> Result<u128, LedgerError> {
		Ok(self.state.lock().await.gas_price)
	}

	async fn estimate_gas(&self, call: &LedgerCall) -> Result<u64, LedgerError> {
		self.state
			.lock()
			.await
			.gas_estimate
			.ok_or_else(|| LedgerError::Rejected(format!("{} estimate failed", call.name())))
	}

	async fn pending_sequence(&self) -> Result<u64, LedgerError> {
		Ok(self.state.lock().await.sequence)
	}

	async fn submit(
		&self,
		call: &LedgerCall,
		sequence: u64,
		gas_price: u128,
		_gas_limit: u64,
	) -> Result<TxHash, LedgerError> {
		let mut state = self.state.lock().await;

		let fault = state.faults.pop_front();
		if let Some(SubmitFault::Error(error)) = fault {
			return Err(error);
		}

		if sequence < state.sequence {
			return Err(LedgerError::SequenceMismatch(format!(
				"nonce too low: next nonce {}, tx nonce {}",
				state.sequence, sequence
			)));
		}
		if sequence > state.sequence {
			return Err(LedgerError::SequenceMismatch(format!(
				"nonce too high: next nonce {}, tx nonce {}",
				state.sequence, sequence
			)));
		}

		let mut preimage = sequence.to_be_bytes().to_vec();
		preimage.extend_from_slice(&call.calldata());
		let tx_hash = keccak256(&preimage);

		state.sequence += 1;
		state.block += 1;
		let success = match fault {
			Some(SubmitFault::Revert) => false,
			_ => Self::apply(&mut state, self.relayer, call),
		};

		let block_number = state.block;
		state.receipts.insert(
			tx_hash,
			TxReceipt {
				hash: tx_hash,
				block_number,
				success,
				gas_used: 120_000,
			},
		);
		state.submissions.push(Submission {
			call: call.clone(),
			sequence,
			gas_price,
			tx_hash,
		});

		Ok(tx_hash)
	}

	async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TxReceipt, LedgerError> {
		let mut state = self.state.lock().await;
		if let Some(error) = state.receipt_fault.take() {
			return Err(error);
		}
		state
			.receipts
			.get(&tx_hash)
			.cloned()
			.ok_or(LedgerError::ReceiptTimeout(tx_hash))
	}

	async fn block_number(&self) -> Result<u64, LedgerError> {
		Ok(self.state.lock().await.block)
	}

	async fn intent_events(
		&self,
		from_block: u64,
		to_block: u64,
	) -> Result<Vec<IntentEvent>, LedgerError> {
		let state = self.state.lock().await;
		Ok(state
			.events
			.iter()
			.filter(|(block, _)| *block >= from_block && *block <= to_block)
			.map(|(_, event)| event.clone())
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use relayer_types::{SignedSubmission, SwapIntent};

	fn addr(byte: u8) -> Address {
		Address::repeat_byte(byte)
	}

	fn future() -> U256 {
		U256::from(now() + 3600)
	}

	async fn ledger_with_intent() -> (MemoryLedger, IntentId) {
		let ledger = MemoryLedger::new(addr(0xaa), addr(0xbb));
		let id = ledger
			.create_intent(addr(1), addr(2), addr(3), U256::from(100), U256::from(90), future())
			.await;
		(ledger, id)
	}

	#[tokio::test]
	async fn test_fulfil_once() {
		let (ledger, id) = ledger_with_intent().await;
		let call = LedgerCall::FulfillIntent(id);

		let hash = ledger.submit(&call, 0, 1, 200_000).await.unwrap();
		assert!(ledger.wait_for_receipt(hash).await.unwrap().success);
		assert!(ledger.get_intent(id).await.unwrap().fulfilled);

		let hash = ledger.submit(&call, 1, 1, 200_000).await.unwrap();
		assert!(!ledger.wait_for_receipt(hash).await.unwrap().success);
	}

	#[tokio::test]
	async fn test_sequence_must_match() {
		let (ledger, id) = ledger_with_intent().await;
		ledger.set_sequence(3).await;

		let result = ledger.submit(&LedgerCall::FulfillIntent(id), 2, 1, 200_000).await;
		assert!(matches!(result, Err(LedgerError::SequenceMismatch(_))));
		assert!(ledger.submissions().await.is_empty());
	}

	#[tokio::test]
	async fn test_swap_consumes_nonce() {
		let ledger = MemoryLedger::new(addr(0xaa), addr(0xbb));
		let intent = SwapIntent {
			fromToken: addr(2),
			toToken: addr(3),
			amountIn: U256::from(100),
			minAmountOut: U256::from(90),
			recipient: addr(1),
			deadline: future(),
			nonce: U256::ZERO,
		};
		let call = LedgerCall::ExecuteSwap(SignedSubmission::new(intent, vec![0u8; 65]));

		let hash = ledger.submit(&call, 0, 1, 200_000).await.unwrap();
		assert!(ledger.wait_for_receipt(hash).await.unwrap().success);
		assert_eq!(ledger.nonce_of(addr(1)).await.unwrap(), U256::from(1));

		let hash = ledger.submit(&call, 1, 1, 200_000).await.unwrap();
		assert!(!ledger.wait_for_receipt(hash).await.unwrap().success);
	}

	#[tokio::test]
	async fn test_events_by_block_range() {
		let (ledger, id) = ledger_with_intent().await;
		let created_at = ledger.block_number().await.unwrap();
		ledger.cancel_intent(id).await;

		let events = ledger.intent_events(created_at, created_at).await.unwrap();
		assert_eq!(events, vec![IntentEvent::Created { id, creator: addr(1) }]);

		let events = ledger.intent_events(created_at + 1, u64::MAX).await.unwrap();
		assert_eq!(events, vec![IntentEvent::Cancelled { id }]);
	}

	#[tokio::test]
	async fn test_unknown_intent_is_absent() {
		let ledger = MemoryLedger::new(addr(0xaa), addr(0xbb));
		assert!(ledger.get_intent(IntentId(42)).await.unwrap().is_absent());
	}
}
