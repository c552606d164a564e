//! Nullable ledger: an in-memory chain that answers reads and accepts writes.
//!
//! State is shared behind an `Arc<Mutex<_>>` so a test can keep one clone for
//! scripting and assertions while the code under test owns another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use staker_chain::abi;
use staker_chain::{
    CallRequest, ChainError, LedgerReader, LogFilter, RawLog, TxReceipt, TxSigner, WriteCall,
};
use staker_types::{BlockNumber, EthAddress, TxHash, Wei};

/// How sent transactions turn into receipts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mining {
    /// Mine each transaction into its own block as soon as it is sent.
    #[default]
    Instant,
    /// Mine immediately, but every receipt reports a revert.
    Revert,
    /// Hold transactions until [`NullLedger::mine_pending`] is called.
    Manual,
}

/// Parameters of a simulated staking contract.
#[derive(Clone, Copy, Debug)]
pub struct StakerFixture {
    pub staker: EthAddress,
    pub external: EthAddress,
    pub threshold: Wei,
    pub time_left: u64,
}

impl Default for StakerFixture {
    fn default() -> Self {
        Self {
            staker: EthAddress::new([0x5a; 20]),
            external: EthAddress::new([0xe7; 20]),
            threshold: Wei::ONE_ETHER,
            time_left: 30,
        }
    }
}

#[derive(Debug)]
struct SimulatedStaker {
    fixture: StakerFixture,
    stakes: HashMap<EthAddress, Wei>,
    completed: bool,
}

#[derive(Debug)]
struct LedgerState {
    head: u64,
    balances: HashMap<EthAddress, Wei>,
    responses: HashMap<(EthAddress, Vec<u8>), Vec<u8>>,
    logs: Vec<RawLog>,
    staker: Option<SimulatedStaker>,
    sender: EthAddress,
    mining: Mining,
    read_failure: Option<ChainError>,
    send_failure: Option<ChainError>,
    sent: Vec<WriteCall>,
    pending: Vec<(TxHash, WriteCall)>,
    receipts: HashMap<TxHash, TxReceipt>,
    next_tx: u64,
    reads: u64,
    receipt_queries: u64,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            head: 1,
            balances: HashMap::new(),
            responses: HashMap::new(),
            logs: Vec::new(),
            staker: None,
            sender: EthAddress::new([0xac; 20]),
            mining: Mining::default(),
            read_failure: None,
            send_failure: None,
            sent: Vec::new(),
            pending: Vec::new(),
            receipts: HashMap::new(),
            next_tx: 1,
            reads: 0,
            receipt_queries: 0,
        }
    }
}

/// A scripted ledger implementing [`LedgerReader`] and [`TxSigner`].
///
/// Reads ignore the requested block and answer from current state; the head
/// only moves when a test mines a block or a transaction.
#[derive(Clone, Default)]
pub struct NullLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger with a staking contract deployed per `fixture`.
    pub fn with_staker(fixture: StakerFixture) -> Self {
        let ledger = Self::new();
        {
            let mut state = ledger.lock();
            state.balances.insert(fixture.staker, Wei::ZERO);
            state.balances.insert(fixture.external, Wei::ZERO);
            state.staker = Some(SimulatedStaker {
                fixture,
                stakes: HashMap::new(),
                completed: false,
            });
        }
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Chain scripting ─────────────────────────────────────────────────

    pub fn head(&self) -> BlockNumber {
        BlockNumber::new(self.lock().head)
    }

    pub fn set_head(&self, height: u64) {
        self.lock().head = height;
    }

    /// Advance the head by one empty block.
    pub fn mine_block(&self) -> BlockNumber {
        let mut state = self.lock();
        state.head += 1;
        BlockNumber::new(state.head)
    }

    pub fn set_balance(&self, address: EthAddress, amount: Wei) {
        self.lock().balances.insert(address, amount);
    }

    /// Answer `eth_call` to `to` with exactly `data` by returning `result`.
    pub fn set_call_response(&self, to: EthAddress, data: Vec<u8>, result: Vec<u8>) {
        self.lock().responses.insert((to, data), result);
    }

    pub fn push_log(&self, log: RawLog) {
        self.lock().logs.push(log);
    }

    /// Append a `Stake` log emitted by `contract`.
    pub fn push_stake_log(&self, contract: EthAddress, depositor: EthAddress, amount: Wei, block: u64) {
        let mut state = self.lock();
        let log_index = state.logs.len() as u64;
        state.logs.push(stake_log(contract, depositor, amount, block, log_index));
    }

    /// Make every read fail with `error` until [`Self::restore_reads`].
    pub fn fail_reads(&self, error: ChainError) {
        self.lock().read_failure = Some(error);
    }

    pub fn restore_reads(&self) {
        self.lock().read_failure = None;
    }

    /// Make `send_transaction` fail with `error`.
    pub fn fail_sends(&self, error: ChainError) {
        self.lock().send_failure = Some(error);
    }

    pub fn set_mining(&self, mining: Mining) {
        self.lock().mining = mining;
    }

    /// The account simulated transactions are sent from.
    pub fn set_sender(&self, sender: EthAddress) {
        self.lock().sender = sender;
    }

    /// Mine every held transaction, one block each.
    pub fn mine_pending(&self) -> usize {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.pending);
        let count = pending.len();
        for (hash, call) in pending {
            state.mine(hash, &call, true);
        }
        count
    }

    // ── Simulated staker ────────────────────────────────────────────────

    pub fn set_time_left(&self, seconds: u64) {
        if let Some(staker) = self.lock().staker.as_mut() {
            staker.fixture.time_left = seconds;
        }
    }

    pub fn set_completed(&self, completed: bool) {
        if let Some(staker) = self.lock().staker.as_mut() {
            staker.completed = completed;
        }
    }

    /// Credit a stake without a transaction (no log is emitted).
    pub fn seed_stake(&self, depositor: EthAddress, amount: Wei) {
        let mut state = self.lock();
        let Some(contract) = state.staker.as_ref().map(|s| s.fixture.staker) else {
            return;
        };
        credit(&mut state.balances, contract, amount);
        if let Some(staker) = state.staker.as_mut() {
            credit(&mut staker.stakes, depositor, amount);
        }
    }

    // ── Assertions ──────────────────────────────────────────────────────

    pub fn sent_transactions(&self) -> Vec<WriteCall> {
        self.lock().sent.clone()
    }

    pub fn read_count(&self) -> u64 {
        self.lock().reads
    }

    /// Every call that would have reached the network: reads, sends and
    /// receipt queries.
    pub fn network_calls(&self) -> u64 {
        let state = self.lock();
        state.reads + state.sent.len() as u64 + state.receipt_queries
    }

    pub fn receipt_queries(&self) -> u64 {
        self.lock().receipt_queries
    }
}

impl LedgerState {
    fn begin_read(&mut self) -> Result<(), ChainError> {
        self.reads += 1;
        match &self.read_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn answer_call(&self, request: &CallRequest) -> Result<Vec<u8>, ChainError> {
        if let Some(result) = self.responses.get(&(request.to, request.data.clone())) {
            return Ok(result.clone());
        }
        let reverted = || ChainError::Rpc {
            code: -32000,
            message: "execution reverted".into(),
        };
        let staker = self.staker.as_ref().ok_or_else(reverted)?;
        let fixture = &staker.fixture;
        if request.data.len() < 4 {
            return Err(reverted());
        }
        let (selector, args) = request.data.split_at(4);
        let word = if request.to == fixture.staker {
            match selector {
                s if s == abi::THRESHOLD => abi::uint_word(fixture.threshold.raw()),
                s if s == abi::TIME_LEFT => abi::uint_word(u128::from(fixture.time_left)),
                s if s == abi::EXTERNAL_CONTRACT => abi::address_word(&fixture.external),
                s if s == abi::BALANCES => {
                    let who = abi::word_to_address(&abi::first_word(args)?)?;
                    let stake = staker.stakes.get(&who).copied().unwrap_or(Wei::ZERO);
                    abi::uint_word(stake.raw())
                }
                _ => return Err(reverted()),
            }
        } else if request.to == fixture.external && selector == abi::COMPLETED {
            abi::bool_word(staker.completed)
        } else {
            return Err(reverted());
        };
        Ok(word.to_vec())
    }

    fn mine(&mut self, hash: TxHash, call: &WriteCall, allow_success: bool) {
        self.head += 1;
        let block = self.head;
        let success = allow_success && self.apply(call, block);
        self.receipts.insert(
            hash,
            TxReceipt {
                tx_hash: hash,
                block_number: BlockNumber::new(block),
                success,
                gas_used: 21_000,
            },
        );
    }

    /// Apply `call` to the simulated staker. Returns `false` on revert.
    fn apply(&mut self, call: &WriteCall, block: u64) -> bool {
        let sender = self.sender;
        let log_index = self.logs.len() as u64;
        let Some(staker) = self.staker.as_mut() else {
            return true;
        };
        let fixture = staker.fixture;
        if call.to != fixture.staker || call.data.len() < 4 {
            return true;
        }
        let held = self.balances.get(&fixture.staker).copied().unwrap_or(Wei::ZERO);
        match &call.data[..4] {
            s if s == abi::STAKE => {
                if staker.completed || fixture.time_left == 0 || call.value.is_zero() {
                    return false;
                }
                credit(&mut staker.stakes, sender, call.value);
                credit(&mut self.balances, fixture.staker, call.value);
                self.logs
                    .push(stake_log(fixture.staker, sender, call.value, block, log_index));
                true
            }
            s if s == abi::EXECUTE => {
                if staker.completed || held < fixture.threshold || fixture.threshold.is_zero() {
                    return false;
                }
                staker.completed = true;
                self.balances.insert(fixture.staker, Wei::ZERO);
                credit(&mut self.balances, fixture.external, held);
                true
            }
            s if s == abi::WITHDRAW => {
                let owed = staker.stakes.get(&sender).copied().unwrap_or(Wei::ZERO);
                if staker.completed || fixture.time_left > 0 || owed.is_zero() {
                    return false;
                }
                staker.stakes.remove(&sender);
                self.balances.insert(fixture.staker, held.saturating_sub(owed));
                true
            }
            _ => false,
        }
    }
}

fn credit(map: &mut HashMap<EthAddress, Wei>, who: EthAddress, amount: Wei) {
    let entry = map.entry(who).or_insert(Wei::ZERO);
    *entry = entry.checked_add(amount).unwrap_or(Wei::new(u128::MAX));
}

fn stake_log(contract: EthAddress, depositor: EthAddress, amount: Wei, block: u64, log_index: u64) -> RawLog {
    let mut data = abi::address_word(&depositor).to_vec();
    data.extend_from_slice(&abi::uint_word(amount.raw()));
    RawLog {
        address: contract,
        topics: vec![abi::STAKE_EVENT_TOPIC],
        data,
        block_number: BlockNumber::new(block),
        log_index,
    }
}

fn tx_hash(counter: u64) -> TxHash {
    let mut bytes = [0u8; 32];
    bytes[0] = 0x7e;
    bytes[24..].copy_from_slice(&counter.to_be_bytes());
    TxHash::new(bytes)
}

impl LedgerReader for NullLedger {
    async fn block_number(&self) -> Result<BlockNumber, ChainError> {
        let mut state = self.lock();
        state.begin_read()?;
        Ok(BlockNumber::new(state.head))
    }

    async fn balance(&self, address: &EthAddress, _at: BlockNumber) -> Result<Wei, ChainError> {
        let mut state = self.lock();
        state.begin_read()?;
        Ok(state.balances.get(address).copied().unwrap_or(Wei::ZERO))
    }

    async fn call(&self, request: &CallRequest, _at: BlockNumber) -> Result<Vec<u8>, ChainError> {
        let mut state = self.lock();
        state.begin_read()?;
        state.answer_call(request)
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>, ChainError> {
        let mut state = self.lock();
        state.begin_read()?;
        Ok(state
            .logs
            .iter()
            .filter(|log| {
                log.address == filter.address
                    && log.topics.first() == Some(&filter.topic0)
                    && log.block_number >= filter.from_block
                    && log.block_number <= filter.to_block
            })
            .cloned()
            .collect())
    }
}

impl TxSigner for NullLedger {
    async fn send_transaction(&self, call: &WriteCall) -> Result<TxHash, ChainError> {
        let mut state = self.lock();
        state.sent.push(call.clone());
        if let Some(error) = &state.send_failure {
            return Err(error.clone());
        }
        let hash = tx_hash(state.next_tx);
        state.next_tx += 1;
        match state.mining {
            Mining::Instant => state.mine(hash, call, true),
            Mining::Revert => state.mine(hash, call, false),
            Mining::Manual => state.pending.push((hash, call.clone())),
        }
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<TxReceipt>, ChainError> {
        let mut state = self.lock();
        state.receipt_queries += 1;
        Ok(state.receipts.get(hash).cloned())
    }
}
