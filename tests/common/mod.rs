//! Scripted in-memory [`RpcClient`] shared by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use chain_lens::abi::IERC20;
use chain_lens::error::{LensError, LensResult, EXECUTION_REVERTED_CODE};
use chain_lens::retry::RetryPolicy;
use chain_lens::rpc::{BlockInfo, LogFilter, LogRecord, ReceiptInfo, RpcClient, TransactionInfo};
use chain_lens::scanner::ScanPacing;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{self, Layer, SubscriberExt};
use tracing_subscriber::Registry;

/// Retry policy without sleeps.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::ZERO, 1.0)
}

/// Pacing without sleeps.
pub const fn no_pacing() -> ScanPacing {
    ScanPacing::none()
}

/// A `-32005 limit exceeded` response.
pub fn limit_exceeded() -> LensError {
    LensError::provider(-32005, "query returned more than 10000 results")
}

/// A transient transport failure.
pub fn network_error() -> LensError {
    LensError::rpc("connection reset by peer", None)
}

/// Log emitted by `address` in `block_number` with the given topics.
pub fn log(
    address: Address,
    block_number: u64,
    log_index: u64,
    topics: Vec<B256>,
    data: Bytes,
) -> LogRecord {
    LogRecord {
        address,
        topics,
        data,
        block_number,
        transaction_hash: tx_hash(block_number, log_index),
        log_index,
    }
}

/// Deterministic transaction hash for a log position.
pub fn tx_hash(block_number: u64, log_index: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[16..24].copy_from_slice(&block_number.to_be_bytes());
    bytes[24..].copy_from_slice(&log_index.to_be_bytes());
    B256::from(bytes)
}

/// Left-pad an address into a topic.
pub fn address_topic(address: Address) -> B256 {
    address.into_word()
}

#[derive(Default)]
struct State {
    latest_block: u64,
    logs: Vec<LogRecord>,
    log_failures: VecDeque<LensError>,
    windows: Vec<(u64, u64)>,
    calls: HashMap<(Address, Bytes), Bytes>,
    failing: HashSet<Address>,
    reverting: HashSet<Address>,
    call_log: Vec<Address>,
    transactions: HashMap<B256, TransactionInfo>,
    receipts: HashMap<B256, ReceiptInfo>,
    blocks: HashMap<u64, BlockInfo>,
    code: HashMap<Address, Bytes>,
    transaction_failures: HashSet<B256>,
}

/// In-memory chain.
///
/// Unscripted `eth_call`s return one zero word, which decodes as the zero
/// address, `0` or `false`.
#[derive(Default)]
pub struct MockRpc {
    state: Mutex<State>,
}

impl MockRpc {
    pub fn new(latest_block: u64) -> Self {
        let mock = Self::default();
        mock.state().latest_block = latest_block;
        mock
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_latest_block(&self, latest_block: u64) {
        self.state().latest_block = latest_block;
    }

    pub fn add_log(&self, log: LogRecord) {
        self.state().logs.push(log);
    }

    /// Queue an error for the next `eth_getLogs` request.
    pub fn fail_next_get_logs(&self, error: LensError) {
        self.state().log_failures.push_back(error);
    }

    /// Every `eth_getLogs` range requested, including failed ones.
    pub fn windows(&self) -> Vec<(u64, u64)> {
        self.state().windows.clone()
    }

    /// Script the return of `call` against `to`.
    ///
    /// `returns` is a single value or a tuple of static values; either
    /// encodes the same as the function's return data.
    pub fn on_call<C: SolCall, V: SolValue>(&self, to: Address, call: &C, returns: V) {
        self.on_raw_call(to, call, Bytes::from(returns.abi_encode()));
    }

    /// Script raw return data of `call` against `to`.
    pub fn on_raw_call<C: SolCall>(&self, to: Address, call: &C, output: Bytes) {
        let calldata = Bytes::from(call.abi_encode());
        self.state().calls.insert((to, calldata), output);
    }

    /// Script `decimals()` of an ERC-20.
    pub fn on_decimals(&self, token: Address, decimals: u8) {
        self.on_call(token, &IERC20::decimalsCall {}, U256::from(decimals));
    }

    /// Make every `eth_call` to `to` fail with a transport error.
    pub fn fail_calls_to(&self, to: Address) {
        self.state().failing.insert(to);
    }

    /// Make every `eth_call` to `to` revert.
    pub fn revert_calls_to(&self, to: Address) {
        self.state().reverting.insert(to);
    }

    /// Targets of every `eth_call`, in order.
    pub fn call_targets(&self) -> Vec<Address> {
        self.state().call_log.clone()
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state().code.insert(address, code);
    }

    pub fn add_transaction(&self, tx: TransactionInfo) {
        self.state().transactions.insert(tx.hash, tx);
    }

    pub fn fail_transaction(&self, hash: B256) {
        self.state().transaction_failures.insert(hash);
    }

    pub fn add_receipt(&self, receipt: ReceiptInfo) {
        self.state().receipts.insert(receipt.transaction_hash, receipt);
    }

    pub fn add_block(&self, number: u64, timestamp: u64) {
        self.state().blocks.insert(
            number,
            BlockInfo {
                number,
                hash: B256::left_padding_from(&number.to_be_bytes()),
                timestamp,
            },
        );
    }
}

#[async_trait]
impl RpcClient for MockRpc {
    async fn get_code(&self, address: Address) -> LensResult<Bytes> {
        Ok(self.state().code.get(&address).cloned().unwrap_or_default())
    }

    async fn call(&self, to: Address, calldata: Bytes) -> LensResult<Bytes> {
        let mut state = self.state();
        state.call_log.push(to);
        if state.failing.contains(&to) {
            return Err(LensError::rpc(format!("connection refused by {to}"), None));
        }
        if state.reverting.contains(&to) {
            return Err(LensError::provider(EXECUTION_REVERTED_CODE, "execution reverted"));
        }
        Ok(state
            .calls
            .get(&(to, calldata))
            .cloned()
            .unwrap_or_else(|| Bytes::from(vec![0u8; 32])))
    }

    async fn get_logs(&self, filter: &LogFilter) -> LensResult<Vec<LogRecord>> {
        let mut state = self.state();
        state.windows.push((filter.from_block, filter.to_block));
        if let Some(error) = state.log_failures.pop_front() {
            return Err(error);
        }
        Ok(state
            .logs
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect())
    }

    async fn get_transaction(&self, hash: B256) -> LensResult<Option<TransactionInfo>> {
        let state = self.state();
        if state.transaction_failures.contains(&hash) {
            return Err(LensError::provider(-32000, "header not found"));
        }
        Ok(state.transactions.get(&hash).cloned())
    }

    async fn get_transaction_receipt(&self, hash: B256) -> LensResult<Option<ReceiptInfo>> {
        Ok(self.state().receipts.get(&hash).cloned())
    }

    async fn get_block(&self, number: u64) -> LensResult<Option<BlockInfo>> {
        Ok(self.state().blocks.get(&number).copied())
    }

    async fn latest_block_number(&self) -> LensResult<u64> {
        Ok(self.state().latest_block)
    }
}

/// Records the level and message of every event while installed.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl LogCapture {
    /// Capture events on the current thread until the guard drops.
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(Registry::default().with(self.clone()))
    }

    pub fn contains(&self, level: Level, message: &str) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(l, m)| *l == level && m == message)
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: layer::Context<'_, S>) {
        let mut visitor = MessageVisitor(None);
        event.record(&mut visitor);
        if let Some(message) = visitor.0 {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((*event.metadata().level(), message));
        }
    }
}

struct MessageVisitor(Option<String>);

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}
