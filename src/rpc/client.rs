//! The narrow RPC capability the core depends on.
//!
//! Every component takes a `&C where C: RpcClient` instead of a concrete
//! Alloy provider. The production implementation is
//! [`AlloyRpcClient`](crate::rpc::AlloyRpcClient); tests script an in-memory
//! client.
//!
//! Records crossing this boundary are plain data ([`LogRecord`],
//! [`TransactionInfo`], [`ReceiptInfo`], [`BlockInfo`]) so nothing above the
//! boundary sees transport types.

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde::Serialize;

use crate::error::{LensError, LensResult};

/// Raw event log as returned by `eth_getLogs` or a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics; topic 0 is the event signature hash
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed fields
    pub data: Bytes,
    /// Containing block
    pub block_number: u64,
    /// Originating transaction
    pub transaction_hash: B256,
    /// Position within the block
    pub log_index: u64,
}

impl LogRecord {
    /// Event signature hash (topic 0), if present.
    #[must_use]
    pub fn signature(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

/// Parameters of one `eth_getLogs` request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogFilter {
    /// First block (inclusive)
    pub from_block: u64,
    /// Last block (inclusive)
    pub to_block: u64,
    /// Restrict to logs emitted by this contract
    pub address: Option<Address>,
    /// OR-list matched against topic 0; empty matches any event
    pub signatures: Vec<B256>,
}

impl LogFilter {
    /// Filter for a block range with no address or topic restriction.
    #[must_use]
    pub const fn range(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            address: None,
            signatures: Vec::new(),
        }
    }

    /// Restrict to one emitting contract.
    #[must_use]
    pub const fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Restrict topic 0 to any of `signatures`.
    #[must_use]
    pub fn signatures(mut self, signatures: impl IntoIterator<Item = B256>) -> Self {
        self.signatures = signatures.into_iter().collect();
        self
    }

    /// Whether a log satisfies this filter.
    #[must_use]
    pub fn matches(&self, log: &LogRecord) -> bool {
        let in_range = (self.from_block..=self.to_block).contains(&log.block_number);
        let address_ok = self.address.map_or(true, |address| address == log.address);
        let topic_ok = self.signatures.is_empty()
            || log
                .signature()
                .is_some_and(|topic| self.signatures.contains(&topic));
        in_range && address_ok && topic_ok
    }
}

/// Transaction fields the inspector reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionInfo {
    /// Transaction hash
    pub hash: B256,
    /// Sender
    pub from: Address,
    /// Native value transferred
    pub value: U256,
    /// Containing block, `None` while pending
    pub block_number: Option<u64>,
}

/// Receipt fields the inspector reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptInfo {
    /// Transaction hash
    pub transaction_hash: B256,
    /// Containing block
    pub block_number: Option<u64>,
    /// Sender
    pub from: Address,
    /// Recipient, `None` for contract creation
    pub to: Option<Address>,
    /// Created contract, for deployment transactions
    pub contract_address: Option<Address>,
    /// Logs emitted by the transaction
    pub logs: Vec<LogRecord>,
}

/// Block header fields the inspector reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockInfo {
    /// Block number
    pub number: u64,
    /// Block hash
    pub hash: B256,
    /// Unix timestamp (seconds)
    pub timestamp: u64,
}

/// Read-only JSON-RPC capability consumed by the core.
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// `eth_getCode` at the latest block.
    async fn get_code(&self, address: Address) -> LensResult<Bytes>;

    /// `eth_call` with raw calldata against the latest block.
    async fn call(&self, to: Address, calldata: Bytes) -> LensResult<Bytes>;

    /// `eth_getLogs` for one block range.
    async fn get_logs(&self, filter: &LogFilter) -> LensResult<Vec<LogRecord>>;

    /// `eth_getTransactionByHash`.
    async fn get_transaction(&self, hash: B256) -> LensResult<Option<TransactionInfo>>;

    /// `eth_getTransactionReceipt`.
    async fn get_transaction_receipt(&self, hash: B256) -> LensResult<Option<ReceiptInfo>>;

    /// `eth_getBlockByNumber` without transaction bodies.
    async fn get_block(&self, number: u64) -> LensResult<Option<BlockInfo>>;

    /// `eth_blockNumber`.
    async fn latest_block_number(&self) -> LensResult<u64>;
}

/// Encode a typed call, send it through `client` and decode the return data.
///
/// # Errors
///
/// Returns the client's error for transport failures, or a decoding error
/// when the return data does not match the call's ABI (for example a revert
/// with empty data, or a contract that lacks the method).
pub async fn call_contract<C, Call>(
    client: &C,
    to: Address,
    call: &Call,
) -> LensResult<Call::Return>
where
    C: RpcClient + ?Sized,
    Call: SolCall + Sync,
{
    let output = client.call(to, Bytes::from(call.abi_encode())).await?;
    Call::abi_decode_returns(&output, false).map_err(|e| {
        LensError::decoding(
            format!("Failed to decode {} return data from {to}", Call::SIGNATURE),
            Some(Box::new(e)),
        )
    })
}
