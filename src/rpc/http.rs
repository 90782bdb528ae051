//! HTTP provider for EVM JSON-RPC endpoints.
//!
//! [`create_provider`] builds an Alloy HTTP provider; [`AlloyRpcClient`]
//! wraps it behind the crate's [`RpcClient`] trait and converts Alloy
//! response types into the plain records the core works with.
//!
//! ## Example
//!
//! ```no_run
//! use chain_lens::rpc::{create_provider, get_latest_block};
//! use chain_lens::error::LensResult;
//!
//! # async fn example() -> LensResult<()> {
//! let provider = create_provider("https://bsc-dataseed.binance.org").await?;
//! let latest_block = get_latest_block(&provider).await?;
//! println!("Latest block: {}", latest_block);
//! # Ok(())
//! # }
//! ```

use alloy::consensus::Transaction as _;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider as AlloyProvider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockTransactionsKind, Filter, Log, TransactionRequest};
use alloy::transports::http::{Client, Http};
use alloy::transports::{RpcError as TransportRpcError, TransportErrorKind};
use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::client::{BlockInfo, LogFilter, LogRecord, ReceiptInfo, RpcClient, TransactionInfo};
use crate::error::{LensError, LensResult};

/// Type alias for the HTTP provider.
pub type Provider = RootProvider<Http<Client>>;

/// Create a new provider connected via HTTP.
///
/// # Errors
///
/// Returns a configuration error if the URL cannot be parsed.
#[allow(clippy::unused_async)]
#[instrument(skip(rpc_url), fields(rpc_host = tracing::field::Empty))]
pub async fn create_provider(rpc_url: &str) -> LensResult<Provider> {
    info!("Initializing RPC provider");

    // Keep API keys embedded in paths out of the logs
    let host = redact_url(rpc_url);
    tracing::Span::current().record("rpc_host", host);
    debug!(rpc_host = host, "Creating HTTP provider");

    let url = rpc_url.parse().map_err(|e| {
        let msg = if rpc_url.starts_with("http") {
            format!("Failed to parse RPC URL: '{host}'")
        } else {
            format!(
                "Invalid RPC URL: '{rpc_url}'. Expected an http(s) endpoint, e.g. \
                 RPC_URL=\"https://bsc-dataseed.binance.org\""
            )
        };
        LensError::config(msg, Some(Box::new(e)))
    })?;

    let provider = ProviderBuilder::new().on_http(url);

    info!("RPC provider initialized successfully");

    Ok(provider)
}

/// Get the latest block number.
///
/// # Errors
///
/// Returns an error if the RPC request fails.
#[instrument(skip(provider), fields(block = tracing::field::Empty, duration_ms = tracing::field::Empty))]
pub async fn get_latest_block(provider: &Provider) -> LensResult<u64> {
    debug!("Fetching latest block number");

    let start = std::time::Instant::now();
    let block_number = provider
        .get_block_number()
        .await
        .map_err(|e| map_transport_error("eth_blockNumber", e))?;

    let duration = start.elapsed();
    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    tracing::Span::current().record("block", block_number);
    tracing::Span::current().record("duration_ms", duration_ms);

    debug!(block = block_number, duration_ms, "Latest block fetched");

    Ok(block_number)
}

/// Check that the endpoint answers `eth_blockNumber`.
///
/// # Errors
///
/// Returns an error if the RPC connection is not working.
#[instrument(skip(provider))]
pub async fn check_connection(provider: &Provider) -> LensResult<()> {
    match get_latest_block(provider).await {
        Ok(block) => {
            info!(block = block, "Connection check successful");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Connection check failed");
            Err(LensError::rpc(
                format!("Provider connection health check failed: {e}"),
                Some(Box::new(e)),
            ))
        }
    }
}

/// [`RpcClient`] backed by an Alloy HTTP provider.
#[derive(Debug, Clone)]
pub struct AlloyRpcClient {
    provider: Provider,
}

impl AlloyRpcClient {
    /// Wrap an existing provider.
    #[must_use]
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }

    /// Parse `rpc_url` and build a client for it.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL cannot be parsed.
    pub async fn connect(rpc_url: &str) -> LensResult<Self> {
        create_provider(rpc_url).await.map(Self::new)
    }

    /// Underlying Alloy provider.
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }
}

#[async_trait]
impl RpcClient for AlloyRpcClient {
    async fn get_code(&self, address: Address) -> LensResult<Bytes> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| map_transport_error("eth_getCode", e))
    }

    async fn call(&self, to: Address, calldata: Bytes) -> LensResult<Bytes> {
        let tx = TransactionRequest::default().to(to).input(calldata.into());
        self.provider
            .call(&tx)
            .await
            .map_err(|e| map_transport_error("eth_call", e))
    }

    #[instrument(skip(self, filter), fields(from = filter.from_block, to = filter.to_block))]
    async fn get_logs(&self, filter: &LogFilter) -> LensResult<Vec<LogRecord>> {
        let mut query = Filter::new()
            .from_block(filter.from_block)
            .to_block(filter.to_block);
        if let Some(address) = filter.address {
            query = query.address(address);
        }
        if !filter.signatures.is_empty() {
            query = query.event_signature(filter.signatures.clone());
        }

        let logs = self
            .provider
            .get_logs(&query)
            .await
            .map_err(|e| map_transport_error("eth_getLogs", e))?;

        debug!(count = logs.len(), "Logs fetched");
        logs.iter().map(log_record).collect()
    }

    async fn get_transaction(&self, hash: B256) -> LensResult<Option<TransactionInfo>> {
        let tx = self
            .provider
            .get_transaction_by_hash(hash)
            .await
            .map_err(|e| map_transport_error("eth_getTransactionByHash", e))?;

        Ok(tx.map(|tx| TransactionInfo {
            hash,
            from: tx.from,
            value: tx.value(),
            block_number: tx.block_number,
        }))
    }

    async fn get_transaction_receipt(&self, hash: B256) -> LensResult<Option<ReceiptInfo>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| map_transport_error("eth_getTransactionReceipt", e))?;

        let Some(receipt) = receipt else {
            return Ok(None);
        };

        let logs = receipt
            .inner
            .logs()
            .iter()
            .map(log_record)
            .collect::<LensResult<Vec<_>>>()?;

        Ok(Some(ReceiptInfo {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            from: receipt.from,
            to: receipt.to,
            contract_address: receipt.contract_address,
            logs,
        }))
    }

    async fn get_block(&self, number: u64) -> LensResult<Option<BlockInfo>> {
        let block = self
            .provider
            .get_block_by_number(number.into(), BlockTransactionsKind::Hashes)
            .await
            .map_err(|e| map_transport_error("eth_getBlockByNumber", e))?;

        Ok(block.map(|block| BlockInfo {
            number: block.header.number,
            hash: block.header.hash,
            timestamp: block.header.timestamp,
        }))
    }

    async fn latest_block_number(&self) -> LensResult<u64> {
        get_latest_block(&self.provider).await
    }
}

/// Convert an RPC log into a [`LogRecord`].
///
/// Pending logs lack block and position fields and are rejected.
fn log_record(log: &Log) -> LensResult<LogRecord> {
    let (Some(block_number), Some(transaction_hash), Some(log_index)) =
        (log.block_number, log.transaction_hash, log.log_index)
    else {
        return Err(LensError::decoding(
            format!("Log from {} is missing block position fields", log.address()),
            None,
        ));
    };

    Ok(LogRecord {
        address: log.address(),
        topics: log.topics().to_vec(),
        data: log.data().data.clone(),
        block_number,
        transaction_hash,
        log_index,
    })
}

/// Map an Alloy transport error, keeping the JSON-RPC code of error responses.
fn map_transport_error(method: &str, err: TransportRpcError<TransportErrorKind>) -> LensError {
    match err {
        TransportRpcError::ErrorResp(payload) => {
            LensError::provider(payload.code, payload.message.to_string())
        }
        other => LensError::rpc(format!("{method} failed"), Some(Box::new(other))),
    }
}

/// Strip path and query from an RPC URL for logging.
fn redact_url(rpc_url: &str) -> &str {
    let after_scheme = rpc_url.find("://").map_or(0, |i| i + 3);
    rpc_url[after_scheme..]
        .find(['/', '?'])
        .map_or(rpc_url, |end| &rpc_url[..after_scheme + end])
}
