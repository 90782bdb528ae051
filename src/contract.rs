//! Read-only inspection of a single contract.
//!
//! [`ContractInspector`] bundles the RPC client, the target address and the
//! scan settings. Ownership history lives in [`crate::ownership`] as a second
//! `impl` block on the same type.

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::abi::IERC20;
use crate::config::Config;
use crate::error::{LensError, LensResult};
use crate::events::{decode, decode_all, DecodedEvent, EventKind, SignatureTable};
use crate::retry::RetryPolicy;
use crate::rpc::{call_contract, LogFilter, RpcClient};
use crate::scanner::{LogScanner, ScanPacing, ScanRequest};

/// ERC-20 metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    /// Token contract
    pub address: Address,
    /// `name()`
    pub name: String,
    /// `symbol()`
    pub symbol: String,
    /// `decimals()`
    pub decimals: u8,
    /// `totalSupply()` in raw units
    pub total_supply: U256,
}

/// Pair or pool announced by a factory event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPair {
    /// Emitting factory
    pub factory: Address,
    /// Lower-sorted token
    pub token0: Address,
    /// Higher-sorted token
    pub token1: Address,
    /// New pair or pool
    pub pair: Address,
    /// V3 fee tier
    pub fee_tier: Option<u32>,
}

impl CreatedPair {
    /// Whether `token` is one side of the pair.
    #[must_use]
    pub fn involves(&self, token: Address) -> bool {
        self.token0 == token || self.token1 == token
    }
}

/// Summary of a transaction that may have created a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairCreationReport {
    /// Transaction hash
    pub transaction_hash: B256,
    /// Containing block
    pub block_number: Option<u64>,
    /// Sender
    pub from: Address,
    /// Recipient (router or factory)
    pub to: Option<Address>,
    /// Native value sent
    pub value: U256,
    /// Recognized events in log order
    pub events: Vec<DecodedEvent>,
    /// First `PairCreated` or `PoolCreated` event, if any
    pub created_pair: Option<CreatedPair>,
    /// Whether the created pair contains the inspected contract
    pub involves_contract: bool,
}

/// Inspector bound to one contract.
pub struct ContractInspector<'a, C: ?Sized> {
    pub(crate) client: &'a C,
    pub(crate) contract: Address,
    pub(crate) retry: RetryPolicy,
    pub(crate) pacing: ScanPacing,
    pub(crate) batch_size: u64,
    pub(crate) deployment_block: Option<u64>,
}

impl<'a, C: RpcClient + ?Sized> ContractInspector<'a, C> {
    /// Inspector with default retry, pacing and a 1000-block window.
    #[must_use]
    pub fn new(client: &'a C, contract: Address) -> Self {
        Self {
            client,
            contract,
            retry: RetryPolicy::default(),
            pacing: ScanPacing::default(),
            batch_size: 1000,
            deployment_block: None,
        }
    }

    /// Inspector using the retry, pacing, window and deployment-block
    /// settings from `config`.
    #[must_use]
    pub fn from_config(client: &'a C, contract: Address, config: &Config) -> Self {
        Self::new(client, contract)
            .with_retry(config.retry_policy())
            .with_pacing(config.scan_pacing())
            .with_batch_size(config.batch_size())
            .with_deployment_block(config.deployment_block())
    }

    /// Override the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override scan pacing.
    #[must_use]
    pub const fn with_pacing(mut self, pacing: ScanPacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Override the initial scan window.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Skip deployment-block discovery and scan from `block`.
    #[must_use]
    pub const fn with_deployment_block(mut self, block: Option<u64>) -> Self {
        self.deployment_block = block;
        self
    }

    /// Target contract.
    #[must_use]
    pub const fn contract(&self) -> Address {
        self.contract
    }

    /// Log scanner sharing this inspector's client and settings.
    #[must_use]
    pub const fn scanner(&self) -> LogScanner<'a, C> {
        LogScanner::new(self.client, self.retry, self.pacing)
    }

    /// Read ERC-20 `name`, `symbol`, `decimals` and `totalSupply`.
    ///
    /// # Errors
    ///
    /// Returns the first failing read after retries.
    #[instrument(skip(self), fields(contract = %self.contract))]
    pub async fn token_info(&self) -> LensResult<TokenInfo> {
        let name = self.read(IERC20::nameCall {}, "name").await?._0;
        let symbol = self.read(IERC20::symbolCall {}, "symbol").await?._0;
        let decimals = self.read(IERC20::decimalsCall {}, "decimals").await?._0;
        let total_supply = self.read(IERC20::totalSupplyCall {}, "totalSupply").await?._0;

        Ok(TokenInfo {
            address: self.contract,
            name,
            symbol,
            decimals,
            total_supply,
        })
    }

    /// Block the contract was deployed in.
    ///
    /// The configured override wins. Otherwise the chain is searched backwards
    /// from the tip in windows of `batch_size` blocks for the contract's
    /// earliest log whose transaction receipt names the contract as created.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the address has no code or if no
    /// creation transaction is found; set `DEPLOYMENT_BLOCK` in that case.
    #[instrument(skip(self), fields(contract = %self.contract))]
    pub async fn deployment_block(&self) -> LensResult<u64> {
        if let Some(block) = self.deployment_block {
            info!(block, "Using configured deployment block");
            return Ok(block);
        }

        let code = self
            .retry
            .run("eth_getCode", || self.client.get_code(self.contract))
            .await?;
        if code.is_empty() {
            return Err(LensError::config(
                format!("no contract code at {}", self.contract),
                None,
            ));
        }

        let latest = self
            .retry
            .run("eth_blockNumber", || self.client.latest_block_number())
            .await?;
        let step = self.batch_size.max(1);

        let mut window_end = latest;
        loop {
            let window_start = window_end.saturating_sub(step);
            debug!(from = window_start, to = window_end, "Searching for creation transaction");

            let filter = LogFilter::range(window_start, window_end).address(self.contract);
            let logs = self
                .retry
                .run("eth_getLogs", || self.client.get_logs(&filter))
                .await?;

            if let Some(earliest) = logs.iter().min_by_key(|log| (log.block_number, log.log_index)) {
                let receipt = self
                    .retry
                    .run("eth_getTransactionReceipt", || {
                        self.client.get_transaction_receipt(earliest.transaction_hash)
                    })
                    .await?;

                if receipt.and_then(|r| r.contract_address) == Some(self.contract) {
                    info!(
                        block = earliest.block_number,
                        tx = %earliest.transaction_hash,
                        "Found contract creation transaction"
                    );
                    return Ok(earliest.block_number);
                }
            }

            if window_start == 0 {
                break;
            }
            window_end = window_start - 1;
            tokio::time::sleep(self.pacing.request_delay).await;
        }

        Err(LensError::config(
            format!(
                "could not find the creation transaction of {}; set DEPLOYMENT_BLOCK",
                self.contract
            ),
            None,
        ))
    }

    /// Summarize a transaction and find the pair or pool it created.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the transaction or its receipt does
    /// not exist, or an RPC error if they cannot be fetched.
    #[instrument(skip(self))]
    pub async fn analyze_pair_creation(&self, tx_hash: B256) -> LensResult<PairCreationReport> {
        let tx = self
            .retry
            .run("eth_getTransactionByHash", || self.client.get_transaction(tx_hash))
            .await?
            .ok_or_else(|| LensError::config(format!("transaction {tx_hash} not found"), None))?;
        let receipt = self
            .retry
            .run("eth_getTransactionReceipt", || {
                self.client.get_transaction_receipt(tx_hash)
            })
            .await?
            .ok_or_else(|| {
                LensError::config(format!("receipt for {tx_hash} not found"), None)
            })?;

        let table = SignatureTable::standard();
        let mut events = Vec::with_capacity(receipt.logs.len());
        for log in &receipt.logs {
            match decode(log, &table) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => debug!(address = %log.address, "Unrecognized log"),
                Err(e) => warn!(error = %e, "Skipping malformed log"),
            }
        }

        let created_pair = events.iter().find_map(created_pair);
        let involves_contract = created_pair
            .as_ref()
            .is_some_and(|pair| pair.involves(self.contract));
        if let Some(pair) = &created_pair {
            info!(pair = %pair.pair, token0 = %pair.token0, token1 = %pair.token1, "Pair creation found");
        }

        Ok(PairCreationReport {
            transaction_hash: tx_hash,
            block_number: receipt.block_number.or(tx.block_number),
            from: tx.from,
            to: receipt.to,
            value: tx.value,
            events,
            created_pair,
            involves_contract,
        })
    }

    /// Decoded events of `kinds` emitted by the contract, oldest first.
    ///
    /// `from_block` defaults to the deployment block and `to_block` to the
    /// chain tip.
    ///
    /// # Errors
    ///
    /// Propagates scan and decoding failures.
    #[instrument(skip(self, kinds), fields(contract = %self.contract))]
    pub async fn events(
        &self,
        kinds: &[EventKind],
        from_block: Option<u64>,
        to_block: Option<u64>,
    ) -> LensResult<Vec<DecodedEvent>> {
        let from_block = match from_block {
            Some(block) => block,
            None => self.deployment_block().await?,
        };
        let table = SignatureTable::with_kinds(kinds.iter().copied());

        let request = ScanRequest::new(from_block, to_block)
            .address(self.contract)
            .signatures(table.hashes())
            .batch_size(self.batch_size);
        let logs = self.scanner().collect_logs(request).await?;

        let mut events = decode_all(&logs, &table)?;
        events.sort_by_key(|event| (event.block_number, event.log_index));

        info!(count = events.len(), "Events decoded");
        Ok(events)
    }

    pub(crate) async fn read<Call>(&self, call: Call, label: &str) -> LensResult<Call::Return>
    where
        Call: SolCall + Sync,
    {
        self.retry
            .run(label, || call_contract(self.client, self.contract, &call))
            .await
    }
}

fn created_pair(event: &DecodedEvent) -> Option<CreatedPair> {
    let (pair_field, fee_tier) = match event.kind {
        EventKind::PairCreated => ("pair", None),
        EventKind::PoolCreated => (
            "pool",
            event
                .uint_arg("fee")
                .and_then(|fee| u32::try_from(fee).ok()),
        ),
        _ => return None,
    };

    Some(CreatedPair {
        factory: event.address,
        token0: event.address_arg("token0")?,
        token1: event.address_arg("token1")?,
        pair: event.address_arg(pair_field)?,
        fee_tier,
    })
}
