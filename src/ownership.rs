//! `Ownable` ownership: quick owner check and full transfer history.
//!
//! The history is rebuilt from `OwnershipTransferred` logs between the
//! deployment block and the chain tip. Each event is enriched with the sender
//! of its transaction and the timestamp of its block. If any of those lookups
//! fails, the whole history fails: a partial ownership trail is worse than
//! none.
//!
//! The last event's `newOwner` should equal the current `owner()`. When it
//! doesn't, the scan missed events (wrong deployment block, provider gaps) and
//! [`OwnershipHistory::status`] reports [`HistoryStatus::Stale`].

use std::collections::HashMap;

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::abi::IOwnable;
use crate::contract::ContractInspector;
use crate::error::{LensError, LensResult};
use crate::events::EventKind;
use crate::rpc::RpcClient;

/// Result of a single `owner()` read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OwnershipStatus {
    /// `owner()`
    pub current_owner: Address,
    /// Owner is the zero address
    pub is_renounced: bool,
}

impl OwnershipStatus {
    fn from_owner(current_owner: Address) -> Self {
        Self {
            current_owner,
            is_renounced: current_owner == Address::ZERO,
        }
    }
}

/// One ownership transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipEvent {
    /// Containing block
    pub block_number: u64,
    /// Position within the block
    pub log_index: u64,
    /// Transaction that emitted the event
    pub transaction_hash: B256,
    /// Sender of that transaction
    pub from_address: Address,
    /// Owner before the transfer
    pub previous_owner: Address,
    /// Owner after the transfer
    pub new_owner: Address,
    /// Block timestamp (Unix seconds)
    pub timestamp: u64,
}

impl OwnershipEvent {
    /// Block time as UTC.
    #[must_use]
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Whether the history agrees with the current owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HistoryStatus {
    /// Last transfer ends at the current owner
    Complete,
    /// Last transfer (if any) disagrees with the current owner
    Stale {
        /// Current `owner()`
        expected: Address,
        /// `newOwner` of the last event, `None` if no events were found
        found: Option<Address>,
    },
}

/// Ownership trail of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipHistory {
    /// `owner()` at query time
    pub current_owner: Address,
    /// Owner is the zero address
    pub is_renounced: bool,
    /// Transfers, oldest first
    pub transfer_events: Vec<OwnershipEvent>,
}

impl OwnershipHistory {
    /// Check the last transfer against the current owner.
    ///
    /// An empty trail is only consistent with an unowned contract.
    #[must_use]
    pub fn status(&self) -> HistoryStatus {
        let found = self.transfer_events.last().map(|event| event.new_owner);
        let consistent = match found {
            Some(owner) => owner == self.current_owner,
            None => self.current_owner == Address::ZERO,
        };
        if consistent {
            HistoryStatus::Complete
        } else {
            HistoryStatus::Stale {
                expected: self.current_owner,
                found,
            }
        }
    }
}

impl<C: RpcClient + ?Sized> ContractInspector<'_, C> {
    /// Read `owner()` without scanning.
    ///
    /// # Errors
    ///
    /// Returns the read error after retries; a contract without `owner()`
    /// surfaces as a decoding error.
    #[instrument(skip(self), fields(contract = %self.contract))]
    pub async fn quick_check(&self) -> LensResult<OwnershipStatus> {
        let owner = self.read(IOwnable::ownerCall {}, "owner").await?._0;
        let status = OwnershipStatus::from_owner(owner);
        if status.is_renounced {
            warn!("Ownership has been renounced");
        }
        Ok(status)
    }

    /// Rebuild the full ownership history.
    ///
    /// # Errors
    ///
    /// Fails if `owner()` can't be read, the deployment block can't be
    /// determined, the scan fails, or any event's transaction or block
    /// can't be fetched ([`LensError::HistoryError`]).
    #[instrument(skip(self), fields(contract = %self.contract))]
    pub async fn history(&self) -> LensResult<OwnershipHistory> {
        let status = self.quick_check().await?;

        let events = self
            .events(&[EventKind::OwnershipTransferred], None, None)
            .await?;
        info!(count = events.len(), "Ownership transfers found");

        let mut timestamps: HashMap<u64, u64> = HashMap::new();
        let mut transfer_events = Vec::with_capacity(events.len());

        for event in events {
            let (Some(previous_owner), Some(new_owner)) = (
                event.address_arg("previousOwner"),
                event.address_arg("newOwner"),
            ) else {
                return Err(LensError::history(
                    format!(
                        "OwnershipTransferred in {} lacks owner fields",
                        event.transaction_hash
                    ),
                    None,
                ));
            };

            let from_address = self.sender_of(event.transaction_hash).await?;
            let timestamp = match timestamps.get(&event.block_number) {
                Some(timestamp) => *timestamp,
                None => {
                    let timestamp = self.timestamp_of(event.block_number).await?;
                    timestamps.insert(event.block_number, timestamp);
                    timestamp
                }
            };

            transfer_events.push(OwnershipEvent {
                block_number: event.block_number,
                log_index: event.log_index,
                transaction_hash: event.transaction_hash,
                from_address,
                previous_owner,
                new_owner,
                timestamp,
            });
        }

        let history = OwnershipHistory {
            current_owner: status.current_owner,
            is_renounced: status.is_renounced,
            transfer_events,
        };

        if let HistoryStatus::Stale { expected, found } = history.status() {
            warn!(
                expected = %expected,
                found = ?found,
                "Ownership history does not end at the current owner"
            );
        }

        Ok(history)
    }

    async fn sender_of(&self, tx_hash: B256) -> LensResult<Address> {
        let tx = self
            .retry
            .run("eth_getTransactionByHash", || self.client.get_transaction(tx_hash))
            .await
            .map_err(|e| {
                LensError::history(
                    format!("failed to fetch transaction {tx_hash}"),
                    Some(Box::new(e)),
                )
            })?;

        tx.map(|tx| tx.from).ok_or_else(|| {
            LensError::history(format!("transaction {tx_hash} not found"), None)
        })
    }

    async fn timestamp_of(&self, block_number: u64) -> LensResult<u64> {
        let block = self
            .retry
            .run("eth_getBlockByNumber", || self.client.get_block(block_number))
            .await
            .map_err(|e| {
                LensError::history(
                    format!("failed to fetch block {block_number}"),
                    Some(Box::new(e)),
                )
            })?;

        block.map(|block| block.timestamp).ok_or_else(|| {
            LensError::history(format!("block {block_number} not found"), None)
        })
    }
}
