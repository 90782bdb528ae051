//! Event signature table and log decoding.
//!
//! Raw logs are matched on topic 0 against a [`SignatureTable`] and decoded
//! with the event types generated in [`crate::abi`]. Decoding never guesses:
//! an unknown signature is a normal negative result (`Ok(None)`), while a log
//! whose topics or data don't fit its declared signature is a structural
//! error.
//!
//! ## Example
//!
//! ```
//! use chain_lens::events::{EventKind, SignatureTable};
//!
//! let table = SignatureTable::standard();
//! let hash = table.hash_of("OwnershipTransferred").unwrap();
//! assert_eq!(table.kind_of(&hash), Some(EventKind::OwnershipTransferred));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, LogData, B256, U256};
use alloy::sol_types::SolEvent;
use serde::Serialize;

use crate::abi::{IUniswapV2Factory, IUniswapV2Pair, IUniswapV3Factory, IOwnable, IERC20};
use crate::error::{LensError, LensResult};
use crate::rpc::LogRecord;

/// Events the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum EventKind {
    /// ERC-20 `Transfer`
    Transfer,
    /// ERC-20 `Approval`
    Approval,
    /// `Ownable` owner change
    OwnershipTransferred,
    /// V2 factory pair creation
    PairCreated,
    /// V3 factory pool creation
    PoolCreated,
    /// V2 pair reserve update
    Sync,
    /// V2 pair liquidity mint
    Mint,
}

impl EventKind {
    /// Every supported event.
    pub const ALL: [Self; 7] = [
        Self::Transfer,
        Self::Approval,
        Self::OwnershipTransferred,
        Self::PairCreated,
        Self::PoolCreated,
        Self::Sync,
        Self::Mint,
    ];

    /// Events emitted by the token contract itself.
    pub const CONTRACT: [Self; 3] = [Self::Transfer, Self::Approval, Self::OwnershipTransferred];

    /// Solidity event name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Transfer => "Transfer",
            Self::Approval => "Approval",
            Self::OwnershipTransferred => "OwnershipTransferred",
            Self::PairCreated => "PairCreated",
            Self::PoolCreated => "PoolCreated",
            Self::Sync => "Sync",
            Self::Mint => "Mint",
        }
    }

    /// keccak256 of the canonical event signature.
    #[must_use]
    pub const fn signature_hash(self) -> B256 {
        match self {
            Self::Transfer => IERC20::Transfer::SIGNATURE_HASH,
            Self::Approval => IERC20::Approval::SIGNATURE_HASH,
            Self::OwnershipTransferred => IOwnable::OwnershipTransferred::SIGNATURE_HASH,
            Self::PairCreated => IUniswapV2Factory::PairCreated::SIGNATURE_HASH,
            Self::PoolCreated => IUniswapV3Factory::PoolCreated::SIGNATURE_HASH,
            Self::Sync => IUniswapV2Pair::Sync::SIGNATURE_HASH,
            Self::Mint => IUniswapV2Pair::Mint::SIGNATURE_HASH,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = LensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LensError::config(format!("unknown event name '{s}'"), None))
    }
}

/// Bidirectional name/topic-hash table.
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    by_hash: BTreeMap<B256, EventKind>,
}

impl SignatureTable {
    /// Table with every event in [`EventKind::ALL`].
    #[must_use]
    pub fn standard() -> Self {
        Self::with_kinds(EventKind::ALL)
    }

    /// Table restricted to `kinds`.
    #[must_use]
    pub fn with_kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            by_hash: kinds
                .into_iter()
                .map(|kind| (kind.signature_hash(), kind))
                .collect(),
        }
    }

    /// Topic hash for an event name.
    #[must_use]
    pub fn hash_of(&self, name: &str) -> Option<B256> {
        self.by_hash
            .iter()
            .find(|(_, kind)| kind.name() == name)
            .map(|(hash, _)| *hash)
    }

    /// Event kind for a topic hash.
    #[must_use]
    pub fn kind_of(&self, hash: &B256) -> Option<EventKind> {
        self.by_hash.get(hash).copied()
    }

    /// Topic hashes for `names`, in the given order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first unknown event.
    pub fn select(&self, names: &[&str]) -> LensResult<Vec<B256>> {
        names
            .iter()
            .map(|name| {
                self.hash_of(name).ok_or_else(|| {
                    LensError::config(format!("event '{name}' is not in the signature table"), None)
                })
            })
            .collect()
    }

    /// All topic hashes in the table.
    pub fn hashes(&self) -> impl Iterator<Item = B256> + '_ {
        self.by_hash.keys().copied()
    }
}

/// One decoded event field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventArg {
    /// `address`
    Address(Address),
    /// Any unsigned integer width
    Uint(U256),
    /// Small signed integers (`int24` tick spacing)
    Int(i64),
}

impl EventArg {
    /// Address value, if this is an address field.
    #[must_use]
    pub const fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(address) => Some(*address),
            _ => None,
        }
    }

    /// Unsigned value, if this is an unsigned field.
    #[must_use]
    pub const fn as_uint(&self) -> Option<U256> {
        match self {
            Self::Uint(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for EventArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{address}"),
            Self::Uint(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
        }
    }
}

/// A log decoded against the signature table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEvent {
    /// Which event
    pub kind: EventKind,
    /// Emitting contract
    pub address: Address,
    /// Field name to value, for every declared field
    pub args: BTreeMap<&'static str, EventArg>,
    /// Containing block
    pub block_number: u64,
    /// Originating transaction
    pub transaction_hash: B256,
    /// Position within the block
    pub log_index: u64,
}

impl DecodedEvent {
    /// Solidity event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Address-typed argument by field name.
    #[must_use]
    pub fn address_arg(&self, field: &str) -> Option<Address> {
        self.args.get(field).and_then(EventArg::as_address)
    }

    /// Unsigned argument by field name.
    #[must_use]
    pub fn uint_arg(&self, field: &str) -> Option<U256> {
        self.args.get(field).and_then(EventArg::as_uint)
    }
}

/// Decode a raw log.
///
/// Returns `Ok(None)` when topic 0 is not in `table`.
///
/// # Errors
///
/// Returns a decoding error when the log has no topics, or when its topics or
/// data don't match the declared layout (for example a truncated data word).
pub fn decode(log: &LogRecord, table: &SignatureTable) -> LensResult<Option<DecodedEvent>> {
    let Some(signature) = log.signature() else {
        return Err(LensError::decoding(
            format!(
                "log {}#{} from {} has no topics",
                log.transaction_hash, log.log_index, log.address
            ),
            None,
        ));
    };
    let Some(kind) = table.kind_of(&signature) else {
        return Ok(None);
    };

    let data = LogData::new_unchecked(log.topics.clone(), log.data.clone());
    let args = decode_args(kind, &data).map_err(|e| {
        LensError::decoding(
            format!(
                "malformed {kind} log {}#{} from {}",
                log.transaction_hash, log.log_index, log.address
            ),
            Some(e),
        )
    })?;

    Ok(Some(DecodedEvent {
        kind,
        address: log.address,
        args,
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
        log_index: log.log_index,
    }))
}

/// Decode every log, dropping unknown signatures.
///
/// # Errors
///
/// Fails on the first malformed log.
pub fn decode_all(logs: &[LogRecord], table: &SignatureTable) -> LensResult<Vec<DecodedEvent>> {
    let mut events = Vec::with_capacity(logs.len());
    for log in logs {
        if let Some(event) = decode(log, table)? {
            events.push(event);
        }
    }
    Ok(events)
}

type Args = BTreeMap<&'static str, EventArg>;

fn decode_args(kind: EventKind, data: &LogData) -> Result<Args, ArgsError> {
    let args: Args = match kind {
        EventKind::Transfer => {
            let ev = IERC20::Transfer::decode_log_data(data, true)?;
            Args::from([
                ("from", EventArg::Address(ev.from)),
                ("to", EventArg::Address(ev.to)),
                ("value", EventArg::Uint(ev.value)),
            ])
        }
        EventKind::Approval => {
            let ev = IERC20::Approval::decode_log_data(data, true)?;
            Args::from([
                ("owner", EventArg::Address(ev.owner)),
                ("spender", EventArg::Address(ev.spender)),
                ("value", EventArg::Uint(ev.value)),
            ])
        }
        EventKind::OwnershipTransferred => {
            let ev = IOwnable::OwnershipTransferred::decode_log_data(data, true)?;
            Args::from([
                ("previousOwner", EventArg::Address(ev.previousOwner)),
                ("newOwner", EventArg::Address(ev.newOwner)),
            ])
        }
        EventKind::PairCreated => {
            // pair is the low 20 bytes of data word 0
            let ev = IUniswapV2Factory::PairCreated::decode_log_data(data, true)?;
            Args::from([
                ("token0", EventArg::Address(ev.token0)),
                ("token1", EventArg::Address(ev.token1)),
                ("pair", EventArg::Address(ev.pair)),
                ("index", EventArg::Uint(ev.index)),
            ])
        }
        EventKind::PoolCreated => {
            let ev = IUniswapV3Factory::PoolCreated::decode_log_data(data, true)?;
            Args::from([
                ("token0", EventArg::Address(ev.token0)),
                ("token1", EventArg::Address(ev.token1)),
                ("fee", EventArg::Uint(U256::from(ev.fee))),
                ("tickSpacing", EventArg::Int(i64::try_from(ev.tickSpacing)?)),
                ("pool", EventArg::Address(ev.pool)),
            ])
        }
        EventKind::Sync => {
            let ev = IUniswapV2Pair::Sync::decode_log_data(data, true)?;
            Args::from([
                ("reserve0", EventArg::Uint(U256::from(ev.reserve0))),
                ("reserve1", EventArg::Uint(U256::from(ev.reserve1))),
            ])
        }
        EventKind::Mint => {
            let ev = IUniswapV2Pair::Mint::decode_log_data(data, true)?;
            Args::from([
                ("sender", EventArg::Address(ev.sender)),
                ("amount0", EventArg::Uint(ev.amount0)),
                ("amount1", EventArg::Uint(ev.amount1)),
            ])
        }
    };
    Ok(args)
}

type ArgsError = Box<dyn std::error::Error + Send + Sync>;
