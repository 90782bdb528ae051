//! # chain-lens
//!
//! Read-only analysis of EVM contracts over JSON-RPC using
//! [Alloy](https://github.com/alloy-rs/alloy).
//!
//! - **Ownership history**: current `owner()` plus every
//!   `OwnershipTransferred` event since deployment, with sender and block time
//! - **Pool discovery**: V2 pairs and V3 pools for a token on every
//!   registered DEX, against wrapped native and stablecoin quotes
//! - **Spot pricing**: V2 reserve ratios and V3 `sqrtPriceX96`, decimal
//!   adjusted
//! - **Pair creation analysis** of a single transaction
//! - **Chain detection** for an address across the registered chains
//!
//! No call mutates chain state.
//!
//! ## Architecture
//!
//! 1. **Registry** ([`registry`]) - chains, DEX factories, quote assets
//! 2. **RPC boundary** ([`rpc`]) - [`rpc::RpcClient`] trait and its Alloy
//!    HTTP implementation
//! 3. **Retry and scanning** ([`retry`], [`scanner`]) - backoff policy and
//!    adaptive `eth_getLogs` windows
//! 4. **Decoding and math** ([`events`], [`pricing`])
//! 5. **Operations** ([`contract`], [`ownership`], [`pools`], [`detect`])
//! 6. **Presentation** ([`cli`])
//!
//! Every component takes the RPC client by reference; there is no global
//! state.
//!
//! ## Using as a Library
//!
//! ```rust,no_run
//! use alloy::primitives::address;
//! use chain_lens::{config::Config, contract::ContractInspector, registry::ChainRegistry};
//! use chain_lens::{pools::PoolResolver, rpc::AlloyRpcClient};
//!
//! # async fn example() -> chain_lens::error::LensResult<()> {
//! let registry = ChainRegistry::builtin();
//! let config = Config::new(56, None);
//! let client = AlloyRpcClient::connect(&config.resolve_rpc_url(&registry)?).await?;
//!
//! let cake = address!("0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82");
//! let history = ContractInspector::from_config(&client, cake, &config)
//!     .history()
//!     .await?;
//! println!("{} transfers", history.transfer_events.len());
//!
//! let pools = PoolResolver::new(&client, &registry, config.retry_policy())
//!     .check_pools(cake, 56)
//!     .await?;
//! println!("{} pools", pools.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::LensResult<T>`](error::LensResult):
//!
//! ```rust
//! use chain_lens::error::{LensError, LensResult};
//!
//! fn example() -> LensResult<()> {
//!     Err(LensError::config("CONTRACT_ADDRESS is required", None))
//! }
//! assert!(example().is_err());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod abi;
pub mod cli;
pub mod config;
pub mod contract;
pub mod detect;
pub mod error;
pub mod events;
pub mod observability;
pub mod ownership;
pub mod pools;
pub mod pricing;
pub mod registry;
pub mod retry;
pub mod rpc;
pub mod scanner;
