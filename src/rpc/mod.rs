//! JSON-RPC access.
//!
//! # Layout
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  scanner / pools / ownership / contract  │
//! └──────────────────────────────────────────┘
//!                     │  &C where C: RpcClient
//!          ┌──────────┴──────────┐
//!    ┌─────▼──────────┐    ┌─────▼─────┐
//!    │ AlloyRpcClient │    │ test mock │
//!    │  (HTTP, Alloy) │    └───────────┘
//!    └────────────────┘
//! ```
//!
//! The core only sees [`RpcClient`] and the plain records in [`client`].

pub mod client;
pub mod http;

pub use client::{
    call_contract, BlockInfo, LogFilter, LogRecord, ReceiptInfo, RpcClient, TransactionInfo,
};
pub use http::{check_connection, create_provider, get_latest_block, AlloyRpcClient, Provider};
