//! End-to-end checks against an Anvil fork of Ethereum mainnet.
//!
//! These tests need `anvil` on `PATH` and an archive-capable `RPC_URL` for
//! the fork, so they are ignored by default:
//!
//! ```bash
//! RPC_URL=https://... cargo test --test anvil_fork -- --ignored
//! ```
//!
//! `ANVIL_FORK_BLOCK` overrides the fork height.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::env;

use alloy::node_bindings::{Anvil, AnvilInstance};
use alloy::primitives::{address, Address};
use chain_lens::contract::ContractInspector;
use chain_lens::pools::PoolResolver;
use chain_lens::registry::ChainRegistry;
use chain_lens::retry::RetryPolicy;
use chain_lens::rpc::{check_connection, AlloyRpcClient};
use eyre::{Context, Result};

/// A block with deep Uniswap V2 WETH/USDT liquidity.
const DEFAULT_FORK_BLOCK: u64 = 19_000_000;

const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
const USDT: Address = address!("dAC17F958D2ee523a2206206994597C13D831ec7");
const UNISWAP_V2_WETH_USDT: Address = address!("0d4a11d5EEaaC28EC3F61d100daF4d40471f1852");

fn fork_block() -> u64 {
    env::var("ANVIL_FORK_BLOCK")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_FORK_BLOCK)
}

fn start_anvil_fork() -> Result<AnvilInstance> {
    let fork_url = env::var("RPC_URL").wrap_err("RPC_URL must point at an Ethereum archive node")?;

    Anvil::new()
        .fork(fork_url)
        .fork_block_number(fork_block())
        .try_spawn()
        .wrap_err("Failed to spawn Anvil instance")
}

async fn fork_client(anvil: &AnvilInstance) -> Result<AlloyRpcClient> {
    let client = AlloyRpcClient::connect(&anvil.endpoint()).await?;
    check_connection(client.provider())
        .await
        .wrap_err("Anvil is not answering")?;
    Ok(client)
}

#[tokio::test]
#[ignore = "Requires anvil and RPC_URL"]
async fn test_token_info_on_fork() -> Result<()> {
    let anvil = start_anvil_fork()?;
    let client = fork_client(&anvil).await?;

    let token = ContractInspector::new(&client, WETH).token_info().await?;

    assert_eq!(token.symbol, "WETH");
    assert_eq!(token.decimals, 18);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires anvil and RPC_URL"]
async fn test_weth_pools_on_fork() -> Result<()> {
    let anvil = start_anvil_fork()?;
    let client = fork_client(&anvil).await?;
    let registry = ChainRegistry::builtin();

    let discovery = PoolResolver::new(&client, &registry, RetryPolicy::default())
        .discover(WETH, 1)
        .await?;

    let v2_usdt = discovery
        .snapshots
        .iter()
        .find(|snapshot| snapshot.candidate.address == UNISWAP_V2_WETH_USDT)
        .expect("Uniswap V2 WETH/USDT pair should be found");

    assert!(v2_usdt.has_liquidity);
    let price = v2_usdt.price.unwrap_or_default();
    assert!(
        (500.0..20_000.0).contains(&price),
        "WETH price {price} outside sanity range"
    );
    Ok(())
}

#[tokio::test]
#[ignore = "Requires anvil and RPC_URL"]
async fn test_quick_ownership_check_on_fork() -> Result<()> {
    let anvil = start_anvil_fork()?;
    let client = fork_client(&anvil).await?;

    let status = ContractInspector::new(&client, USDT).quick_check().await?;

    assert!(!status.is_renounced);
    Ok(())
}
