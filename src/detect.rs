//! Find which registered chain hosts a contract, then analyse it there.

use std::future::Future;

use alloy::primitives::Address;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::contract::{ContractInspector, TokenInfo};
use crate::error::LensResult;
use crate::pools::{PoolDiscovery, PoolResolver};
use crate::registry::{ChainInfo, ChainRegistry};
use crate::retry::RetryPolicy;
use crate::rpc::RpcClient;

/// A contract located on a chain, with its token metadata and pools there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainDetection {
    /// Chain hosting the contract
    pub chain: ChainInfo,
    /// ERC-20 metadata; `None` when the contract does not answer as a token
    pub token: Option<TokenInfo>,
    /// Pools found on the chain's DEXes
    pub pools: PoolDiscovery,
}

/// Probe `eth_getCode` for `address` on every registered chain in ascending
/// id order and return the first chain where the code is non-empty.
///
/// `connect` builds a client for a chain; connection and probe failures are
/// logged and the chain is skipped.
///
/// # Example
///
/// ```no_run
/// use alloy::primitives::address;
/// use chain_lens::detect::detect_chain;
/// use chain_lens::error::LensError;
/// use chain_lens::registry::ChainRegistry;
/// use chain_lens::retry::RetryPolicy;
/// use chain_lens::rpc::AlloyRpcClient;
///
/// # async fn example() {
/// let registry = ChainRegistry::builtin();
/// let token = address!("0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82");
/// let chain = detect_chain(token, &registry, RetryPolicy::default(), |chain| async move {
///     let url = chain
///         .default_rpc_url()
///         .ok_or_else(|| LensError::config(format!("no RPC URL for {}", chain.name), None))?;
///     AlloyRpcClient::connect(url).await
/// })
/// .await;
/// # }
/// ```
pub async fn detect_chain<'r, C, F, Fut>(
    address: Address,
    registry: &'r ChainRegistry,
    retry: RetryPolicy,
    connect: F,
) -> Option<&'r ChainInfo>
where
    C: RpcClient,
    F: Fn(ChainInfo) -> Fut,
    Fut: Future<Output = LensResult<C>>,
{
    locate(address, registry, &retry, connect)
        .await
        .map(|(chain, _)| chain)
}

/// Locate `address` like [`detect_chain`], then read its token metadata and
/// discover its pools on the chain it was found on.
///
/// A token-metadata failure is logged and leaves [`ChainDetection::token`]
/// empty. Per-pool failures are recorded in the discovery.
///
/// # Errors
///
/// Returns a configuration error if the detected chain has no DEX
/// configured.
#[instrument(skip(registry, retry, connect))]
pub async fn detect_and_analyze<C, F, Fut>(
    address: Address,
    registry: &ChainRegistry,
    retry: RetryPolicy,
    connect: F,
) -> LensResult<Option<ChainDetection>>
where
    C: RpcClient,
    F: Fn(ChainInfo) -> Fut,
    Fut: Future<Output = LensResult<C>>,
{
    let Some((chain, client)) = locate(address, registry, &retry, connect).await else {
        return Ok(None);
    };

    let token = match ContractInspector::new(&client, address)
        .with_retry(retry)
        .token_info()
        .await
    {
        Ok(token) => Some(token),
        Err(e) => {
            warn!(chain = chain.name, error = %e, "Could not read token info");
            None
        }
    };

    let pools = PoolResolver::new(&client, registry, retry)
        .discover(address, chain.id)
        .await?;

    Ok(Some(ChainDetection {
        chain: chain.clone(),
        token,
        pools,
    }))
}

#[instrument(skip(registry, retry, connect))]
async fn locate<'r, C, F, Fut>(
    address: Address,
    registry: &'r ChainRegistry,
    retry: &RetryPolicy,
    connect: F,
) -> Option<(&'r ChainInfo, C)>
where
    C: RpcClient,
    F: Fn(ChainInfo) -> Fut,
    Fut: Future<Output = LensResult<C>>,
{
    for chain in registry.chains() {
        debug!(chain = chain.name, chain_id = chain.id, "Probing chain");

        let client = match connect(chain.clone()).await {
            Ok(client) => client,
            Err(e) => {
                warn!(chain = chain.name, error = %e, "Could not connect, skipping chain");
                continue;
            }
        };

        match retry.run("eth_getCode", || client.get_code(address)).await {
            Ok(code) if !code.is_empty() => {
                info!(chain = chain.name, chain_id = chain.id, "Contract found");
                return Some((chain, client));
            }
            Ok(_) => debug!(chain = chain.name, "No code at address"),
            Err(e) => warn!(chain = chain.name, error = %e, "Code probe failed, skipping chain"),
        }
    }

    warn!("Contract not found on any registered chain");
    None
}
