//! Liquidity pool discovery across DEX versions.
//!
//! For a target token the resolver walks every DEX registered for the chain
//! and asks each factory for a pool against every quote asset (wrapped native
//! first, then stablecoins):
//!
//! - **V2**: `getPair(token, quote)`, then `getReserves()` and `token0()`
//! - **V3**: `getPool(token, quote, fee)` for each fee tier, then
//!   `liquidity()`, `slot0()` and `token0()`
//!
//! A zero address from the factory means "no pool" and is not an error. A
//! failing factory or pool is logged, recorded in
//! [`PoolDiscovery::skipped`] and does not affect other candidates. Nothing
//! is cached between calls; every discovery reads fresh state.

use std::collections::HashMap;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::abi::{IUniswapV2Factory, IUniswapV2Pair, IUniswapV3Factory, IUniswapV3Pool, IERC20};
use crate::error::{LensError, LensResult};
use crate::pricing::{v2_price, v3_price_oriented};
use crate::registry::{ChainRegistry, DexConfig, DexVersion, QuoteAsset, V3_FEE_TIERS};
use crate::retry::RetryPolicy;
use crate::rpc::{call_contract, RpcClient};

/// A pool address returned by a factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolCandidate {
    /// DEX display name
    pub dex: &'static str,
    /// DEX protocol generation
    pub version: DexVersion,
    /// Pair (V2) or pool (V3) contract
    pub address: Address,
    /// Other side of the pool
    pub quote: QuoteAsset,
    /// V3 fee tier in hundredths of a basis point
    pub fee_tier: Option<u32>,
}

/// Raw pool state, oriented to the target token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PoolState {
    /// Constant-product reserves
    V2 {
        /// Reserve of the target token
        token_reserve: U256,
        /// Reserve of the quote asset
        quote_reserve: U256,
    },
    /// Concentrated-liquidity state
    V3 {
        /// In-range liquidity
        liquidity: u128,
        /// `slot0.sqrtPriceX96`
        sqrt_price_x96: U256,
        /// Whether the target token is the pool's `token0`
        token_is_token0: bool,
    },
}

/// State and price of one pool at query time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquiditySnapshot {
    /// Where the pool was found
    pub candidate: PoolCandidate,
    /// Raw state
    pub state: PoolState,
    /// Quote units per one target token; `None` without liquidity
    pub price: Option<f64>,
    /// Both reserves non-zero (V2) or non-zero liquidity and price (V3)
    pub has_liquidity: bool,
}

/// A lookup that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCandidate {
    /// DEX display name
    pub dex: &'static str,
    /// Quote asset symbol
    pub quote: &'static str,
    /// V3 fee tier, when applicable
    pub fee_tier: Option<u32>,
    /// Failure description
    pub reason: String,
}

/// Result of one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolDiscovery {
    /// Pools found, in DEX then quote then fee-tier order
    pub snapshots: Vec<LiquiditySnapshot>,
    /// Lookups that failed and were skipped
    pub skipped: Vec<SkippedCandidate>,
}

/// Per-run decimals cache.
type DecimalsCache = HashMap<Address, u8>;

/// Finds pools for a token on every DEX of a chain.
pub struct PoolResolver<'a, C: ?Sized> {
    client: &'a C,
    registry: &'a ChainRegistry,
    retry: RetryPolicy,
}

impl<'a, C: RpcClient + ?Sized> PoolResolver<'a, C> {
    /// Create a resolver.
    #[must_use]
    pub const fn new(client: &'a C, registry: &'a ChainRegistry, retry: RetryPolicy) -> Self {
        Self {
            client,
            registry,
            retry,
        }
    }

    /// Snapshots of every pool found for `token` on `chain_id`.
    ///
    /// # Errors
    ///
    /// See [`PoolResolver::discover`].
    pub async fn check_pools(
        &self,
        token: Address,
        chain_id: u64,
    ) -> LensResult<Vec<LiquiditySnapshot>> {
        Ok(self.discover(token, chain_id).await?.snapshots)
    }

    /// Search every DEX on `chain_id` for pools of `token`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the chain is unknown or has no DEX
    /// configured. Failures of individual factories, pools or `decimals()`
    /// reads are skipped, not returned.
    #[instrument(skip(self, token), fields(token = %token))]
    pub async fn discover(&self, token: Address, chain_id: u64) -> LensResult<PoolDiscovery> {
        let dexes = self.registry.dexes(chain_id)?;
        let quotes = self.registry.quote_assets(chain_id)?;

        // Decimals are read only once a pool needs pricing
        let mut decimals = DecimalsCache::new();

        let mut discovery = PoolDiscovery::default();
        for dex in dexes {
            info!(dex = dex.name, version = %dex.version, factory = %dex.factory, "Checking DEX");
            let before = discovery.snapshots.len();

            for quote in quotes.iter().filter(|quote| quote.address != token) {
                match dex.version {
                    DexVersion::V2 => {
                        let found = self.v2_pool(dex, token, *quote, &mut decimals).await;
                        record(&mut discovery, dex, *quote, None, found);
                    }
                    DexVersion::V3 => {
                        for fee in V3_FEE_TIERS {
                            let found = self.v3_pool(dex, token, *quote, fee, &mut decimals).await;
                            record(&mut discovery, dex, *quote, Some(fee), found);
                        }
                    }
                }
            }

            if discovery.snapshots.len() == before {
                debug!(dex = dex.name, "No pools on DEX");
            }
        }

        if discovery.snapshots.is_empty() {
            warn!(token = %token, chain_id, "no pools found");
        } else {
            info!(
                pools = discovery.snapshots.len(),
                skipped = discovery.skipped.len(),
                "Pool discovery complete"
            );
        }

        Ok(discovery)
    }

    async fn v2_pool(
        &self,
        dex: &DexConfig,
        token: Address,
        quote: QuoteAsset,
        decimals: &mut DecimalsCache,
    ) -> LensResult<Option<LiquiditySnapshot>> {
        let pair = self
            .read(
                dex.factory,
                IUniswapV2Factory::getPairCall {
                    tokenA: token,
                    tokenB: quote.address,
                },
                "getPair",
            )
            .await?
            .pair;
        if pair == Address::ZERO {
            return Ok(None);
        }

        let reserves = self
            .read(pair, IUniswapV2Pair::getReservesCall {}, "getReserves")
            .await?;
        let token0 = self.read(pair, IUniswapV2Pair::token0Call {}, "token0").await?._0;

        let (reserve0, reserve1) = (U256::from(reserves.reserve0), U256::from(reserves.reserve1));
        let (token_reserve, quote_reserve) = if token0 == token {
            (reserve0, reserve1)
        } else {
            (reserve1, reserve0)
        };

        let has_liquidity = !token_reserve.is_zero() && !quote_reserve.is_zero();
        let price = if has_liquidity {
            let token_decimals = self.decimals(token, decimals).await?;
            let quote_decimals = self.decimals(quote.address, decimals).await?;
            Some(v2_price(token_reserve, quote_reserve, token_decimals, quote_decimals)?)
        } else {
            warn!(dex = dex.name, pair = %pair, quote = quote.symbol, "Pair has no liquidity");
            None
        };

        Ok(Some(LiquiditySnapshot {
            candidate: PoolCandidate {
                dex: dex.name,
                version: DexVersion::V2,
                address: pair,
                quote,
                fee_tier: None,
            },
            state: PoolState::V2 {
                token_reserve,
                quote_reserve,
            },
            price,
            has_liquidity,
        }))
    }

    async fn v3_pool(
        &self,
        dex: &DexConfig,
        token: Address,
        quote: QuoteAsset,
        fee: u32,
        decimals: &mut DecimalsCache,
    ) -> LensResult<Option<LiquiditySnapshot>> {
        let fee_arg = fee.try_into().map_err(|e| {
            LensError::config(format!("fee tier {fee} does not fit uint24"), Some(Box::new(e)))
        })?;
        let pool = self
            .read(
                dex.factory,
                IUniswapV3Factory::getPoolCall {
                    tokenA: token,
                    tokenB: quote.address,
                    fee: fee_arg,
                },
                "getPool",
            )
            .await?
            .pool;
        if pool == Address::ZERO {
            return Ok(None);
        }

        let liquidity = self
            .read(pool, IUniswapV3Pool::liquidityCall {}, "liquidity")
            .await?
            ._0;
        let sqrt_price_x96 = U256::from(
            self.read(pool, IUniswapV3Pool::slot0Call {}, "slot0")
                .await?
                .sqrtPriceX96,
        );
        let token0 = self.read(pool, IUniswapV3Pool::token0Call {}, "token0").await?._0;
        let token_is_token0 = token0 == token;

        let price = if sqrt_price_x96.is_zero() {
            None
        } else {
            let token_decimals = self.decimals(token, decimals).await?;
            let quote_decimals = self.decimals(quote.address, decimals).await?;
            Some(v3_price_oriented(
                sqrt_price_x96,
                token_is_token0,
                token_decimals,
                quote_decimals,
            )?)
        };
        let has_liquidity = liquidity > 0 && price.is_some();
        if !has_liquidity {
            warn!(dex = dex.name, pool = %pool, quote = quote.symbol, fee, "Pool has no liquidity");
        }

        Ok(Some(LiquiditySnapshot {
            candidate: PoolCandidate {
                dex: dex.name,
                version: DexVersion::V3,
                address: pool,
                quote,
                fee_tier: Some(fee),
            },
            state: PoolState::V3 {
                liquidity,
                sqrt_price_x96,
                token_is_token0,
            },
            price,
            has_liquidity,
        }))
    }

    async fn decimals(&self, token: Address, cache: &mut DecimalsCache) -> LensResult<u8> {
        if let Some(decimals) = cache.get(&token) {
            return Ok(*decimals);
        }
        let decimals = self.read(token, IERC20::decimalsCall {}, "decimals").await?._0;
        cache.insert(token, decimals);
        Ok(decimals)
    }

    async fn read<Call>(&self, to: Address, call: Call, label: &str) -> LensResult<Call::Return>
    where
        Call: SolCall + Sync,
    {
        self.retry
            .run(label, || call_contract(self.client, to, &call))
            .await
    }
}

fn record(
    discovery: &mut PoolDiscovery,
    dex: &DexConfig,
    quote: QuoteAsset,
    fee_tier: Option<u32>,
    found: LensResult<Option<LiquiditySnapshot>>,
) {
    match found {
        Ok(Some(snapshot)) => {
            info!(
                dex = dex.name,
                quote = quote.symbol,
                pool = %snapshot.candidate.address,
                fee_tier,
                price = snapshot.price,
                "Pool found"
            );
            discovery.snapshots.push(snapshot);
        }
        Ok(None) => {}
        Err(e) => {
            if e.is_reverted() {
                debug!(dex = dex.name, quote = quote.symbol, fee_tier, error = %e, "Lookup reverted, skipping");
            } else {
                warn!(
                    dex = dex.name,
                    quote = quote.symbol,
                    fee_tier,
                    error = %e,
                    "Pool lookup failed, skipping"
                );
            }
            discovery.skipped.push(SkippedCandidate {
                dex: dex.name,
                quote: quote.symbol,
                fee_tier,
                reason: e.to_string(),
            });
        }
    }
}
