//! Static registry of supported chains, DEX factories and quote assets.
//!
//! Every address here is a mainnet deployment. The registry is built once at
//! startup and only read afterwards; components receive it by reference.
//!
//! ## Supported chains
//!
//! | Chain | Id | DEXes |
//! |---|---|---|
//! | Ethereum | 1 | Uniswap V2, Uniswap V3, SushiSwap |
//! | BSC | 56 | PancakeSwap V2, PancakeSwap V3, BiSwap |
//! | Polygon | 137 | QuickSwap, SushiSwap |
//!
//! ## Example
//!
//! ```
//! use chain_lens::registry::ChainRegistry;
//!
//! let registry = ChainRegistry::builtin();
//! let bsc = registry.chain(56).unwrap();
//! assert_eq!(bsc.name, "BSC");
//! assert_eq!(registry.quote_assets(56).unwrap()[0].symbol, "WBNB");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use alloy::primitives::{address, Address};
use serde::Serialize;

use crate::error::{LensError, LensResult};

/// Uniswap V3 style fee tiers, in hundredths of a basis point.
///
/// `100` = 0.01%, `500` = 0.05%, `3000` = 0.3%, `10000` = 1%.
pub const V3_FEE_TIERS: [u32; 4] = [100, 500, 3000, 10_000];

/// Immutable metadata for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainInfo {
    /// Numeric chain identifier (EIP-155)
    pub id: u64,
    /// Display name
    pub name: &'static str,
    /// Public RPC endpoints, preferred first
    pub rpc_urls: &'static [&'static str],
    /// Wrapped native token (WETH, WBNB, ...)
    pub wrapped_native: Address,
    /// Symbol of the wrapped native token
    pub wrapped_symbol: &'static str,
    /// Native gas token symbol
    pub native_symbol: &'static str,
    /// Average block time in seconds
    pub block_time_secs: u64,
    /// Block explorer base URL
    pub explorer: &'static str,
}

impl ChainInfo {
    /// First configured public RPC endpoint, if any.
    #[must_use]
    pub fn default_rpc_url(&self) -> Option<&'static str> {
        self.rpc_urls.first().copied()
    }
}

/// DEX protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DexVersion {
    /// Constant-product pairs (`getPair` / `getReserves`)
    V2,
    /// Concentrated-liquidity pools (`getPool` / `slot0`)
    V3,
}

impl DexVersion {
    /// Protocol version number.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

impl fmt::Display for DexVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.number())
    }
}

/// One configured exchange on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DexConfig {
    /// Stable identifier, e.g. `UNISWAP_V2`
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Factory contract
    pub factory: Address,
    /// Router contract
    pub router: Address,
    /// Protocol generation
    pub version: DexVersion,
}

/// A token used as the other side of a pair when searching for pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuoteAsset {
    /// Token symbol
    pub symbol: &'static str,
    /// Token contract
    pub address: Address,
}

/// Registry entry: a chain together with its DEXes and stablecoins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    /// Chain metadata
    pub info: ChainInfo,
    /// Exchanges searched by the pool resolver
    pub dexes: Vec<DexConfig>,
    /// Registered stablecoins
    pub stablecoins: Vec<QuoteAsset>,
}

/// Chain-id keyed registry of chain, DEX and stablecoin parameters.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    entries: BTreeMap<u64, ChainEntry>,
}

impl ChainRegistry {
    /// Empty registry. Add chains with [`ChainRegistry::with_chain`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in Ethereum, BSC and Polygon tables.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_chain(ChainEntry {
                info: ETHEREUM,
                dexes: ETHEREUM_DEXES.to_vec(),
                stablecoins: ETHEREUM_STABLES.to_vec(),
            })
            .with_chain(ChainEntry {
                info: BSC,
                dexes: BSC_DEXES.to_vec(),
                stablecoins: BSC_STABLES.to_vec(),
            })
            .with_chain(ChainEntry {
                info: POLYGON,
                dexes: POLYGON_DEXES.to_vec(),
                stablecoins: POLYGON_STABLES.to_vec(),
            })
    }

    /// Add or replace a chain entry.
    #[must_use]
    pub fn with_chain(mut self, entry: ChainEntry) -> Self {
        self.entries.insert(entry.info.id, entry);
        self
    }

    /// All registered chains in ascending id order.
    pub fn chains(&self) -> impl Iterator<Item = &ChainInfo> {
        self.entries.values().map(|entry| &entry.info)
    }

    /// Look up a chain by id.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the chain is not registered.
    pub fn chain(&self, chain_id: u64) -> LensResult<&ChainInfo> {
        self.entry(chain_id).map(|entry| &entry.info)
    }

    /// Look up a chain by case-insensitive display name.
    #[must_use]
    pub fn chain_by_name(&self, name: &str) -> Option<&ChainInfo> {
        self.chains()
            .find(|chain| chain.name.eq_ignore_ascii_case(name))
    }

    /// Exchanges configured for a chain.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the chain is unknown or has no DEXes.
    pub fn dexes(&self, chain_id: u64) -> LensResult<&[DexConfig]> {
        let entry = self.entry(chain_id)?;
        if entry.dexes.is_empty() {
            return Err(LensError::config(
                format!("no DEX config for chain {} ({})", entry.info.name, chain_id),
                None,
            ));
        }
        Ok(&entry.dexes)
    }

    /// Quote assets for pool discovery: wrapped native first, then stablecoins.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the chain is unknown.
    pub fn quote_assets(&self, chain_id: u64) -> LensResult<Vec<QuoteAsset>> {
        let entry = self.entry(chain_id)?;
        let mut assets = Vec::with_capacity(entry.stablecoins.len() + 1);
        assets.push(QuoteAsset {
            symbol: entry.info.wrapped_symbol,
            address: entry.info.wrapped_native,
        });
        assets.extend(
            entry
                .stablecoins
                .iter()
                .filter(|stable| stable.address != entry.info.wrapped_native)
                .copied(),
        );
        Ok(assets)
    }

    fn entry(&self, chain_id: u64) -> LensResult<&ChainEntry> {
        self.entries.get(&chain_id).ok_or_else(|| {
            LensError::config(format!("no chain matched chain id {chain_id}"), None)
        })
    }
}

/// Format a V3 fee tier as a percentage, e.g. `3000` -> `"0.30%"`.
#[must_use]
pub fn format_fee_tier(fee: u32) -> String {
    format!("{:.2}%", f64::from(fee) / 10_000.0)
}

const ETHEREUM: ChainInfo = ChainInfo {
    id: 1,
    name: "Ethereum",
    rpc_urls: &["https://ethereum.publicnode.com", "https://eth.llamarpc.com"],
    wrapped_native: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
    wrapped_symbol: "WETH",
    native_symbol: "ETH",
    block_time_secs: 12,
    explorer: "https://etherscan.io",
};

const BSC: ChainInfo = ChainInfo {
    id: 56,
    name: "BSC",
    rpc_urls: &["https://bsc-dataseed.binance.org", "https://rpc.ankr.com/bsc"],
    wrapped_native: address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"),
    wrapped_symbol: "WBNB",
    native_symbol: "BNB",
    block_time_secs: 3,
    explorer: "https://bscscan.com",
};

const POLYGON: ChainInfo = ChainInfo {
    id: 137,
    name: "Polygon",
    rpc_urls: &["https://polygon-rpc.com"],
    wrapped_native: address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"),
    wrapped_symbol: "WMATIC",
    native_symbol: "MATIC",
    block_time_secs: 2,
    explorer: "https://polygonscan.com",
};

const ETHEREUM_DEXES: [DexConfig; 3] = [
    DexConfig {
        id: "UNISWAP_V2",
        name: "Uniswap V2",
        factory: address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f"),
        router: address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"),
        version: DexVersion::V2,
    },
    DexConfig {
        id: "UNISWAP_V3",
        name: "Uniswap V3",
        factory: address!("1F98431c8aD98523631AE4a59f267346ea31F984"),
        router: address!("E592427A0AEce92De3Edee1F18E0157C05861564"),
        version: DexVersion::V3,
    },
    DexConfig {
        id: "SUSHISWAP",
        name: "SushiSwap",
        factory: address!("C0AEe478e3658e2610c5F7A4A2E1777cE9e4f2Ac"),
        router: address!("d9e1cE17f2641f24aE83637ab66a2cca9C378B9F"),
        version: DexVersion::V2,
    },
];

const BSC_DEXES: [DexConfig; 3] = [
    DexConfig {
        id: "PANCAKESWAP_V2",
        name: "PancakeSwap V2",
        factory: address!("cA143Ce32Fe78f1f7019d7d551a6402fC5350c73"),
        router: address!("10ED43C718714eb63d5aA57B78B54704E256024E"),
        version: DexVersion::V2,
    },
    DexConfig {
        id: "PANCAKESWAP_V3",
        name: "PancakeSwap V3",
        factory: address!("0BFbCF9fa4f9C56B0F40a671Ad40E0805A091865"),
        router: address!("13f4EA83D0bd40E75C8222255bc855a974568Dd4"),
        version: DexVersion::V3,
    },
    DexConfig {
        id: "BISWAP",
        name: "BiSwap",
        factory: address!("858E3312ed3A876947EA49d572A7C42DE08af7EE"),
        router: address!("3a6d8cA21D1CF76F653A67577FA0D27453350dD8"),
        version: DexVersion::V2,
    },
];

const POLYGON_DEXES: [DexConfig; 2] = [
    DexConfig {
        id: "QUICKSWAP",
        name: "QuickSwap",
        factory: address!("5757371414417b8C6CAad45bAeF941aBc7d3Ab32"),
        router: address!("a5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff"),
        version: DexVersion::V2,
    },
    DexConfig {
        id: "SUSHISWAP",
        name: "SushiSwap",
        factory: address!("c35DADB65012eC5796536bD9864eD8773aBc74C4"),
        router: address!("1b02dA8Cb0d097eB8D57A175b88c7D8b47997506"),
        version: DexVersion::V2,
    },
];

const ETHEREUM_STABLES: [QuoteAsset; 3] = [
    QuoteAsset {
        symbol: "USDT",
        address: address!("dAC17F958D2ee523a2206206994597C13D831ec7"),
    },
    QuoteAsset {
        symbol: "USDC",
        address: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
    },
    QuoteAsset {
        symbol: "DAI",
        address: address!("6B175474E89094C44Da98b954EedeAC495271d0F"),
    },
];

const BSC_STABLES: [QuoteAsset; 3] = [
    QuoteAsset {
        symbol: "USDT",
        address: address!("55d398326f99059fF775485246999027B3197955"),
    },
    QuoteAsset {
        symbol: "USDC",
        address: address!("8AC76a51cc950d9822D68b83fE1Ad97B32Cd580d"),
    },
    QuoteAsset {
        symbol: "BUSD",
        address: address!("e9e7CEA3DedcA5984780Bafc599bD69ADd087D56"),
    },
];

const POLYGON_STABLES: [QuoteAsset; 3] = [
    QuoteAsset {
        symbol: "USDT",
        address: address!("c2132D05D31c914a87C6611C10748AEb04B58e8F"),
    },
    QuoteAsset {
        symbol: "USDC",
        address: address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
    },
    QuoteAsset {
        symbol: "DAI",
        address: address!("8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063"),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_chains_sorted_by_id() {
        let registry = ChainRegistry::builtin();
        let ids: Vec<u64> = registry.chains().map(|chain| chain.id).collect();
        assert_eq!(ids, vec![1, 56, 137]);
    }

    #[test]
    fn test_unknown_chain_is_config_error() {
        let registry = ChainRegistry::builtin();
        let result = registry.chain(10);
        assert!(matches!(result, Err(LensError::ConfigError { .. })));
        if let Err(e) = result {
            assert!(e.to_string().contains("no chain matched"));
        }
    }

    #[test]
    fn test_chain_without_dexes_is_config_error() {
        let registry = ChainRegistry::new().with_chain(ChainEntry {
            info: ETHEREUM,
            dexes: Vec::new(),
            stablecoins: Vec::new(),
        });
        let result = registry.dexes(1);
        assert!(matches!(result, Err(LensError::ConfigError { .. })));
    }

    #[test]
    fn test_quote_assets_wrapped_native_first() {
        let registry = ChainRegistry::builtin();
        let assets = registry.quote_assets(1).unwrap_or_default();
        let symbols: Vec<&str> = assets.iter().map(|asset| asset.symbol).collect();
        assert_eq!(symbols, vec!["WETH", "USDT", "USDC", "DAI"]);
    }

    #[test]
    fn test_dex_versions_per_chain() {
        let registry = ChainRegistry::builtin();
        let bsc = registry.dexes(56).unwrap_or_default();
        assert_eq!(bsc.len(), 3);
        assert_eq!(
            bsc.iter().filter(|dex| dex.version == DexVersion::V3).count(),
            1
        );
        let polygon = registry.dexes(137).unwrap_or_default();
        assert!(polygon.iter().all(|dex| dex.version == DexVersion::V2));
    }

    #[test]
    fn test_chain_by_name_case_insensitive() {
        let registry = ChainRegistry::builtin();
        assert_eq!(registry.chain_by_name("polygon").map(|c| c.id), Some(137));
        assert!(registry.chain_by_name("solana").is_none());
    }

    #[test]
    fn test_format_fee_tier() {
        assert_eq!(format_fee_tier(100), "0.01%");
        assert_eq!(format_fee_tier(500), "0.05%");
        assert_eq!(format_fee_tier(3000), "0.30%");
        assert_eq!(format_fee_tier(10_000), "1.00%");
    }

    #[test]
    fn test_no_zero_addresses_in_tables() {
        let registry = ChainRegistry::builtin();
        for chain in registry.chains() {
            assert_ne!(chain.wrapped_native, Address::ZERO);
            for dex in registry.dexes(chain.id).unwrap_or_default() {
                assert_ne!(dex.factory, Address::ZERO);
                assert_ne!(dex.router, Address::ZERO);
            }
        }
    }
}
