//! Runtime configuration.
//!
//! Values are read from the environment (after loading `.env` with
//! `dotenvy`, if present). Every variable is optional except
//! `CONTRACT_ADDRESS`, which commands that inspect a contract require.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `RPC_URL` | chain's first public RPC | endpoint override |
//! | `CHAIN_ID` | `56` | chain of the analysed contract |
//! | `CONTRACT_ADDRESS` | unset | target contract |
//! | `DEPLOYMENT_BLOCK` | unset | scan start override |
//! | `BATCH_SIZE` | `1000` | initial/max log window |
//! | `REQUEST_DELAY_MS` | `500` | pacing between windows |
//! | `RATE_LIMIT_COOLDOWN_MS` | `2000` | wait after a limit error |
//! | `ERROR_DELAY_MS` | `1000` | wait after another scan error |
//! | `RETRY_ATTEMPTS` | `3` | retry attempts per call |
//! | `RETRY_DELAY_MS` | `1000` | retry base delay |
//! | `RETRY_BACKOFF` | `2.0` | retry delay multiplier |
//!
//! ## Example
//!
//! ```no_run
//! use chain_lens::config::Config;
//! use chain_lens::error::LensResult;
//!
//! # fn main() -> LensResult<()> {
//! let config = Config::from_env()?;
//! println!("Chain: {}", config.chain_id());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

use crate::error::{LensError, LensResult};
use crate::registry::ChainRegistry;
use crate::retry::RetryPolicy;
use crate::scanner::ScanPacing;

/// Default chain: BSC.
pub const DEFAULT_CHAIN_ID: u64 = 56;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Explicit RPC endpoint
    rpc_url: Option<String>,

    /// Chain of the analysed contract
    chain_id: u64,

    /// Target contract
    contract_address: Option<Address>,

    /// Scan start override
    deployment_block: Option<u64>,

    /// Initial and maximum log window
    batch_size: u64,

    /// Pause between successful windows
    request_delay: Duration,

    /// Pause after a rate/size limit error
    rate_limit_cooldown: Duration,

    /// Pause after other scan errors
    error_delay: Duration,

    /// Attempts per retried call
    retry_attempts: u32,

    /// First retry delay
    retry_delay: Duration,

    /// Retry delay multiplier
    retry_backoff: f64,
}

impl Config {
    /// Configuration for `chain_id` with every other value at its default.
    #[must_use]
    pub const fn new(chain_id: u64, rpc_url: Option<String>) -> Self {
        Self {
            rpc_url,
            chain_id,
            contract_address: None,
            deployment_block: None,
            batch_size: 1000,
            request_delay: Duration::from_millis(500),
            rate_limit_cooldown: Duration::from_millis(2000),
            error_delay: Duration::from_millis(1000),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            retry_backoff: 2.0,
        }
    }

    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first variable that is set
    /// but can't be parsed, or a batch size / attempt count of zero.
    pub fn from_env() -> LensResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> LensResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let defaults = Self::new(DEFAULT_CHAIN_ID, None);

        let rpc_url = get("RPC_URL");
        let chain_id = parse_or(&get, "CHAIN_ID", defaults.chain_id)?;
        let contract_address = parse_opt::<Address>(&get, "CONTRACT_ADDRESS")?;
        let deployment_block = parse_opt::<u64>(&get, "DEPLOYMENT_BLOCK")?;
        let batch_size = parse_or(&get, "BATCH_SIZE", defaults.batch_size)?;
        let request_delay = millis_or(&get, "REQUEST_DELAY_MS", defaults.request_delay)?;
        let rate_limit_cooldown =
            millis_or(&get, "RATE_LIMIT_COOLDOWN_MS", defaults.rate_limit_cooldown)?;
        let error_delay = millis_or(&get, "ERROR_DELAY_MS", defaults.error_delay)?;
        let retry_attempts = parse_or(&get, "RETRY_ATTEMPTS", defaults.retry_attempts)?;
        let retry_delay = millis_or(&get, "RETRY_DELAY_MS", defaults.retry_delay)?;
        let retry_backoff = parse_or(&get, "RETRY_BACKOFF", defaults.retry_backoff)?;

        if batch_size == 0 {
            return Err(LensError::config("BATCH_SIZE must be at least 1", None));
        }
        if retry_attempts == 0 {
            return Err(LensError::config("RETRY_ATTEMPTS must be at least 1", None));
        }
        if !retry_backoff.is_finite() || retry_backoff < 1.0 {
            return Err(LensError::config(
                format!("RETRY_BACKOFF must be a number >= 1.0, got {retry_backoff}"),
                None,
            ));
        }

        Ok(Self {
            rpc_url,
            chain_id,
            contract_address,
            deployment_block,
            batch_size,
            request_delay,
            rate_limit_cooldown,
            error_delay,
            retry_attempts,
            retry_delay,
            retry_backoff,
        })
    }

    /// Override the chain.
    #[must_use]
    pub const fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Override the target contract.
    #[must_use]
    pub const fn with_contract_address(mut self, address: Address) -> Self {
        self.contract_address = Some(address);
        self
    }

    /// Override the RPC endpoint.
    #[must_use]
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }

    /// Endpoint to use: the explicit `RPC_URL`, else the chain's first public
    /// endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no URL is set and the chain is
    /// unknown or lists no endpoints.
    pub fn resolve_rpc_url(&self, registry: &ChainRegistry) -> LensResult<String> {
        if let Some(url) = &self.rpc_url {
            return Ok(url.clone());
        }
        let chain = registry.chain(self.chain_id)?;
        chain.default_rpc_url().map(str::to_string).ok_or_else(|| {
            LensError::config(
                format!("no RPC URL configured for {}; set RPC_URL", chain.name),
                None,
            )
        })
    }

    /// Target contract, required by contract commands.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `CONTRACT_ADDRESS` is not set.
    pub fn require_contract(&self) -> LensResult<Address> {
        self.contract_address.ok_or_else(|| {
            LensError::config("CONTRACT_ADDRESS environment variable is required", None)
        })
    }

    /// Get the explicit RPC URL, if any.
    #[must_use]
    pub fn rpc_url(&self) -> Option<&str> {
        self.rpc_url.as_deref()
    }

    /// Get the chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Get the target contract, if configured.
    #[must_use]
    pub const fn contract_address(&self) -> Option<Address> {
        self.contract_address
    }

    /// Get the deployment block override.
    #[must_use]
    pub const fn deployment_block(&self) -> Option<u64> {
        self.deployment_block
    }

    /// Get the batch size (initial blocks per log query).
    #[must_use]
    pub const fn batch_size(&self) -> u64 {
        self.batch_size
    }

    /// Scanner pacing built from the delay settings.
    #[must_use]
    pub const fn scan_pacing(&self) -> ScanPacing {
        ScanPacing {
            request_delay: self.request_delay,
            rate_limit_cooldown: self.rate_limit_cooldown,
            error_delay: self.error_delay,
        }
    }

    /// Retry policy built from the retry settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_delay, self.retry_backoff)
    }
}

fn parse_opt<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> LensResult<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                LensError::config(format!("{key} is invalid: '{raw}'"), Some(Box::new(e)))
            })
        })
        .transpose()
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> LensResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(get, key)?.unwrap_or(default))
}

fn millis_or(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> LensResult<Duration> {
    Ok(parse_opt::<u64>(get, key)?.map_or(default, Duration::from_millis))
}
