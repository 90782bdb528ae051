//! Error types for the chain inspector.
//!
//! This module provides a unified error type [`LensError`] covering every
//! failure the core can surface: configuration, RPC transport, structured
//! provider responses, decoding, ownership-history assembly and arithmetic.
//!
//! # Design
//!
//! The error hierarchy is organized by layer:
//! - [`LensError::ConfigError`]: configuration and registry lookups (fatal)
//! - [`LensError::RpcError`]: transport and network errors (transient)
//! - [`LensError::ProviderError`]: JSON-RPC error responses carrying a code
//! - [`LensError::DecodingError`]: malformed logs and ABI return data
//! - [`LensError::HistoryError`]: gaps while assembling ownership history
//! - [`LensError::MathError`]: arithmetic faults
//! - [`LensError::NoLiquidity`]: empty reserves or an uninitialized pool
//! - [`LensError::RetriesExhausted`]: a retried operation ran out of attempts
//!
//! # Example
//!
//! ```
//! use chain_lens::error::{LensError, LensResult};
//!
//! fn require_batch(batch_size: u64) -> LensResult<()> {
//!     if batch_size == 0 {
//!         return Err(LensError::config("batch size cannot be zero", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`LensError`].
pub type LensResult<T> = Result<T, LensError>;

/// JSON-RPC error code for "limit exceeded" (EIP-1474).
pub const LIMIT_EXCEEDED_CODE: i64 = -32005;

/// JSON-RPC error code for an `eth_call` that reverted.
pub const EXECUTION_REVERTED_CODE: i64 = 3;

/// Boxed source error carried by most variants.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the chain inspector.
#[derive(Debug)]
pub enum LensError {
    /// Configuration, environment or registry errors.
    ///
    /// Raised for missing environment variables, unknown chain ids and
    /// chains without DEX configuration. Never retried.
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// RPC transport or network errors (timeouts, resets, bad URLs).
    RpcError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Error response returned by the node, with its JSON-RPC code.
    ProviderError {
        /// JSON-RPC error code
        code: i64,
        /// Provider supplied message
        message: String,
    },

    /// Log or ABI return-data decoding errors.
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Ownership history could not be assembled completely.
    HistoryError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Arithmetic or calculation errors.
    MathError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// A pool has empty reserves or a zero sqrt price.
    NoLiquidity {
        /// Which pool or value was empty
        message: String,
    },

    /// A retried operation failed on every attempt.
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Operation label
        operation: String,
        /// Final error
        last_error: Box<LensError>,
    },
}

impl LensError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use chain_lens::error::LensError;
    ///
    /// let err = LensError::config("CHAIN_ID not set", None);
    /// assert!(matches!(err, LensError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new RPC transport error.
    ///
    /// # Example
    ///
    /// ```
    /// use chain_lens::error::LensError;
    ///
    /// let err = LensError::rpc("connection reset", None);
    /// assert!(matches!(err, LensError::RpcError { .. }));
    /// ```
    #[must_use]
    pub fn rpc(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::RpcError {
            message: message.into(),
            source,
        }
    }

    /// Create a provider error from a JSON-RPC error response.
    #[must_use]
    pub fn provider(code: i64, message: impl Into<String>) -> Self {
        Self::ProviderError {
            code,
            message: message.into(),
        }
    }

    /// Create a new decoding error.
    #[must_use]
    pub fn decoding(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Create a new ownership-history error.
    #[must_use]
    pub fn history(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::HistoryError {
            message: message.into(),
            source,
        }
    }

    /// Create a new math error.
    #[must_use]
    pub fn math(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::MathError {
            message: message.into(),
            source,
        }
    }

    /// Create a "no liquidity" error.
    ///
    /// # Example
    ///
    /// ```
    /// use chain_lens::error::LensError;
    ///
    /// let err = LensError::no_liquidity("token reserve is zero");
    /// assert_eq!(err.to_string(), "No liquidity: token reserve is zero");
    /// ```
    #[must_use]
    pub fn no_liquidity(message: impl Into<String>) -> Self {
        Self::NoLiquidity {
            message: message.into(),
        }
    }

    /// Create a retries-exhausted error wrapping the final failure.
    #[must_use]
    pub fn retries_exhausted(attempts: u32, operation: impl Into<String>, last: Self) -> Self {
        Self::RetriesExhausted {
            attempts,
            operation: operation.into(),
            last_error: Box::new(last),
        }
    }

    /// Whether the node rejected the request because of a rate or size limit.
    ///
    /// The structured JSON-RPC code is authoritative when present. Providers
    /// that report limits through a different code, or only through a
    /// transport-level message, are caught by a substring match on
    /// `"limit exceeded"`. That fallback is brittle: a provider rewording its
    /// message silently turns a limit into a generic error, which the scanner
    /// then retries without shrinking its window.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Self::ProviderError { code, message } => {
                *code == LIMIT_EXCEEDED_CODE || mentions_limit(message)
            }
            Self::RpcError { message, source } => {
                mentions_limit(message)
                    || source.as_ref().is_some_and(|s| mentions_limit(&s.to_string()))
            }
            Self::RetriesExhausted { last_error, .. } => last_error.is_rate_limited(),
            _ => false,
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Transport errors and provider responses are transient, except for
    /// reverted calls: a revert is deterministic at a given block, so a
    /// contract lacking the called method answers the same way every time.
    /// Configuration, decoding, history, math and liquidity errors are never
    /// retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RpcError { .. } => true,
            Self::ProviderError { code, message } => {
                *code != EXECUTION_REVERTED_CODE && !mentions_revert(message)
            }
            _ => false,
        }
    }

    /// Whether the node reported a reverted call.
    #[must_use]
    pub fn is_reverted(&self) -> bool {
        match self {
            Self::ProviderError { code, message } => {
                *code == EXECUTION_REVERTED_CODE || mentions_revert(message)
            }
            Self::RetriesExhausted { last_error, .. } => last_error.is_reverted(),
            _ => false,
        }
    }
}

fn mentions_limit(message: &str) -> bool {
    message.to_ascii_lowercase().contains("limit exceeded")
}

fn mentions_revert(message: &str) -> bool {
    message.to_ascii_lowercase().contains("execution reverted")
}

impl fmt::Display for LensError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::RpcError { message, .. } => write!(f, "RPC error: {message}"),
            Self::ProviderError { code, message } => {
                write!(f, "Provider error ({code}): {message}")
            }
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
            Self::HistoryError { message, .. } => write!(f, "History error: {message}"),
            Self::MathError { message, .. } => write!(f, "Math error: {message}"),
            Self::NoLiquidity { message } => write!(f, "No liquidity: {message}"),
            Self::RetriesExhausted {
                attempts,
                operation,
                last_error,
            } => write!(
                f,
                "{operation} failed after {attempts} attempts. Last error: {last_error}"
            ),
        }
    }
}

impl std::error::Error for LensError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::RpcError { source, .. }
            | Self::DecodingError { source, .. }
            | Self::HistoryError { source, .. }
            | Self::MathError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::RetriesExhausted { last_error, .. } => Some(last_error.as_ref()),
            Self::ProviderError { .. } | Self::NoLiquidity { .. } => None,
        }
    }
}

/// Convert from `eyre::Report` to `LensError`.
///
/// Reports that don't fit a specific category are treated as RPC errors.
impl From<eyre::Report> for LensError {
    fn from(err: eyre::Report) -> Self {
        Self::RpcError {
            message: err.to_string(),
            source: None,
        }
    }
}
