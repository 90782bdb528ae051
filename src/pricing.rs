//! Spot prices from raw pool state.
//!
//! Every price is expressed as "quote units per one target token", with both
//! sides normalized by their ERC-20 decimals.
//!
//! # V2 (constant product)
//!
//! ```text
//! price = (reserve_quote / 10^decimals_quote) / (reserve_token / 10^decimals_token)
//! ```
//!
//! # V3 (concentrated liquidity)
//!
//! ```text
//! raw   = (sqrtPriceX96 / 2^96)^2            token1 per token0, raw units
//! price = raw * 10^decimals_token0 / 10^decimals_token1
//! ```
//!
//! Empty reserves and an uninitialized pool (zero sqrt price) are reported as
//! [`LensError::NoLiquidity`], never as arithmetic faults.
//!
//! # Example
//!
//! ```
//! use alloy::primitives::U256;
//! use chain_lens::pricing::v2_price;
//!
//! // 1000 WETH against 2,000,000 USDT
//! let weth = U256::from(1000u128 * 10u128.pow(18));
//! let usdt = U256::from(2_000_000u128 * 10u128.pow(6));
//!
//! let price = v2_price(weth, usdt, 18, 6).unwrap();
//! assert!((price - 2000.0).abs() < 1e-9);
//! ```

use alloy::primitives::U256;

use crate::error::{LensError, LensResult};

/// 2^96, the fixed-point scale of `sqrtPriceX96`.
const Q96: f64 = 79_228_162_514_264_337_593_543_950_336.0;

/// Convert a `U256` to the nearest `f64`.
///
/// Values above 2^53 lose precision; prices are display values, so that is
/// acceptable.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, &limb| acc.mul_add(18_446_744_073_709_551_616.0, limb as f64))
}

/// `10^decimals` as `f64`.
fn scale(decimals: u8) -> f64 {
    10f64.powi(i32::from(decimals))
}

fn finite(price: f64, context: &str) -> LensResult<f64> {
    if price.is_finite() {
        Ok(price)
    } else {
        Err(LensError::math(
            format!("{context} produced a non-finite price"),
            None,
        ))
    }
}

/// V2 spot price of the target token in quote units.
///
/// # Errors
///
/// Returns [`LensError::NoLiquidity`] if either reserve is zero, or a math
/// error if the result is not finite.
pub fn v2_price(
    reserve_token: U256,
    reserve_quote: U256,
    decimals_token: u8,
    decimals_quote: u8,
) -> LensResult<f64> {
    if reserve_token.is_zero() {
        return Err(LensError::no_liquidity("token reserve is zero"));
    }
    if reserve_quote.is_zero() {
        return Err(LensError::no_liquidity("quote reserve is zero"));
    }

    let token = u256_to_f64(reserve_token) / scale(decimals_token);
    let quote = u256_to_f64(reserve_quote) / scale(decimals_quote);

    finite(quote / token, "V2 reserves")
}

/// V3 spot price of `token0` in `token1` units.
///
/// # Errors
///
/// Returns [`LensError::NoLiquidity`] if the pool is uninitialized
/// (`sqrtPriceX96 == 0`).
pub fn v3_price(sqrt_price_x96: U256, decimals_token0: u8, decimals_token1: u8) -> LensResult<f64> {
    if sqrt_price_x96.is_zero() {
        return Err(LensError::no_liquidity("sqrtPriceX96 is zero"));
    }

    let sqrt = u256_to_f64(sqrt_price_x96) / Q96;
    let raw = sqrt * sqrt;

    finite(
        raw * scale(decimals_token0) / scale(decimals_token1),
        "V3 sqrtPriceX96",
    )
}

/// V3 spot price of the target token in quote units, whichever side of the
/// pool the target sits on.
///
/// # Errors
///
/// Same as [`v3_price`].
pub fn v3_price_oriented(
    sqrt_price_x96: U256,
    token_is_token0: bool,
    decimals_token: u8,
    decimals_quote: u8,
) -> LensResult<f64> {
    if token_is_token0 {
        v3_price(sqrt_price_x96, decimals_token, decimals_quote)
    } else {
        // pool price is target-per-quote
        let inverse = v3_price(sqrt_price_x96, decimals_quote, decimals_token)?;
        finite(1.0 / inverse, "V3 inverted price")
    }
}
