//! Amount parsing and formatting
//!
//! All user-supplied amounts go through this module. An amount is a positive
//! `Decimal` whose scale never exceeds the token's on-chain precision; scaled
//! integer units for the wire are derived from it, never from raw strings.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use thiserror::Error;

use crate::types::Token;

/// Amount conversion errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: {provided} decimal places, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Amount too large")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    InvalidFormat(String),
}

/// Parse a client amount string into a validated `Decimal`.
///
/// Rejects zero, negatives, explicit signs, empty strings and anything with
/// more fractional digits than the token allows.
pub fn parse_amount(amount_str: &str, token: Token) -> Result<Decimal, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let amount = Decimal::from_str(amount_str)
        .map_err(|_| MoneyError::InvalidFormat(amount_str.to_string()))?;

    if amount <= Decimal::ZERO {
        return Err(MoneyError::InvalidAmount);
    }

    let max = token.decimals();
    if amount.scale() > max {
        return Err(MoneyError::PrecisionOverflow {
            provided: amount.scale(),
            max,
        });
    }

    Ok(amount.normalize())
}

/// Convert a validated amount to scaled integer units for the wire
/// (e.g. 1.5 USDC -> 1_500_000 at 6 decimals).
pub fn to_scaled_units(amount: Decimal, token: Token) -> Result<u128, MoneyError> {
    let scale = Decimal::from_i128_with_scale(10i128.pow(token.decimals()), 0);
    let scaled = amount.checked_mul(scale).ok_or(MoneyError::Overflow)?;

    if scaled.fract() != Decimal::ZERO {
        return Err(MoneyError::PrecisionOverflow {
            provided: amount.scale(),
            max: token.decimals(),
        });
    }

    scaled.to_u128().ok_or(MoneyError::Overflow)
}

/// Convert scaled integer units back to a `Decimal` amount
pub fn from_scaled_units(units: u128, token: Token) -> Decimal {
    let scale = Decimal::from_i128_with_scale(10i128.pow(token.decimals()), 0);
    Decimal::from_u128(units)
        .map(|d| d / scale)
        .unwrap_or_default()
        .normalize()
}

/// Render a balance for an outbound SMS using the token's display precision,
/// rounding half away from zero
pub fn format_balance(amount: Decimal, token: Token) -> String {
    let dp = token.display_dp();
    let rounded = amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.1$}", rounded, dp as usize)
}
