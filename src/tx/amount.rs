//! Decimal Amount Scaling
//!
//! Converts human-readable decimal strings into base units with integer
//! arithmetic only. Floating point never touches an amount.

use crate::error::SignerError;
use ethers_core::types::U256;
use thiserror::Error;

/// Largest exponent for which 10^decimals fits in a U256
pub const MAX_DECIMALS: u32 = 77;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,
    #[error("Invalid character '{0}' in amount")]
    InvalidCharacter(char),
    #[error("Amount has more than one decimal point")]
    MultipleDecimalPoints,
    #[error("Amount has {found} fractional digits, token allows {max}")]
    TooManyDecimals { found: usize, max: u32 },
    #[error("Decimals {0} exceeds maximum of 77")]
    DecimalsTooLarge(u32),
    #[error("Amount overflows 256 bits")]
    Overflow,
}

impl From<AmountError> for SignerError {
    fn from(e: AmountError) -> Self {
        SignerError::invalid_input(e.to_string())
    }
}

/// Scale `amount` by 10^`decimals`
///
/// `"0.002"` with 18 decimals gives `2000000000000000`; `"1"` with 6 gives
/// `1000000`. Signs, exponents, and surplus fractional digits are rejected.
pub fn parse_units(amount: &str, decimals: u32) -> Result<U256, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::DecimalsTooLarge(decimals));
    }

    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }

    if let Some(bad) = trimmed.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
        return Err(AmountError::InvalidCharacter(bad));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((_, rest)) if rest.contains('.') => return Err(AmountError::MultipleDecimalPoints),
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(AmountError::Empty);
    }

    // Trailing zeros carry no value and may exceed the token's precision
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(AmountError::TooManyDecimals {
            found: fraction.len(),
            max: decimals,
        });
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(decimals as usize - fraction.len()));

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_dec_str(digits).map_err(|_| AmountError::Overflow)
}

/// Render base units back as a decimal string without trailing zeros
pub fn format_units(value: U256, decimals: u32) -> String {
    let raw = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return raw;
    }

    let padded = if raw.len() <= decimals {
        format!("{}{}", "0".repeat(decimals - raw.len() + 1), raw)
    } else {
        raw
    };

    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}
