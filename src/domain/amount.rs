//! Lossless on-chain quantities.
//!
//! Token amounts, rates and utilization are WAD-scaled integers carried as
//! `U256`. Protocol-wide totals move by signed deltas and are carried as
//! `I256`. Both persist as canonical base-10 strings (no exponent, no prefix).

use alloy_primitives::{I256, U256};
use thiserror::Error;

/// Fixed-point unit for rates and ratios (1e18).
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("invalid unsigned amount: {0:?}")]
    Unsigned(String),
    #[error("invalid signed amount: {0:?}")]
    Signed(String),
}

/// Parse an unsigned amount from a decimal string, or a `0x`-prefixed hex string.
pub fn parse_u256(s: &str) -> Result<U256, AmountParseError> {
    let trimmed = s.trim();
    let parsed = match trimmed.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(trimmed, 10),
    };
    parsed.map_err(|_| AmountParseError::Unsigned(s.to_string()))
}

/// Parse a signed amount from a decimal string.
pub fn parse_i256(s: &str) -> Result<I256, AmountParseError> {
    I256::from_dec_str(s.trim()).map_err(|_| AmountParseError::Signed(s.to_string()))
}

/// Widen an unsigned amount to a signed one. `None` if it does not fit.
pub fn to_signed(value: U256) -> Option<I256> {
    I256::try_from(value).ok()
}

/// Serde adapter for `U256` fields carried as strings in the event feed.
///
/// Accepts decimal (`"1000"`) and hex (`"0x3e8"`) strings; always writes decimal.
pub mod dec_str {
    use super::parse_u256;
    use alloy_primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_u256(&raw).map_err(serde::de::Error::custom)
    }
}
