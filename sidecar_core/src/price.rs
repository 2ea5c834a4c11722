// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Price
//!
//! Exact fixed-point money values. A [`Price`] is an integer amount of wei
//! (10^-18 of a token); decimal strings are parsed without ever going through
//! floating point.
//!
//! ```rust
//! use sidecar_core::price::Price;
//! use thegraph_core::alloy::primitives::U256;
//!
//! let price: Price = "0.000001".parse().unwrap();
//! assert_eq!(
//!     price.calculate_cost(1_000_000),
//!     U256::from(1_000_000_000_000_000_000u128)
//! );
//! assert_eq!(price.to_string(), "0.000001");
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thegraph_core::alloy::primitives::U256;
use thiserror::Error;

/// Number of fractional digits carried by a [`Price`].
pub const DECIMALS: usize = 18;

/// 10^18, the number of wei in one token.
pub const WEI_PER_TOKEN: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Prices must stay below 2^191 wei. A price times a `u64` quantity then fits in 255 bits,
/// and the sum of the block and byte costs of one usage report fits in 256.
pub const PRICE_LIMIT_WEI: U256 = U256::from_limbs([0, 0, 1 << 63, 0]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("more than one decimal point in \"{input}\"")]
    MultipleDecimalPoints { input: String },
    #[error("invalid character '{character}' in \"{input}\"")]
    InvalidCharacter { input: String, character: char },
    #[error("\"{input}\" is not below the price limit of 2^191 wei")]
    Overflow { input: String },
}

/// Non-negative amount expressed in wei.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(U256);

impl Price {
    pub const ZERO: Price = Price(U256::ZERO);

    /// Fails with [`PriceError::Overflow`] unless `wei` is below [`PRICE_LIMIT_WEI`].
    pub fn from_wei(wei: U256) -> Result<Self, PriceError> {
        if wei >= PRICE_LIMIT_WEI {
            return Err(PriceError::Overflow {
                input: wei.to_string(),
            });
        }
        Ok(Self(wei))
    }

    pub fn wei(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Cost of `quantity` units at this price.
    ///
    /// Exact for every quantity: prices are below [`PRICE_LIMIT_WEI`], so the product stays
    /// below 2^255.
    pub fn calculate_cost(&self, quantity: u64) -> U256 {
        self.0 * U256::from(quantity)
    }

    /// Renders the price as a decimal token amount, trimming trailing fractional zeros.
    pub fn to_decimal_string(&self) -> String {
        let integer = self.0 / WEI_PER_TOKEN;
        // always below 10^18, fits in a u64
        let fraction = (self.0 % WEI_PER_TOKEN).to::<u64>();
        if fraction == 0 {
            return integer.to_string();
        }
        let fraction = format!("{fraction:0width$}", width = DECIMALS);
        format!("{integer}.{}", fraction.trim_end_matches('0'))
    }
}

fn accumulate_digits(input: &str, digits: &str, mut value: U256) -> Result<U256, PriceError> {
    for character in digits.chars() {
        let digit = character
            .to_digit(10)
            .ok_or_else(|| PriceError::InvalidCharacter {
                input: input.to_owned(),
                character,
            })?;
        value = value
            .checked_mul(U256::from(10u8))
            .and_then(|value| value.checked_add(U256::from(digit)))
            .ok_or_else(|| PriceError::Overflow {
                input: input.to_owned(),
            })?;
    }
    Ok(value)
}

impl FromStr for Price {
    type Err = PriceError;

    /// Parses a decimal token amount such as `"1.5"` or `".25"`.
    ///
    /// The empty string is zero. Fractional digits beyond the 18th are dropped, never rounded.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.split('.');
        let integer_part = parts.next().unwrap_or_default();
        let fraction_part = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(PriceError::MultipleDecimalPoints {
                input: input.to_owned(),
            });
        }

        let integer = accumulate_digits(input, integer_part, U256::ZERO)?;

        // Validate every fractional digit, including the truncated ones.
        if let Some(character) = fraction_part.chars().find(|c| !c.is_ascii_digit()) {
            return Err(PriceError::InvalidCharacter {
                input: input.to_owned(),
                character,
            });
        }
        let kept = &fraction_part[..fraction_part.len().min(DECIMALS)];
        let padded = format!("{kept:0<width$}", width = DECIMALS);
        let fraction = accumulate_digits(input, &padded, U256::ZERO)?;

        integer
            .checked_mul(WEI_PER_TOKEN)
            .and_then(|wei| wei.checked_add(fraction))
            .filter(|wei| *wei < PRICE_LIMIT_WEI)
            .map(Price)
            .ok_or_else(|| PriceError::Overflow {
                input: input.to_owned(),
            })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

// Prices travel as decimal strings ("0.000001") in configuration documents and
// RPC payloads, not as raw wei.

impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Price, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Price::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use thegraph_core::alloy::primitives::U256;

    use super::*;

    #[rstest]
    #[case::empty("", 0)]
    #[case::zero("0", 0)]
    #[case::one_and_a_half("1.5", 1_500_000_000_000_000_000)]
    #[case::micro("0.000001", 1_000_000_000_000)]
    #[case::no_integer_part(".25", 250_000_000_000_000_000)]
    #[case::trailing_point("3.", 3_000_000_000_000_000_000)]
    #[case::one_wei("0.000000000000000001", 1)]
    #[case::truncated_not_rounded("0.0000000000000000019", 1)]
    #[case::truncated_to_zero("0.0000000000000000009", 0)]
    fn parses_decimal_strings(#[case] input: &str, #[case] wei: u128) {
        let price: Price = input.parse().unwrap();
        assert_eq!(price.wei(), U256::from(wei));
    }

    #[rstest]
    #[case::two_points("1.2.3")]
    #[case::negative("-1")]
    #[case::letters("1e18")]
    #[case::whitespace(" 1")]
    #[case::bad_truncated_digit("0.0000000000000000001x")]
    fn rejects_malformed_strings(#[case] input: &str) {
        assert!(input.parse::<Price>().is_err());
    }

    #[test]
    fn rejects_overflowing_strings() {
        let input = "9".repeat(80);
        assert!(matches!(
            input.parse::<Price>(),
            Err(PriceError::Overflow { .. })
        ));
    }

    #[test]
    fn rejects_prices_at_the_limit() {
        let at_limit = Price(PRICE_LIMIT_WEI).to_decimal_string();
        assert!(matches!(
            at_limit.parse::<Price>(),
            Err(PriceError::Overflow { .. })
        ));
        assert!(Price::from_wei(PRICE_LIMIT_WEI).is_err());

        let below_limit = Price(PRICE_LIMIT_WEI - U256::from(1)).to_decimal_string();
        assert_eq!(
            below_limit.parse::<Price>().unwrap().wei(),
            PRICE_LIMIT_WEI - U256::from(1)
        );
    }

    #[test]
    fn largest_price_times_largest_quantity_is_exact() {
        let price = Price::from_wei(PRICE_LIMIT_WEI - U256::from(1)).unwrap();
        let cost = price.calculate_cost(u64::MAX);
        assert_eq!(cost / U256::from(u64::MAX), price.wei());
        assert_eq!(cost % U256::from(u64::MAX), U256::ZERO);
    }

    #[rstest]
    #[case::zero(0, "0")]
    #[case::whole(2_000_000_000_000_000_000, "2")]
    #[case::fraction(1_500_000_000_000_000_000, "1.5")]
    #[case::micro(1_000_000_000_000, "0.000001")]
    #[case::one_wei(1, "0.000000000000000001")]
    fn renders_decimal_strings(#[case] wei: u128, #[case] expected: &str) {
        assert_eq!(Price::from_wei(U256::from(wei)).unwrap().to_decimal_string(), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(999_999_999_999_999_999)]
    #[case(1_000_000_000_000_000_000)]
    #[case(123_456_789_012_345_678_901_234_567)]
    fn decimal_string_round_trips(#[case] wei: u128) {
        let price = Price::from_wei(U256::from(wei)).unwrap();
        let reparsed: Price = price.to_decimal_string().parse().unwrap();
        assert_eq!(reparsed.wei(), price.wei());
    }

    #[test]
    fn one_micro_token_times_a_million_is_one_token() {
        let price: Price = "0.000001".parse().unwrap();
        assert_eq!(price.calculate_cost(1_000_000), WEI_PER_TOKEN);
    }

    #[test]
    fn cost_does_not_overflow_u128() {
        let price: Price = "1000000000000".parse().unwrap();
        let cost = price.calculate_cost(u64::MAX);
        assert_eq!(
            cost,
            U256::from(1_000_000_000_000u64) * WEI_PER_TOKEN * U256::from(u64::MAX)
        );
    }

    #[test]
    fn serializes_as_decimal_string() {
        let price: Price = "0.5".parse().unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"0.5\"");
        let back: Price = serde_json::from_str("\"0.5\"").unwrap();
        assert_eq!(back, price);
    }
}
