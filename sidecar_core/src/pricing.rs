// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-unit prices charged by the provider.

use serde::{Deserialize, Serialize};
use thegraph_core::alloy::primitives::U256;

use crate::{price::Price, Result};

/// Prices applied to usage reports.
///
/// Deserializes from a document with the optional keys `price_per_block` and
/// `price_per_byte`, each a decimal token amount. Absent keys are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub price_per_block: Price,
    pub price_per_byte: Price,
}

impl PricingConfig {
    pub fn new(price_per_block: Price, price_per_byte: Price) -> Self {
        Self {
            price_per_block,
            price_per_byte,
        }
    }

    /// Parses both prices from decimal token amounts.
    pub fn parse(price_per_block: &str, price_per_byte: &str) -> Result<Self> {
        Ok(Self::new(price_per_block.parse()?, price_per_byte.parse()?))
    }

    /// Total cost of `blocks` processed blocks and `bytes` transferred bytes.
    ///
    /// Exact: each term is below 2^255 (see [`crate::price::PRICE_LIMIT_WEI`]).
    pub fn calculate_usage_cost(&self, blocks: u64, bytes: u64) -> U256 {
        self.price_per_block.calculate_cost(blocks) + self.price_per_byte.calculate_cost(bytes)
    }
}
