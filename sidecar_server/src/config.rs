// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use sidecar_core::pricing::PricingConfig;
use thegraph_core::alloy::primitives::Address;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignerBindingError {
    #[error("expected <signer> or <signer>:<authorizer>, got {0:?}")]
    Malformed(String),
    #[error("invalid address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },
}

/// An accepted signer and the payer it signs RAVs for, as given on the command line.
///
/// Written `<signer>:<authorizer>`. A bare `<signer>` signs for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignerBinding {
    pub signer: Address,
    pub authorizer: Address,
}

fn parse_address(input: &str) -> Result<Address, SignerBindingError> {
    Address::from_str(input.trim()).map_err(|err| SignerBindingError::InvalidAddress {
        input: input.to_owned(),
        reason: err.to_string(),
    })
}

impl FromStr for SignerBinding {
    type Err = SignerBindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (signer, authorizer) = match (parts.next(), parts.next(), parts.next()) {
            (Some(signer), None, _) => {
                let signer = parse_address(signer)?;
                (signer, signer)
            }
            (Some(signer), Some(authorizer), None) => {
                (parse_address(signer)?, parse_address(authorizer)?)
            }
            _ => return Err(SignerBindingError::Malformed(s.to_owned())),
        };
        Ok(Self { signer, authorizer })
    }
}

impl From<SignerBinding> for (Address, Address) {
    fn from(binding: SignerBinding) -> Self {
        (binding.signer, binding.authorizer)
    }
}

/// Loads the provider pricing.
///
/// A pricing document (JSON with the optional keys `price_per_block` and `price_per_byte`)
/// takes precedence over the individual prices.
pub fn load_pricing(
    pricing_file: Option<&Path>,
    price_per_block: &str,
    price_per_byte: &str,
) -> Result<PricingConfig> {
    match pricing_file {
        Some(path) => {
            let document = fs::read_to_string(path)
                .with_context(|| format!("Failed to read pricing file {}", path.display()))?;
            serde_json::from_str(&document)
                .with_context(|| format!("Invalid pricing file {}", path.display()))
        }
        None => Ok(PricingConfig::parse(price_per_block, price_per_byte)?),
    }
}
