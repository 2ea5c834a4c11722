// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0
#![doc = include_str!("../README.md")]
//! ## Getting started
//!
//! Build a [`protocol::SessionHandler`] from a [`protocol::ProviderConfig`], an
//! [`escrow::EscrowBalanceQuerier`] implementation and the list of accepted signers, then
//! drive it with the six session operations as the data stream progresses.

use std::time::{SystemTime, UNIX_EPOCH};

use thegraph_core::alloy::{dyn_abi::Eip712Domain, primitives::Address, sol_types::eip712_domain};

mod error;
pub mod escrow;
pub mod price;
pub mod pricing;
pub mod protocol;
pub mod rav;
pub mod session;
pub mod verifier;

pub use error::{Error, Result};
pub use sidecar_eip712_message as signed_message;

/// Nanoseconds since the unix epoch for `time`, zero for times before the epoch.
pub(crate) fn timestamp_ns(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

/// The EIP712 domain separator builder for Receipt Aggregate Vouchers.
///
/// RAVs are signed for the collector contract that later redeems them, so
/// `verifying_contract_address` is the collector address.
///
/// The domain separator is defined as:
/// - `name`: "GraphTallyCollector"
/// - `version`: "1"
/// - `chain_id`: The chain ID of the chain where the collector is deployed.
/// - `verifying_contract`: The address of the collector contract.
pub fn rav_eip712_domain(chain_id: u64, verifying_contract_address: Address) -> Eip712Domain {
    eip712_domain! {
        name: "GraphTallyCollector",
        version: "1",
        chain_id: chain_id,
        verifying_contract: verifying_contract_address,
    }
}
