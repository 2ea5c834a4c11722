// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Escrow balance adapter.
//!
//! The escrow balance lives on chain; the core only needs to read it. Implement
//! [`EscrowBalanceQuerier`] for your chain client, or use [`memory::InMemoryEscrow`]
//! for tests and development.
//!
//! Balance lookups are best effort: [`query_escrow_balance`] bounds every call with a
//! timeout and degrades failures to [`EscrowBalance::Unknown`] so that an RPC outage never
//! blocks usage accounting or RAV acceptance.

#[cfg(feature = "in_memory")]
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use thegraph_core::alloy::primitives::{Address, U256};

/// On-chain escrow account, scoped to a (payer, collector, receiver) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowAccount {
    pub payer: Address,
    pub collector: Address,
    pub receiver: Address,
}

/// Reads escrow balances
///
/// # Example
///
/// For example code see [crate::escrow::memory::InMemoryEscrow]
#[async_trait]
pub trait EscrowBalanceQuerier: Send + Sync {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are logged and the balance is treated as unknown.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    /// Returns the current balance of `account`, in wei.
    async fn get_balance(&self, account: &EscrowAccount) -> Result<U256, Self::AdapterError>;
}

/// Outcome of a best-effort balance lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowBalance {
    Known(U256),
    Unknown,
}

impl EscrowBalance {
    pub fn known(&self) -> Option<U256> {
        match self {
            EscrowBalance::Known(balance) => Some(*balance),
            EscrowBalance::Unknown => None,
        }
    }

    /// Unknown balances count as empty when deciding whether funds are sufficient.
    pub fn or_zero(&self) -> U256 {
        self.known().unwrap_or_default()
    }
}

/// Queries `account`, giving up after `timeout`.
pub async fn query_escrow_balance<E>(
    querier: &E,
    account: &EscrowAccount,
    timeout: Duration,
) -> EscrowBalance
where
    E: EscrowBalanceQuerier,
{
    match tokio::time::timeout(timeout, querier.get_balance(account)).await {
        Ok(Ok(balance)) => EscrowBalance::Known(balance),
        Ok(Err(err)) => {
            warn!(
                "Escrow balance query failed for payer {} (collector {}, receiver {}): {err}",
                account.payer, account.collector, account.receiver
            );
            EscrowBalance::Unknown
        }
        Err(_) => {
            warn!(
                "Escrow balance query timed out after {timeout:?} for payer {}",
                account.payer
            );
            EscrowBalance::Unknown
        }
    }
}
