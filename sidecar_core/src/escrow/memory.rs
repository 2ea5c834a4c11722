// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory escrow balances.
//!
//! Useful for testing and development. Accounts that were never funded are an
//! adapter error, the same way a chain client fails on an unreachable node.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use thegraph_core::alloy::primitives::U256;
use thiserror::Error;

use super::{EscrowAccount, EscrowBalanceQuerier};

pub type EscrowStorage = Arc<RwLock<HashMap<EscrowAccount, U256>>>;

#[derive(Debug, Error)]
pub enum InMemoryEscrowError {
    #[error("no escrow exists for payer {}", .account.payer)]
    AccountNotFound { account: EscrowAccount },
    #[error("cannot withdraw {requested} from escrow holding {available}")]
    InsufficientBalance { available: U256, requested: U256 },
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryEscrow {
    storage: EscrowStorage,
}

impl InMemoryEscrow {
    pub fn new(storage: EscrowStorage) -> Self {
        Self { storage }
    }

    pub fn set_balance(&self, account: EscrowAccount, balance: U256) {
        self.storage.write().insert(account, balance);
    }

    pub fn increase_balance(&self, account: EscrowAccount, value: U256) {
        let mut storage = self.storage.write();
        let balance = storage.entry(account).or_default();
        *balance = balance.saturating_add(value);
    }

    pub fn reduce_balance(
        &self,
        account: &EscrowAccount,
        value: U256,
    ) -> Result<(), InMemoryEscrowError> {
        let mut storage = self.storage.write();
        let balance = storage
            .get_mut(account)
            .ok_or(InMemoryEscrowError::AccountNotFound { account: *account })?;
        *balance = balance
            .checked_sub(value)
            .ok_or(InMemoryEscrowError::InsufficientBalance {
                available: *balance,
                requested: value,
            })?;
        Ok(())
    }

    pub fn remove_account(&self, account: &EscrowAccount) {
        self.storage.write().remove(account);
    }
}

#[async_trait]
impl EscrowBalanceQuerier for InMemoryEscrow {
    type AdapterError = InMemoryEscrowError;

    async fn get_balance(&self, account: &EscrowAccount) -> Result<U256, Self::AdapterError> {
        self.storage
            .read()
            .get(account)
            .copied()
            .ok_or(InMemoryEscrowError::AccountNotFound { account: *account })
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use thegraph_core::alloy::primitives::{Address, U256};

    use super::*;

    #[fixture]
    fn account() -> EscrowAccount {
        EscrowAccount {
            payer: Address::from([0x01u8; 20]),
            collector: Address::from([0x02u8; 20]),
            receiver: Address::from([0x03u8; 20]),
        }
    }

    #[rstest]
    #[tokio::test]
    async fn escrow_balance_test(account: EscrowAccount) {
        let escrow = InMemoryEscrow::default();
        let other_account = EscrowAccount {
            receiver: Address::from([0x04u8; 20]),
            ..account
        };

        // Unfunded accounts are an error
        assert!(escrow.get_balance(&account).await.is_err());

        escrow.increase_balance(account, U256::from(500));
        assert_eq!(escrow.get_balance(&account).await.unwrap(), U256::from(500));

        escrow.reduce_balance(&account, U256::from(500)).unwrap();
        assert_eq!(escrow.get_balance(&account).await.unwrap(), U256::ZERO);

        // Withdrawing below zero fails and leaves the balance untouched
        assert!(matches!(
            escrow.reduce_balance(&account, U256::from(1)),
            Err(InMemoryEscrowError::InsufficientBalance { .. })
        ));
        assert_eq!(escrow.get_balance(&account).await.unwrap(), U256::ZERO);

        // Balances are scoped to the whole triple
        assert!(escrow.get_balance(&other_account).await.is_err());
    }
}
