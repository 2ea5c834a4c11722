// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Receipt Aggregate Voucher
//!
//! The signed voucher a client hands to the provider. `valueAggregate` is the total owed
//! for the whole relationship so far, never a delta.

use serde::{Deserialize, Serialize};
use thegraph_core::alloy::{primitives::U256, sol};

use crate::signed_message::Eip712SignedMessage;

/// EIP712 signed message for ReceiptAggregateVoucher
pub type SignedRav = Eip712SignedMessage<ReceiptAggregateVoucher>;

sol! {
    /// Holds information needed for promise of payment signed with ECDSA
    ///
    /// We use camelCase for field names to match the Ethereum ABI encoding
    #[derive(Debug, Serialize, Deserialize, Eq, PartialEq)]
    struct ReceiptAggregateVoucher {
        /// Unique collection id this RAV belongs to
        bytes32 collectionId;
        // The address of the payer the RAV was issued by
        address payer;
        // The address of the data service the RAV was issued to
        address dataService;
        // The address of the service provider the RAV was issued to
        address serviceProvider;
        // The RAV timestamp, indicating the latest receipt in the RAV
        uint64 timestampNs;
        // Total amount owed to the service provider since the beginning of the
        // payer-service provider relationship, including all debt that is already paid for.
        uint128 valueAggregate;
        // Arbitrary metadata to extend functionality if a data service requires it
        bytes metadata;
    }
}

impl ReceiptAggregateVoucher {
    /// `valueAggregate` widened for cost arithmetic.
    pub fn value(&self) -> U256 {
        U256::from(self.valueAggregate)
    }
}
