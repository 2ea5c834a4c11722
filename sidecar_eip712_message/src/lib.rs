// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # EIP712 signed message
//!
//! This crate contains the `Eip712SignedMessage` struct which is used to sign and verify
//! Receipt Aggregate Vouchers using the EIP712 standard, and the [`authorization`] helpers
//! a payer uses to prove that a signer may sign vouchers on its behalf.
//!
//! # Example
//! ```rust
//! # use thegraph_core::alloy::{dyn_abi::Eip712Domain, signers::local::PrivateKeySigner, sol};
//! use sidecar_eip712_message::Eip712SignedMessage;
//! # sol! {
//! #     #[derive(Debug)]
//! #     struct Ping { uint64 nonce; }
//! # }
//! # let domain_separator = Eip712Domain::default();
//! # let wallet = PrivateKeySigner::random();
//!
//! let signed_message = Eip712SignedMessage::new(&domain_separator, Ping { nonce: 7 }, &wallet).unwrap();
//! let signer = signed_message.recover_signer(&domain_separator).unwrap();
//!
//! assert_eq!(signer, wallet.address());
//! ```

pub mod authorization;

use serde::{Deserialize, Serialize};
use thegraph_core::alloy::{
    dyn_abi::Eip712Domain,
    primitives::{Address, Signature},
    signers::{local::PrivateKeySigner, SignerSync},
    sol_types::SolStruct,
};

/// Errors returned by creation of messages and verify signature
#[derive(thiserror::Error, Debug)]
pub enum Eip712Error {
    /// `alloy` wallet error
    #[error(transparent)]
    WalletError(#[from] thegraph_core::alloy::signers::Error),

    /// `alloy` signature error
    #[error(transparent)]
    SignatureError(#[from] thegraph_core::alloy::primitives::SignatureError),
}

/// EIP712 signed message
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Eip712SignedMessage<M: SolStruct> {
    /// Message to be signed
    pub message: M,
    /// ECDSA Signature of eip712 hash of message
    pub signature: Signature,
}

impl<M: SolStruct> Eip712SignedMessage<M> {
    /// Creates a signed message with signed EIP712 hash of `message` using `signing_wallet`
    ///
    /// # Errors
    ///
    /// Returns [`Eip712Error::WalletError`] if could not sign using the wallet
    pub fn new(
        domain_separator: &Eip712Domain,
        message: M,
        signing_wallet: &PrivateKeySigner,
    ) -> Result<Self, Eip712Error> {
        let recovery_message_hash = message.eip712_signing_hash(domain_separator);

        let signature = signing_wallet.sign_hash_sync(&recovery_message_hash)?;

        Ok(Self { message, signature })
    }

    /// Recovers and returns the signer of the message from the signature.
    ///
    /// A signature produced under a different domain recovers to an unrelated address
    /// rather than failing, so callers must compare the result against the signers they trust.
    pub fn recover_signer(&self, domain_separator: &Eip712Domain) -> Result<Address, Eip712Error> {
        let recovery_message_hash = self.message.eip712_signing_hash(domain_separator);
        let recovered_address = self
            .signature
            .recover_address_from_prehash(&recovery_message_hash)?;
        Ok(recovered_address)
    }
}
