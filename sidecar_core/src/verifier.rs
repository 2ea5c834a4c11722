// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # RAV verification
//!
//! Recovers the signer of a [`SignedRav`] under the collector's EIP712 domain and checks it
//! against the provider's allow-list of [`AcceptedSigners`].
//!
//! Every accepted signer is bound to the payer that authorized it. A signer only speaks for
//! its own payer: a RAV naming any other payer is refused even when the signature is valid.

use std::collections::HashMap;

use parking_lot::RwLock;
use sidecar_eip712_message::Eip712Error;
use thegraph_core::alloy::{dyn_abi::Eip712Domain, primitives::Address};
use thiserror::Error;

use crate::rav::SignedRav;

#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("invalid RAV signature: {0}")]
    InvalidSignature(#[from] Eip712Error),
    #[error("signer {signer} is not authorized")]
    UnauthorizedSigner { signer: Address },
    #[error("signer {signer} is not authorized for payer {payer}")]
    SignerNotAuthorizedForPayer { signer: Address, payer: Address },
}

/// Addresses that payers authorized to sign RAVs on their behalf, keyed by signer.
///
/// Lookups take a shared lock, so concurrent verifications never wait on each other.
#[derive(Debug, Default)]
pub struct AcceptedSigners {
    authorizers: RwLock<HashMap<Address, Address>>,
}

impl AcceptedSigners {
    /// Builds the allow-list from `(signer, authorizer)` pairs.
    pub fn new(bindings: impl IntoIterator<Item = (Address, Address)>) -> Self {
        Self {
            authorizers: RwLock::new(bindings.into_iter().collect()),
        }
    }

    /// Binds `signer` to `authorizer`. Returns `true` if the signer was not already accepted.
    ///
    /// A signer that was already bound to another authorizer keeps its first binding.
    pub fn add(&self, signer: Address, authorizer: Address) -> bool {
        let mut authorizers = self.authorizers.write();
        if authorizers.contains_key(&signer) {
            return false;
        }
        authorizers.insert(signer, authorizer);
        true
    }

    /// Returns `true` if the signer was accepted.
    pub fn remove(&self, signer: &Address) -> bool {
        self.authorizers.write().remove(signer).is_some()
    }

    pub fn contains(&self, signer: &Address) -> bool {
        self.authorizers.read().contains_key(signer)
    }

    /// The payer `signer` signs for, if it is accepted at all.
    pub fn authorizer_of(&self, signer: &Address) -> Option<Address> {
        self.authorizers.read().get(signer).copied()
    }

    pub fn len(&self) -> usize {
        self.authorizers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.authorizers.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<(Address, Address)> {
        self.authorizers
            .read()
            .iter()
            .map(|(signer, authorizer)| (*signer, *authorizer))
            .collect()
    }
}

impl FromIterator<(Address, Address)> for AcceptedSigners {
    fn from_iter<T: IntoIterator<Item = (Address, Address)>>(iter: T) -> Self {
        Self::new(iter)
    }
}

pub struct RavVerifier {
    domain_separator: Eip712Domain,
    accepted_signers: AcceptedSigners,
}

impl RavVerifier {
    pub fn new(domain_separator: Eip712Domain, accepted_signers: AcceptedSigners) -> Self {
        Self {
            domain_separator,
            accepted_signers,
        }
    }

    pub fn domain_separator(&self) -> &Eip712Domain {
        &self.domain_separator
    }

    pub fn accepted_signers(&self) -> &AcceptedSigners {
        &self.accepted_signers
    }

    /// Recovers the address that signed `signed_rav`.
    pub fn verify_signature(&self, signed_rav: &SignedRav) -> Result<Address, VerificationError> {
        Ok(signed_rav.recover_signer(&self.domain_separator)?)
    }

    pub fn is_accepted_signer(&self, signer: &Address) -> bool {
        self.accepted_signers.contains(signer)
    }

    pub fn add_accepted_signer(&self, signer: Address, authorizer: Address) -> bool {
        self.accepted_signers.add(signer, authorizer)
    }

    pub fn remove_accepted_signer(&self, signer: &Address) -> bool {
        self.accepted_signers.remove(signer)
    }

    /// Recovers the signer and checks that it is accepted for the payer the RAV names.
    pub fn verify(&self, signed_rav: &SignedRav) -> Result<Address, VerificationError> {
        let signer = self.verify_signature(signed_rav)?;
        let payer = signed_rav.message.payer;
        match self.accepted_signers.authorizer_of(&signer) {
            None => Err(VerificationError::UnauthorizedSigner { signer }),
            Some(authorizer) if authorizer != payer => {
                Err(VerificationError::SignerNotAuthorizedForPayer { signer, payer })
            }
            Some(_) => Ok(signer),
        }
    }
}
