// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Signer authorization proofs
//!
//! A payer may delegate RAV signing to another key. The delegated key proves it agreed to
//! sign on behalf of the payer (the *authorizer*) by signing a packed digest of
//! `(chain id, verifying contract, "authorizeSignerProof", deadline, authorizer)` with the
//! Ethereum personal-message prefix applied.
//!
//! These helpers are pure functions: they neither enforce the deadline nor record the
//! authorization anywhere.

use thegraph_core::alloy::{
    primitives::{keccak256, Address, Signature, B256, U256},
    signers::{local::PrivateKeySigner, SignerSync},
};

use crate::Eip712Error;

/// Literal tag mixed into every authorization proof digest.
pub const AUTHORIZE_SIGNER_PROOF_TAG: &str = "authorizeSignerProof";

/// Returns the tightly packed encoding that the proof digest is computed over.
pub fn authorization_proof_preimage(
    chain_id: u64,
    verifying_contract: Address,
    deadline: u64,
    authorizer: Address,
) -> Vec<u8> {
    let mut packed = Vec::with_capacity(32 + 20 + AUTHORIZE_SIGNER_PROOF_TAG.len() + 32 + 20);
    packed.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    packed.extend_from_slice(verifying_contract.as_slice());
    packed.extend_from_slice(AUTHORIZE_SIGNER_PROOF_TAG.as_bytes());
    packed.extend_from_slice(&U256::from(deadline).to_be_bytes::<32>());
    packed.extend_from_slice(authorizer.as_slice());
    packed
}

/// Keccak256 digest of [`authorization_proof_preimage`], before the personal-message prefix.
pub fn authorization_proof_digest(
    chain_id: u64,
    verifying_contract: Address,
    deadline: u64,
    authorizer: Address,
) -> B256 {
    keccak256(authorization_proof_preimage(
        chain_id,
        verifying_contract,
        deadline,
        authorizer,
    ))
}

/// Signs the authorization proof with `signer`, proving `signer` accepts to sign RAVs
/// for `authorizer` until `deadline` (unix seconds).
///
/// # Errors
///
/// Returns [`Eip712Error::WalletError`] if could not sign using the wallet
pub fn sign_authorization_proof(
    chain_id: u64,
    verifying_contract: Address,
    deadline: u64,
    authorizer: Address,
    signer: &PrivateKeySigner,
) -> Result<Signature, Eip712Error> {
    let digest = authorization_proof_digest(chain_id, verifying_contract, deadline, authorizer);
    // sign_message applies the "\x19Ethereum Signed Message:\n32" prefix before hashing
    Ok(signer.sign_message_sync(digest.as_slice())?)
}

/// Recovers the address that produced `proof`.
pub fn recover_authorization_proof_signer(
    chain_id: u64,
    verifying_contract: Address,
    deadline: u64,
    authorizer: Address,
    proof: &Signature,
) -> Result<Address, Eip712Error> {
    let digest = authorization_proof_digest(chain_id, verifying_contract, deadline, authorizer);
    Ok(proof.recover_address_from_msg(digest.as_slice())?)
}
