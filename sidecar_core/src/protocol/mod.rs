// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The `protocol` module implements the session lifecycle a provider drives while it streams
//! data to a paying client.
//!
//! | Operation | Entry point |
//! |---|---|
//! | start a session | [`SessionHandler::start_session`] |
//! | validate the RAV accompanying a connection | [`SessionHandler::validate_payment`] |
//! | report usage | [`SessionHandler::report_usage`] |
//! | submit a fresh RAV | [`SessionHandler::submit_rav`] |
//! | report status and funding | [`SessionHandler::get_session_status`] |
//! | end a session | [`SessionHandler::end_session`] |
//!
//! Operations reject untrusted input with a [`RavRejection`] carried inside a successful
//! response. Only structural failures, such as an unknown session for
//! [`SessionHandler::report_usage`], are returned as [`crate::Error`].

mod handler;
mod messages;

use std::time::Duration;

use thegraph_core::alloy::primitives::{Address, U256};
use thiserror::Error;

pub use handler::{needs_rav_refresh, SessionHandler};
pub use messages::*;

use crate::{
    pricing::PricingConfig,
    session::{SessionState, SessionUpdateError},
    verifier::VerificationError,
};

/// Default bound on a single escrow balance lookup.
pub const DEFAULT_ESCROW_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Static configuration of the provider running the sidecar.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// The provider's own address. Escrow accounts and RAVs must name it as receiver.
    pub service_provider: Address,
    /// Collector contract, also the EIP712 verifying contract of RAVs.
    pub collector: Address,
    pub chain_id: u64,
    pub pricing: PricingConfig,
    pub escrow_query_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(service_provider: Address, collector: Address, chain_id: u64) -> Self {
        Self {
            service_provider,
            collector,
            chain_id,
            pricing: PricingConfig::default(),
            escrow_query_timeout: DEFAULT_ESCROW_QUERY_TIMEOUT,
        }
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_escrow_query_timeout(mut self, timeout: Duration) -> Self {
        self.escrow_query_timeout = timeout;
        self
    }
}

/// Why a session operation refused client input.
///
/// The `Display` text is sent to clients as `rejection_reason`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RavRejection {
    #[error("session not found")]
    SessionNotFound,
    #[error("session is {state}")]
    SessionInactive { state: SessionState },
    #[error("escrow receiver {received} does not match service provider {expected}")]
    ReceiverMismatch { expected: Address, received: Address },
    #[error("missing signed RAV")]
    MissingRav,
    #[error("invalid RAV signature: {reason}")]
    InvalidSignature { reason: String },
    #[error("signer {signer} is not authorized")]
    UnauthorizedSigner { signer: Address },
    #[error("signer {signer} is not authorized for payer {payer}")]
    SignerNotAuthorizedForPayer { signer: Address, payer: Address },
    #[error("RAV payer {received} does not match {expected}")]
    PayerMismatch { expected: Address, received: Address },
    #[error("RAV service provider {received} does not match {expected}")]
    ServiceProviderMismatch { expected: Address, received: Address },
    #[error("RAV value {received} is lower than current value {current}")]
    NonMonotonicValue { current: U256, received: U256 },
}

impl RavRejection {
    /// Whether the stream may keep running despite the rejection.
    ///
    /// Only a missing or inactive session stops the stream; a bad RAV leaves the client a
    /// chance to resubmit.
    pub fn allows_continuation(&self) -> bool {
        !matches!(
            self,
            RavRejection::SessionNotFound | RavRejection::SessionInactive { .. }
        )
    }
}

impl From<VerificationError> for RavRejection {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::InvalidSignature(source) => RavRejection::InvalidSignature {
                reason: source.to_string(),
            },
            VerificationError::UnauthorizedSigner { signer } => {
                RavRejection::UnauthorizedSigner { signer }
            }
            VerificationError::SignerNotAuthorizedForPayer { signer, payer } => {
                RavRejection::SignerNotAuthorizedForPayer { signer, payer }
            }
        }
    }
}

impl From<SessionUpdateError> for RavRejection {
    fn from(err: SessionUpdateError) -> Self {
        match err {
            SessionUpdateError::Inactive { state } => RavRejection::SessionInactive { state },
            SessionUpdateError::NonMonotonicValue { current, received } => {
                RavRejection::NonMonotonicValue { current, received }
            }
        }
    }
}
