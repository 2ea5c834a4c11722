// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Structural errors of the sidecar core.
//!
//! Expected outcomes of untrusted client input (bad signatures, unknown signers,
//! stale RAVs, ...) are not errors; they are reported through
//! [`crate::protocol::RavRejection`] inside successful responses.

use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::{price::PriceError, session::SessionId};

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },
    #[error("invalid price: {0}")]
    InvalidPrice(#[from] PriceError),
}

pub type Result<T> = StdResult<T, Error>;
