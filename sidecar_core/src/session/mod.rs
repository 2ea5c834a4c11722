// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Sessions
//!
//! A [`Session`] is the in-memory record of one client's metered stream: who pays, who is
//! paid, how much has been consumed and the latest RAV the client handed over.
//!
//! Identity fields are immutable. Everything else sits behind a single per-session lock, and
//! every operation that reads, decides and writes ([`Session::add_usage`],
//! [`Session::compare_and_set_rav`], [`Session::finish`]) does so while holding that lock.
//! Two concurrent RAV submissions can therefore never both pass the monotonicity check against
//! the same stale value, and no usage lands on a session after it ended.

mod store;

use std::{fmt, time::SystemTime};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thegraph_core::alloy::primitives::{Address, U256};
use thiserror::Error;
use uuid::Uuid;

pub use store::SessionStore;

use crate::{pricing::PricingConfig, rav::SignedRav, timestamp_ns};

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Active,
    /// Reserved. No operation moves a session here yet.
    Paused,
    Ended,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EndReason {
    #[default]
    Unspecified,
    Completed,
    ClientDisconnected,
    ProviderStopped,
    InsufficientFunds,
    PaymentError,
}

/// Usage reported by the provider since its previous report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageDelta {
    pub blocks_processed: u64,
    pub bytes_transferred: u64,
    pub requests: u64,
}

/// Usage accumulated over the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub blocks_processed: u64,
    pub bytes_transferred: u64,
    pub requests: u64,
    pub cost: U256,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdateError {
    #[error("session is {state}")]
    Inactive { state: SessionState },
    #[error("RAV value {received} is lower than current value {current}")]
    NonMonotonicValue { current: U256, received: U256 },
}

/// Read-only projection of a session for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub state: SessionState,
    pub payer: Address,
    pub receiver: Address,
    pub data_service: Address,
    pub current_rav: Option<SignedRav>,
    pub accumulated_usage: Usage,
    pub created_at_ns: u64,
    pub updated_at_ns: u64,
    pub ended_at_ns: Option<u64>,
    pub end_reason: Option<EndReason>,
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    updated_at: SystemTime,
    ended_at: Option<SystemTime>,
    end_reason: Option<EndReason>,
    current_rav: Option<SignedRav>,
    usage: Usage,
    pricing: Option<PricingConfig>,
}

impl SessionInner {
    fn add_usage(&mut self, blocks: u64, bytes: u64, requests: u64, cost: Option<U256>) {
        let usage = &mut self.usage;
        usage.blocks_processed = usage.blocks_processed.saturating_add(blocks);
        usage.bytes_transferred = usage.bytes_transferred.saturating_add(bytes);
        usage.requests = usage.requests.saturating_add(requests);
        if let Some(cost) = cost {
            usage.cost = usage.cost.saturating_add(cost);
        }
        self.updated_at = SystemTime::now();
    }
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    payer: Address,
    receiver: Address,
    data_service: Address,
    created_at: SystemTime,
    inner: RwLock<SessionInner>,
}

impl Session {
    /// Creates an active session with zero usage.
    pub fn new(id: SessionId, payer: Address, receiver: Address, data_service: Address) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            payer,
            receiver,
            data_service,
            created_at: now,
            inner: RwLock::new(SessionInner {
                state: SessionState::Active,
                updated_at: now,
                ended_at: None,
                end_reason: None,
                current_rav: None,
                usage: Usage::default(),
                pricing: None,
            }),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn payer(&self) -> Address {
        self.payer
    }

    pub fn receiver(&self) -> Address {
        self.receiver
    }

    pub fn data_service(&self) -> Address {
        self.data_service
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn updated_at(&self) -> SystemTime {
        self.inner.read().updated_at
    }

    pub fn ended_at(&self) -> Option<SystemTime> {
        self.inner.read().ended_at
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.inner.read().end_reason
    }

    /// Adds to the usage counters of an active session and returns the new totals. A `None`
    /// cost leaves the total cost unchanged.
    pub fn add_usage(
        &self,
        blocks: u64,
        bytes: u64,
        requests: u64,
        cost: Option<U256>,
    ) -> Result<Usage, SessionUpdateError> {
        let mut inner = self.inner.write();
        if inner.state != SessionState::Active {
            return Err(SessionUpdateError::Inactive { state: inner.state });
        }
        inner.add_usage(blocks, bytes, requests, cost);
        Ok(inner.usage)
    }

    pub fn usage(&self) -> Usage {
        self.inner.read().usage
    }

    pub fn rav(&self) -> Option<SignedRav> {
        self.inner.read().current_rav.clone()
    }

    /// Replaces the stored RAV unconditionally. Prefer [`Session::compare_and_set_rav`]
    /// for RAVs received from clients.
    pub fn set_rav(&self, signed_rav: SignedRav) {
        let mut inner = self.inner.write();
        inner.current_rav = Some(signed_rav);
        inner.updated_at = SystemTime::now();
    }

    /// Atomically stores `signed_rav` if the session is active and its value is not lower
    /// than the stored RAV's value.
    pub fn compare_and_set_rav(&self, signed_rav: SignedRav) -> Result<(), SessionUpdateError> {
        let mut inner = self.inner.write();
        if inner.state != SessionState::Active {
            return Err(SessionUpdateError::Inactive { state: inner.state });
        }
        if let Some(current) = &inner.current_rav {
            let current = current.message.value();
            let received = signed_rav.message.value();
            if received < current {
                return Err(SessionUpdateError::NonMonotonicValue { current, received });
            }
        }
        inner.current_rav = Some(signed_rav);
        inner.updated_at = SystemTime::now();
        Ok(())
    }

    /// Value of the stored RAV, zero when none was received yet.
    pub fn rav_value(&self) -> U256 {
        self.inner
            .read()
            .current_rav
            .as_ref()
            .map(|rav| rav.message.value())
            .unwrap_or_default()
    }

    pub fn set_pricing(&self, pricing: PricingConfig) {
        self.inner.write().pricing = Some(pricing);
    }

    pub fn pricing(&self) -> Option<PricingConfig> {
        self.inner.read().pricing
    }

    /// Ends the session and returns its end time.
    ///
    /// Ending an already ended session changes nothing and returns the original end time.
    pub fn end(&self, reason: EndReason) -> SystemTime {
        self.finish(reason, None, None)
    }

    /// Applies the final usage report, if any, then ends the session, all under one lock.
    ///
    /// On an already ended session the final usage is ignored and the original end time
    /// is returned.
    pub fn finish(
        &self,
        reason: EndReason,
        final_usage: Option<&UsageDelta>,
        final_cost: Option<U256>,
    ) -> SystemTime {
        let mut inner = self.inner.write();
        if let Some(ended_at) = inner.ended_at {
            return ended_at;
        }
        if let Some(delta) = final_usage {
            inner.add_usage(
                delta.blocks_processed,
                delta.bytes_transferred,
                delta.requests,
                final_cost,
            );
        }
        let now = SystemTime::now();
        inner.state = SessionState::Ended;
        inner.ended_at = Some(now);
        inner.end_reason = Some(reason);
        inner.updated_at = now;
        now
    }

    pub fn to_session_info(&self) -> SessionInfo {
        let inner = self.inner.read();
        SessionInfo {
            session_id: self.id.clone(),
            state: inner.state,
            payer: self.payer,
            receiver: self.receiver,
            data_service: self.data_service,
            current_rav: inner.current_rav.clone(),
            accumulated_usage: inner.usage,
            created_at_ns: timestamp_ns(self.created_at),
            updated_at_ns: timestamp_ns(inner.updated_at),
            ended_at_ns: inner.ended_at.map(timestamp_ns),
            end_reason: inner.end_reason,
        }
    }
}
