// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Request and response records of the session operations.
//!
//! Every response that can reject client input carries an `accepted`/`valid` flag and an
//! optional `rejection_reason`.

use serde::{Deserialize, Serialize};
use thegraph_core::alloy::primitives::{Address, U256};

use super::RavRejection;
use crate::{
    escrow::EscrowAccount,
    pricing::PricingConfig,
    rav::SignedRav,
    session::{EndReason, SessionId, SessionInfo, Usage, UsageDelta},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub escrow_account: EscrowAccount,
    /// Data service the stream is served for. Taken from `initial_rav` when absent.
    #[serde(default)]
    pub data_service: Option<Address>,
    #[serde(default)]
    pub initial_rav: Option<SignedRav>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub accepted: bool,
    pub session_id: Option<SessionId>,
    pub pricing: Option<PricingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl StartSessionResponse {
    pub(crate) fn rejected(rejection: RavRejection) -> Self {
        Self {
            rejection_reason: Some(rejection.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatePaymentRequest {
    /// Session to resume. A new session is created when absent or unknown.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub payment_rav: Option<SignedRav>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatePaymentResponse {
    pub valid: bool,
    pub session_id: Option<SessionId>,
    pub pricing: Option<PricingConfig>,
    /// `None` when the balance could not be read.
    pub escrow_balance: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ValidatePaymentResponse {
    pub(crate) fn rejected(rejection: RavRejection) -> Self {
        Self {
            rejection_reason: Some(rejection.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportUsageRequest {
    pub session_id: SessionId,
    #[serde(default)]
    pub usage: UsageDelta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportUsageResponse {
    pub should_continue: bool,
    /// The provider should ask the client for a fresh RAV.
    pub rav_requested: bool,
    /// Totals after this report. `None` when the report was refused.
    pub accumulated_usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRavRequest {
    pub session_id: SessionId,
    #[serde(default)]
    pub signed_rav: Option<SignedRav>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRavResponse {
    pub accepted: bool,
    pub should_continue: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl SubmitRavResponse {
    pub(crate) fn accepted() -> Self {
        Self {
            accepted: true,
            should_continue: true,
            rejection_reason: None,
        }
    }

    pub(crate) fn rejected(rejection: RavRejection) -> Self {
        Self {
            accepted: false,
            should_continue: rejection.allows_continuation(),
            rejection_reason: Some(rejection.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSessionStatusRequest {
    pub session_id: SessionId,
}

/// Funding picture of a session. All amounts are in wei.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSessionStatusResponse {
    pub active: bool,
    pub session: Option<SessionInfo>,
    /// Zero when the balance could not be read, see `escrow_balance_known`.
    pub escrow_balance: U256,
    pub escrow_balance_known: bool,
    /// Total cost of the usage reported so far.
    pub accumulated_usage_value: U256,
    pub current_rav_value: U256,
    /// Usage cost not yet covered by the current RAV.
    pub uncommitted_usage: U256,
    pub funds_sufficient: bool,
    /// Blocks the remaining escrow can still pay for, zero without a per-block price.
    pub estimated_blocks_remaining: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndSessionRequest {
    pub session_id: SessionId,
    #[serde(default)]
    pub reason: EndReason,
    #[serde(default)]
    pub final_usage: Option<UsageDelta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndSessionResponse {
    pub session_id: SessionId,
    pub final_rav: Option<SignedRav>,
    pub total_usage: Usage,
    pub total_cost: U256,
    pub ended_at_ns: u64,
    pub end_reason: EndReason,
}
