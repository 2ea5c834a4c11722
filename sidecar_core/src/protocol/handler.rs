// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use log::{debug, info, warn};
use thegraph_core::alloy::primitives::{Address, U256};

use super::{
    EndSessionRequest, EndSessionResponse, GetSessionStatusRequest, GetSessionStatusResponse,
    ProviderConfig, RavRejection, ReportUsageRequest, ReportUsageResponse, StartSessionRequest,
    StartSessionResponse, SubmitRavRequest, SubmitRavResponse, ValidatePaymentRequest,
    ValidatePaymentResponse,
};
use crate::{
    escrow::{query_escrow_balance, EscrowAccount, EscrowBalance, EscrowBalanceQuerier},
    pricing::PricingConfig,
    rav::SignedRav,
    rav_eip712_domain,
    session::{Session, SessionStore},
    timestamp_ns,
    verifier::{AcceptedSigners, RavVerifier},
    Error,
};

/// Decides whether the provider should ask the client for a fresh RAV after a usage report.
///
/// The current policy only asks when no RAV is attached to the session yet. A value-based
/// policy (for instance relative to the uncommitted usage) plugs in here.
pub fn needs_rav_refresh(session: &Session) -> bool {
    session.rav().is_none()
}

/// Drives the session lifecycle for one provider.
///
/// Owns the session store and the signer allow-list; the escrow querier `E` is supplied
/// by the user, see [`EscrowBalanceQuerier`].
pub struct SessionHandler<E> {
    config: ProviderConfig,
    verifier: RavVerifier,
    sessions: SessionStore,
    escrow: E,
}

impl<E> SessionHandler<E> {
    pub fn new(config: ProviderConfig, escrow: E, accepted_signers: AcceptedSigners) -> Self {
        let domain_separator = rav_eip712_domain(config.chain_id, config.collector);
        Self {
            verifier: RavVerifier::new(domain_separator, accepted_signers),
            sessions: SessionStore::new(),
            config,
            escrow,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn verifier(&self) -> &RavVerifier {
        &self.verifier
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn escrow(&self) -> &E {
        &self.escrow
    }

    /// Accepts RAVs that `signer` signs for `authorizer` from now on.
    ///
    /// The caller vouches for the binding; proofs of authorization are checked upstream.
    pub fn add_accepted_signer(&self, signer: Address, authorizer: Address) -> bool {
        let added = self.verifier.add_accepted_signer(signer, authorizer);
        if added {
            info!("Accepted signer {signer} for payer {authorizer}");
        }
        added
    }

    pub fn remove_accepted_signer(&self, signer: &Address) -> bool {
        let removed = self.verifier.remove_accepted_signer(signer);
        if removed {
            info!("Revoked signer {signer}");
        }
        removed
    }

    fn escrow_account(&self, session: &Session) -> EscrowAccount {
        EscrowAccount {
            payer: session.payer(),
            collector: self.config.collector,
            receiver: session.receiver(),
        }
    }

    fn session_pricing(&self, session: &Session) -> PricingConfig {
        session.pricing().unwrap_or(self.config.pricing)
    }

    /// Verifies the signer of `signed_rav` and that it was issued by `payer` to this provider.
    fn check_rav(&self, signed_rav: &SignedRav, payer: Address) -> Result<(), RavRejection> {
        self.verifier.verify(signed_rav)?;
        let rav = &signed_rav.message;
        if rav.payer != payer {
            return Err(RavRejection::PayerMismatch {
                expected: payer,
                received: rav.payer,
            });
        }
        if rav.serviceProvider != self.config.service_provider {
            return Err(RavRejection::ServiceProviderMismatch {
                expected: self.config.service_provider,
                received: rav.serviceProvider,
            });
        }
        Ok(())
    }

    /// Opens a session for `request.escrow_account`.
    ///
    /// Nothing is created when the escrow account is not payable to this provider or when
    /// the optional initial RAV does not check out.
    pub fn start_session(&self, request: StartSessionRequest) -> StartSessionResponse {
        let escrow_account = request.escrow_account;
        if escrow_account.receiver != self.config.service_provider {
            debug!(
                "Refusing session for payer {}: receiver {} is not us",
                escrow_account.payer, escrow_account.receiver
            );
            return StartSessionResponse::rejected(RavRejection::ReceiverMismatch {
                expected: self.config.service_provider,
                received: escrow_account.receiver,
            });
        }

        if let Some(initial_rav) = &request.initial_rav {
            if let Err(rejection) = self.check_rav(initial_rav, escrow_account.payer) {
                debug!(
                    "Refusing session for payer {}: {rejection}",
                    escrow_account.payer
                );
                return StartSessionResponse::rejected(rejection);
            }
        }

        let data_service = request
            .data_service
            .or_else(|| {
                request
                    .initial_rav
                    .as_ref()
                    .map(|rav| rav.message.dataService)
            })
            .unwrap_or_default();
        let session = self
            .sessions
            .create(escrow_account.payer, escrow_account.receiver, data_service);
        session.set_pricing(self.config.pricing);
        if let Some(initial_rav) = request.initial_rav {
            session.set_rav(initial_rav);
        }
        info!(
            "Started session {} for payer {}",
            session.id(),
            escrow_account.payer
        );

        StartSessionResponse {
            accepted: true,
            session_id: Some(session.id().clone()),
            pricing: Some(self.config.pricing),
            rejection_reason: None,
        }
    }

    /// Validates the RAV a client presents when it connects, attaching it to the session
    /// named by the client or to a new one.
    pub async fn validate_payment(
        &self,
        request: ValidatePaymentRequest,
    ) -> ValidatePaymentResponse
    where
        E: EscrowBalanceQuerier,
    {
        let Some(signed_rav) = request.payment_rav else {
            return ValidatePaymentResponse::rejected(RavRejection::MissingRav);
        };
        let payer = signed_rav.message.payer;
        if let Err(rejection) = self.check_rav(&signed_rav, payer) {
            debug!("Invalid payment from payer {payer}: {rejection}");
            return ValidatePaymentResponse::rejected(rejection);
        }

        let existing = request
            .session_id
            .as_ref()
            .and_then(|session_id| self.sessions.get(session_id).ok());
        let session = match existing {
            Some(session) => {
                if session.payer() != payer {
                    return ValidatePaymentResponse::rejected(RavRejection::PayerMismatch {
                        expected: session.payer(),
                        received: payer,
                    });
                }
                if let Err(err) = session.compare_and_set_rav(signed_rav) {
                    return ValidatePaymentResponse::rejected(err.into());
                }
                session
            }
            None => {
                let session = self.sessions.create(
                    payer,
                    self.config.service_provider,
                    signed_rav.message.dataService,
                );
                session.set_rav(signed_rav);
                session
            }
        };
        session.set_pricing(self.config.pricing);

        let balance = query_escrow_balance(
            &self.escrow,
            &self.escrow_account(&session),
            self.config.escrow_query_timeout,
        )
        .await;

        ValidatePaymentResponse {
            valid: true,
            session_id: Some(session.id().clone()),
            pricing: Some(self.config.pricing),
            escrow_balance: balance.known(),
            rejection_reason: None,
        }
    }

    /// Adds the reported usage to the session and prices it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the session does not exist. An ended session
    /// is not an error; the response tells the provider to stop.
    pub fn report_usage(&self, request: ReportUsageRequest) -> Result<ReportUsageResponse, Error> {
        let session = self.sessions.get(&request.session_id)?;
        let usage = request.usage;
        let cost = self
            .session_pricing(&session)
            .calculate_usage_cost(usage.blocks_processed, usage.bytes_transferred);
        // The state check and the update share the session lock, so a concurrent
        // end_session either sees this usage in its totals or makes this call fail.
        let accumulated = match session.add_usage(
            usage.blocks_processed,
            usage.bytes_transferred,
            usage.requests,
            Some(cost),
        ) {
            Ok(accumulated) => accumulated,
            Err(err) => {
                let rejection = RavRejection::from(err);
                return Ok(ReportUsageResponse {
                    should_continue: false,
                    rav_requested: false,
                    accumulated_usage: None,
                    stop_reason: Some(rejection.to_string()),
                });
            }
        };

        Ok(ReportUsageResponse {
            should_continue: true,
            rav_requested: needs_rav_refresh(&session),
            accumulated_usage: Some(accumulated),
            stop_reason: None,
        })
    }

    /// Replaces the session's RAV with a newer one.
    ///
    /// The monotonicity check and the replacement happen atomically under the session lock.
    pub fn submit_rav(&self, request: SubmitRavRequest) -> SubmitRavResponse {
        let Ok(session) = self.sessions.get(&request.session_id) else {
            return SubmitRavResponse::rejected(RavRejection::SessionNotFound);
        };
        if !session.is_active() {
            return SubmitRavResponse::rejected(RavRejection::SessionInactive {
                state: session.state(),
            });
        }
        let Some(signed_rav) = request.signed_rav else {
            return SubmitRavResponse::rejected(RavRejection::MissingRav);
        };
        if let Err(rejection) = self.check_rav(&signed_rav, session.payer()) {
            debug!("Rejected RAV for session {}: {rejection}", session.id());
            return SubmitRavResponse::rejected(rejection);
        }
        if signed_rav.message.serviceProvider != session.receiver() {
            return SubmitRavResponse::rejected(RavRejection::ServiceProviderMismatch {
                expected: session.receiver(),
                received: signed_rav.message.serviceProvider,
            });
        }

        let value = signed_rav.message.value();
        match session.compare_and_set_rav(signed_rav) {
            Ok(()) => {
                debug!("Accepted RAV of {value} for session {}", session.id());
                SubmitRavResponse::accepted()
            }
            Err(err) => {
                warn!("Rejected RAV for session {}: {err}", session.id());
                SubmitRavResponse::rejected(err.into())
            }
        }
    }

    /// Reports the funding state of a session. Never fails: an unknown session is reported
    /// as inactive and an unreadable escrow balance counts as zero.
    pub async fn get_session_status(
        &self,
        request: GetSessionStatusRequest,
    ) -> GetSessionStatusResponse
    where
        E: EscrowBalanceQuerier,
    {
        let Ok(session) = self.sessions.get(&request.session_id) else {
            return GetSessionStatusResponse::default();
        };
        let info = session.to_session_info();
        let total_cost = info.accumulated_usage.cost;
        let current_rav_value = info
            .current_rav
            .as_ref()
            .map(|rav| rav.message.value())
            .unwrap_or_default();
        let uncommitted_usage = total_cost.saturating_sub(current_rav_value);

        let balance = query_escrow_balance(
            &self.escrow,
            &self.escrow_account(&session),
            self.config.escrow_query_timeout,
        )
        .await;
        let escrow_balance = balance.or_zero();

        let price_per_block = self.session_pricing(&session).price_per_block.wei();
        let estimated_blocks_remaining = if price_per_block.is_zero() {
            U256::ZERO
        } else {
            escrow_balance.saturating_sub(uncommitted_usage) / price_per_block
        };

        GetSessionStatusResponse {
            active: session.is_active(),
            session: Some(info),
            escrow_balance,
            escrow_balance_known: matches!(balance, EscrowBalance::Known(_)),
            accumulated_usage_value: total_cost,
            current_rav_value,
            uncommitted_usage,
            funds_sufficient: escrow_balance >= uncommitted_usage,
            estimated_blocks_remaining,
        }
    }

    /// Applies the final usage report and ends the session.
    ///
    /// Ending a session twice returns the outcome of the first call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] if the session does not exist.
    pub fn end_session(&self, request: EndSessionRequest) -> Result<EndSessionResponse, Error> {
        let session: Arc<Session> = self.sessions.get(&request.session_id)?;
        let final_cost = request.final_usage.as_ref().map(|usage| {
            self.session_pricing(&session)
                .calculate_usage_cost(usage.blocks_processed, usage.bytes_transferred)
        });
        let ended_at = session.finish(request.reason, request.final_usage.as_ref(), final_cost);
        let info = session.to_session_info();
        info!(
            "Ended session {} ({}), total cost {}",
            session.id(),
            info.end_reason.unwrap_or(request.reason),
            info.accumulated_usage.cost
        );

        Ok(EndSessionResponse {
            session_id: info.session_id,
            final_rav: info.current_rav,
            total_usage: info.accumulated_usage,
            total_cost: info.accumulated_usage.cost,
            ended_at_ns: timestamp_ns(ended_at),
            end_reason: info.end_reason.unwrap_or(request.reason),
        })
    }
}
