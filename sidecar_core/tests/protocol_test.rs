// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{Arc, Barrier},
    thread,
    time::Duration,
};

use rstest::*;
use sidecar_core::{
    escrow::{memory::InMemoryEscrow, EscrowAccount},
    pricing::PricingConfig,
    protocol::{
        EndSessionRequest, GetSessionStatusRequest, ProviderConfig, ReportUsageRequest,
        SessionHandler, StartSessionRequest, SubmitRavRequest, ValidatePaymentRequest,
    },
    rav::{ReceiptAggregateVoucher, SignedRav},
    rav_eip712_domain,
    session::{EndReason, SessionId, SessionState, UsageDelta},
    signed_message::Eip712SignedMessage,
    verifier::AcceptedSigners,
    Error,
};
use thegraph_core::alloy::{
    dyn_abi::Eip712Domain,
    primitives::{Address, Bytes, FixedBytes, U256},
    signers::local::PrivateKeySigner,
};

const CHAIN_ID: u64 = 1337;

struct Fixture {
    handler: SessionHandler<InMemoryEscrow>,
    escrow: InMemoryEscrow,
    signer: PrivateKeySigner,
    domain_separator: Eip712Domain,
    payer: Address,
    provider: Address,
    collector: Address,
    data_service: Address,
}

impl Fixture {
    fn rav(&self, value: u128) -> SignedRav {
        self.rav_with(value, self.payer, self.provider, &self.signer)
    }

    fn rav_with(
        &self,
        value: u128,
        payer: Address,
        service_provider: Address,
        signer: &PrivateKeySigner,
    ) -> SignedRav {
        Eip712SignedMessage::new(
            &self.domain_separator,
            ReceiptAggregateVoucher {
                collectionId: FixedBytes::from([0xabu8; 32]),
                payer,
                dataService: self.data_service,
                serviceProvider: service_provider,
                timestampNs: value as u64,
                valueAggregate: value,
                metadata: Bytes::new(),
            },
            signer,
        )
        .unwrap()
    }

    fn escrow_account(&self) -> EscrowAccount {
        EscrowAccount {
            payer: self.payer,
            collector: self.collector,
            receiver: self.provider,
        }
    }

    fn start(&self, initial_rav: Option<SignedRav>) -> SessionId {
        let response = self.handler.start_session(StartSessionRequest {
            escrow_account: self.escrow_account(),
            data_service: None,
            initial_rav,
        });
        assert!(response.accepted, "{:?}", response.rejection_reason);
        response.session_id.unwrap()
    }
}

#[fixture]
fn fixture() -> Fixture {
    let signer = PrivateKeySigner::random();
    let payer = Address::from([0x01u8; 20]);
    let data_service = Address::from([0x02u8; 20]);
    let provider = Address::from([0x03u8; 20]);
    let collector = Address::from([0x11u8; 20]);
    let escrow = InMemoryEscrow::default();

    // 0.000001 per block, 0.000000001 per byte
    let pricing = PricingConfig::parse("0.000001", "0.000000001").unwrap();
    let config = ProviderConfig::new(provider, collector, CHAIN_ID)
        .with_pricing(pricing)
        .with_escrow_query_timeout(Duration::from_millis(500));
    let handler = SessionHandler::new(
        config,
        escrow.clone(),
        AcceptedSigners::new([(signer.address(), payer)]),
    );

    Fixture {
        handler,
        escrow,
        signer,
        domain_separator: rav_eip712_domain(CHAIN_ID, collector),
        payer,
        provider,
        collector,
        data_service,
    }
}

#[rstest]
fn start_session_without_rav(fixture: Fixture) {
    let session_id = fixture.start(None);

    let session = fixture.handler.sessions().get(&session_id).unwrap();
    assert!(session.is_active());
    assert_eq!(session.payer(), fixture.payer);
    assert_eq!(session.receiver(), fixture.provider);
    assert!(session.rav().is_none());
}

#[rstest]
fn start_session_attaches_initial_rav(fixture: Fixture) {
    let session_id = fixture.start(Some(fixture.rav(10)));

    let session = fixture.handler.sessions().get(&session_id).unwrap();
    assert_eq!(session.rav_value(), U256::from(10));
    assert_eq!(session.data_service(), fixture.data_service);
}

#[rstest]
fn start_session_rejects_foreign_receiver(fixture: Fixture) {
    let response = fixture.handler.start_session(StartSessionRequest {
        escrow_account: EscrowAccount {
            receiver: Address::from([0x99u8; 20]),
            ..fixture.escrow_account()
        },
        data_service: None,
        initial_rav: None,
    });

    assert!(!response.accepted);
    assert!(response.session_id.is_none());
    assert!(response.rejection_reason.unwrap().contains("receiver"));
    assert_eq!(fixture.handler.sessions().count(), 0);
}

#[rstest]
fn start_session_rejects_unauthorized_signer(fixture: Fixture) {
    let stranger = PrivateKeySigner::random();
    let rav = fixture.rav_with(10, fixture.payer, fixture.provider, &stranger);

    let response = fixture.handler.start_session(StartSessionRequest {
        escrow_account: fixture.escrow_account(),
        data_service: None,
        initial_rav: Some(rav),
    });

    assert!(!response.accepted);
    assert!(response.rejection_reason.unwrap().contains("not authorized"));
    assert_eq!(fixture.handler.sessions().count(), 0);
}

#[rstest]
fn start_session_rejects_rav_for_other_payer(fixture: Fixture) {
    let rav = fixture.rav_with(
        10,
        Address::from([0x77u8; 20]),
        fixture.provider,
        &fixture.signer,
    );

    let response = fixture.handler.start_session(StartSessionRequest {
        escrow_account: fixture.escrow_account(),
        data_service: None,
        initial_rav: Some(rav),
    });

    assert!(!response.accepted);
    assert!(response.rejection_reason.unwrap().contains("payer"));
    assert_eq!(fixture.handler.sessions().count(), 0);
}

#[rstest]
#[tokio::test]
async fn validate_payment_creates_session(fixture: Fixture) {
    fixture
        .escrow
        .set_balance(fixture.escrow_account(), U256::from(1_000));

    let response = fixture
        .handler
        .validate_payment(ValidatePaymentRequest {
            session_id: None,
            payment_rav: Some(fixture.rav(5)),
        })
        .await;

    assert!(response.valid);
    assert_eq!(response.escrow_balance, Some(U256::from(1_000)));
    assert_eq!(response.pricing, Some(fixture.handler.config().pricing));
    let session = fixture
        .handler
        .sessions()
        .get(&response.session_id.unwrap())
        .unwrap();
    assert_eq!(session.rav_value(), U256::from(5));
}

#[rstest]
#[tokio::test]
async fn validate_payment_resumes_known_session(fixture: Fixture) {
    let session_id = fixture.start(None);

    let response = fixture
        .handler
        .validate_payment(ValidatePaymentRequest {
            session_id: Some(session_id.clone()),
            payment_rav: Some(fixture.rav(5)),
        })
        .await;

    assert!(response.valid);
    assert_eq!(response.session_id, Some(session_id));
    // Balance lookups on unfunded accounts fail and are reported as unknown.
    assert_eq!(response.escrow_balance, None);
    assert_eq!(fixture.handler.sessions().count(), 1);
}

#[rstest]
#[tokio::test]
async fn validate_payment_rejects_bad_ravs(fixture: Fixture) {
    let stranger = PrivateKeySigner::random();
    let cases = [
        (None, "missing"),
        (
            Some(fixture.rav_with(5, fixture.payer, fixture.provider, &stranger)),
            "not authorized",
        ),
        (
            Some(fixture.rav_with(
                5,
                fixture.payer,
                Address::from([0x99u8; 20]),
                &fixture.signer,
            )),
            "service provider",
        ),
    ];

    for (payment_rav, reason) in cases {
        let response = fixture
            .handler
            .validate_payment(ValidatePaymentRequest {
                session_id: None,
                payment_rav,
            })
            .await;
        assert!(!response.valid);
        assert!(response.session_id.is_none());
        assert!(response.rejection_reason.unwrap().contains(reason));
    }
    assert_eq!(fixture.handler.sessions().count(), 0);
}

#[rstest]
fn report_usage_accumulates_priced_usage(fixture: Fixture) {
    let session_id = fixture.start(None);

    let response = fixture
        .handler
        .report_usage(ReportUsageRequest {
            session_id: session_id.clone(),
            usage: UsageDelta {
                blocks_processed: 1_000_000,
                bytes_transferred: 1_000,
                requests: 1,
            },
        })
        .unwrap();

    assert!(response.should_continue);
    // No RAV attached yet
    assert!(response.rav_requested);
    let usage = response.accumulated_usage.unwrap();
    assert_eq!(usage.blocks_processed, 1_000_000);
    assert_eq!(
        usage.cost,
        U256::from(1_000_000_000_000_000_000u128 + 1_000_000_000_000u128)
    );

    fixture.handler.submit_rav(SubmitRavRequest {
        session_id: session_id.clone(),
        signed_rav: Some(fixture.rav(1)),
    });
    let response = fixture
        .handler
        .report_usage(ReportUsageRequest {
            session_id,
            usage: UsageDelta::default(),
        })
        .unwrap();
    assert!(!response.rav_requested);
}

#[rstest]
fn report_usage_on_unknown_session_is_an_error(fixture: Fixture) {
    let result = fixture.handler.report_usage(ReportUsageRequest {
        session_id: SessionId::from("unknown"),
        usage: UsageDelta::default(),
    });

    assert!(matches!(result, Err(Error::SessionNotFound { .. })));
}

#[rstest]
fn report_usage_on_ended_session_stops_stream(fixture: Fixture) {
    let session_id = fixture.start(None);
    fixture
        .handler
        .end_session(EndSessionRequest {
            session_id: session_id.clone(),
            reason: EndReason::Completed,
            final_usage: None,
        })
        .unwrap();

    let response = fixture
        .handler
        .report_usage(ReportUsageRequest {
            session_id,
            usage: UsageDelta {
                blocks_processed: 1,
                ..Default::default()
            },
        })
        .unwrap();

    assert!(!response.should_continue);
    assert!(response.accumulated_usage.is_none());
    assert!(response.stop_reason.unwrap().contains("ended"));
}

#[rstest]
fn submit_rav_accepts_increasing_values(fixture: Fixture) {
    let session_id = fixture.start(None);

    for value in [10, 10, 25] {
        let response = fixture.handler.submit_rav(SubmitRavRequest {
            session_id: session_id.clone(),
            signed_rav: Some(fixture.rav(value)),
        });
        assert!(response.accepted, "{:?}", response.rejection_reason);
        assert!(response.should_continue);
    }

    let session = fixture.handler.sessions().get(&session_id).unwrap();
    assert_eq!(session.rav_value(), U256::from(25));
}

#[rstest]
fn submit_rav_rejects_lower_value(fixture: Fixture) {
    let session_id = fixture.start(Some(fixture.rav(100)));
    let stored = fixture
        .handler
        .sessions()
        .get(&session_id)
        .unwrap()
        .rav()
        .unwrap();

    let response = fixture.handler.submit_rav(SubmitRavRequest {
        session_id: session_id.clone(),
        signed_rav: Some(fixture.rav(99)),
    });

    assert!(!response.accepted);
    assert!(response.should_continue);
    assert!(response.rejection_reason.unwrap().contains("lower"));
    let session = fixture.handler.sessions().get(&session_id).unwrap();
    assert_eq!(session.rav(), Some(stored));
}

#[rstest]
fn submit_rav_for_unknown_session(fixture: Fixture) {
    let response = fixture.handler.submit_rav(SubmitRavRequest {
        session_id: SessionId::from("unknown"),
        signed_rav: Some(fixture.rav(1)),
    });

    assert!(!response.accepted);
    assert!(!response.should_continue);
    assert_eq!(response.rejection_reason.as_deref(), Some("session not found"));
}

#[rstest]
fn submit_rav_on_ended_session_stops_stream(fixture: Fixture) {
    let session_id = fixture.start(None);
    fixture
        .handler
        .end_session(EndSessionRequest {
            session_id: session_id.clone(),
            reason: EndReason::ClientDisconnected,
            final_usage: None,
        })
        .unwrap();

    let response = fixture.handler.submit_rav(SubmitRavRequest {
        session_id,
        signed_rav: Some(fixture.rav(1)),
    });

    assert!(!response.accepted);
    assert!(!response.should_continue);
}

#[rstest]
fn submit_rav_rejections_let_stream_continue(fixture: Fixture) {
    let session_id = fixture.start(None);
    let stranger = PrivateKeySigner::random();
    let cases = [
        None,
        Some(fixture.rav_with(5, fixture.payer, fixture.provider, &stranger)),
        Some(fixture.rav_with(
            5,
            Address::from([0x77u8; 20]),
            fixture.provider,
            &fixture.signer,
        )),
        Some(fixture.rav_with(
            5,
            fixture.payer,
            Address::from([0x99u8; 20]),
            &fixture.signer,
        )),
    ];

    for signed_rav in cases {
        let response = fixture.handler.submit_rav(SubmitRavRequest {
            session_id: session_id.clone(),
            signed_rav,
        });
        assert!(!response.accepted);
        assert!(response.should_continue);
        assert!(response.rejection_reason.is_some());
    }
    let session = fixture.handler.sessions().get(&session_id).unwrap();
    assert!(session.rav().is_none());
}

#[rstest]
#[tokio::test]
async fn concurrent_submissions_never_lower_the_rav(fixture: Fixture) {
    let fixture = Arc::new(fixture);
    let session_id = fixture.start(None);

    let tasks: Vec<_> = (1..=20u128)
        .map(|value| {
            let fixture = fixture.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move {
                fixture.handler.submit_rav(SubmitRavRequest {
                    session_id,
                    signed_rav: Some(fixture.rav(value)),
                })
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let session = fixture.handler.sessions().get(&session_id).unwrap();
    assert_eq!(session.rav_value(), U256::from(20));
}

#[rstest]
#[tokio::test]
async fn status_of_fresh_session(fixture: Fixture) {
    fixture
        .escrow
        .set_balance(fixture.escrow_account(), U256::from(1_000));
    let session_id = fixture.start(None);

    let status = fixture
        .handler
        .get_session_status(GetSessionStatusRequest { session_id })
        .await;

    assert!(status.active);
    assert_eq!(status.accumulated_usage_value, U256::ZERO);
    assert_eq!(status.uncommitted_usage, U256::ZERO);
    assert!(status.funds_sufficient);
    assert!(status.escrow_balance_known);
}

#[rstest]
#[tokio::test]
async fn status_of_unknown_session(fixture: Fixture) {
    let status = fixture
        .handler
        .get_session_status(GetSessionStatusRequest {
            session_id: SessionId::from("unknown"),
        })
        .await;

    assert!(!status.active);
    assert!(status.session.is_none());
}

#[rstest]
#[tokio::test]
async fn status_estimates_remaining_blocks(fixture: Fixture) {
    let price_per_block = U256::from(1_000_000_000_000u64);
    fixture
        .escrow
        .set_balance(fixture.escrow_account(), price_per_block * U256::from(100));
    let session_id = fixture.start(None);
    fixture
        .handler
        .report_usage(ReportUsageRequest {
            session_id: session_id.clone(),
            usage: UsageDelta {
                blocks_processed: 30,
                ..Default::default()
            },
        })
        .unwrap();
    // The RAV covers 10 of the 30 blocks
    fixture.handler.submit_rav(SubmitRavRequest {
        session_id: session_id.clone(),
        signed_rav: Some(fixture.rav(10_000_000_000_000)),
    });

    let status = fixture
        .handler
        .get_session_status(GetSessionStatusRequest { session_id })
        .await;

    assert_eq!(status.accumulated_usage_value, price_per_block * U256::from(30));
    assert_eq!(status.current_rav_value, price_per_block * U256::from(10));
    assert_eq!(status.uncommitted_usage, price_per_block * U256::from(20));
    assert!(status.funds_sufficient);
    assert_eq!(status.estimated_blocks_remaining, U256::from(80));
}

#[rstest]
#[tokio::test]
async fn status_survives_escrow_failure(fixture: Fixture) {
    let session_id = fixture.start(None);
    fixture
        .handler
        .report_usage(ReportUsageRequest {
            session_id: session_id.clone(),
            usage: UsageDelta {
                blocks_processed: 5,
                ..Default::default()
            },
        })
        .unwrap();

    // No escrow account was funded, so the lookup fails.
    let status = fixture
        .handler
        .get_session_status(GetSessionStatusRequest { session_id })
        .await;

    assert!(status.active);
    assert_eq!(status.escrow_balance, U256::ZERO);
    assert!(!status.escrow_balance_known);
    assert!(!status.funds_sufficient);
    assert_eq!(status.estimated_blocks_remaining, U256::ZERO);
}

#[rstest]
#[tokio::test]
async fn status_without_block_price_estimates_nothing() {
    let signer = PrivateKeySigner::random();
    let provider = Address::from([0x03u8; 20]);
    let collector = Address::from([0x11u8; 20]);
    let payer = Address::from([0x01u8; 20]);
    let escrow = InMemoryEscrow::default();
    escrow.set_balance(
        EscrowAccount {
            payer,
            collector,
            receiver: provider,
        },
        U256::from(1_000),
    );
    let handler = SessionHandler::new(
        ProviderConfig::new(provider, collector, CHAIN_ID),
        escrow,
        AcceptedSigners::new([(signer.address(), payer)]),
    );
    let session_id = handler
        .start_session(StartSessionRequest {
            escrow_account: EscrowAccount {
                payer,
                collector,
                receiver: provider,
            },
            data_service: None,
            initial_rav: None,
        })
        .session_id
        .unwrap();

    let status = handler
        .get_session_status(GetSessionStatusRequest { session_id })
        .await;

    assert_eq!(status.escrow_balance, U256::from(1_000));
    assert_eq!(status.estimated_blocks_remaining, U256::ZERO);
}

#[rstest]
fn end_session_returns_totals(fixture: Fixture) {
    let session_id = fixture.start(Some(fixture.rav(7)));
    fixture
        .handler
        .report_usage(ReportUsageRequest {
            session_id: session_id.clone(),
            usage: UsageDelta {
                blocks_processed: 2,
                bytes_transferred: 0,
                requests: 1,
            },
        })
        .unwrap();

    let response = fixture
        .handler
        .end_session(EndSessionRequest {
            session_id: session_id.clone(),
            reason: EndReason::Completed,
            final_usage: Some(UsageDelta {
                blocks_processed: 1,
                bytes_transferred: 0,
                requests: 1,
            }),
        })
        .unwrap();

    assert_eq!(response.total_usage.blocks_processed, 3);
    assert_eq!(response.total_usage.requests, 2);
    assert_eq!(response.total_cost, U256::from(3_000_000_000_000u64));
    assert_eq!(
        response.final_rav.map(|rav| rav.message.valueAggregate),
        Some(7)
    );
    assert_eq!(response.end_reason, EndReason::Completed);
    let session = fixture.handler.sessions().get(&session_id).unwrap();
    assert_eq!(session.state(), SessionState::Ended);
}

#[rstest]
fn end_session_twice_keeps_first_outcome(fixture: Fixture) {
    let session_id = fixture.start(None);
    let first = fixture
        .handler
        .end_session(EndSessionRequest {
            session_id: session_id.clone(),
            reason: EndReason::ClientDisconnected,
            final_usage: None,
        })
        .unwrap();
    thread::sleep(Duration::from_millis(2));

    let second = fixture
        .handler
        .end_session(EndSessionRequest {
            session_id,
            reason: EndReason::Completed,
            final_usage: Some(UsageDelta {
                blocks_processed: 10,
                ..Default::default()
            }),
        })
        .unwrap();

    assert_eq!(second.ended_at_ns, first.ended_at_ns);
    assert_eq!(second.end_reason, EndReason::ClientDisconnected);
    assert_eq!(second.total_usage.blocks_processed, 0);
}

#[rstest]
fn end_unknown_session_is_an_error(fixture: Fixture) {
    let result = fixture.handler.end_session(EndSessionRequest {
        session_id: SessionId::from("unknown"),
        reason: EndReason::Unspecified,
        final_usage: None,
    });

    assert!(matches!(result, Err(Error::SessionNotFound { .. })));
}

#[rstest]
fn deleted_session_is_not_found(fixture: Fixture) {
    let session_id = fixture.start(None);
    fixture.handler.sessions().delete(&session_id);

    let response = fixture.handler.submit_rav(SubmitRavRequest {
        session_id,
        signed_rav: Some(fixture.rav(1)),
    });
    assert_eq!(response.rejection_reason.as_deref(), Some("session not found"));
}

#[rstest]
fn usage_racing_end_session_is_counted_or_refused(fixture: Fixture) {
    let fixture = Arc::new(fixture);

    for _ in 0..50 {
        let session_id = fixture.start(None);
        let barrier = Arc::new(Barrier::new(5));
        let reporters: Vec<_> = (0..4)
            .map(|_| {
                let fixture = fixture.clone();
                let session_id = session_id.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let mut acknowledged = 0u64;
                    loop {
                        let response = fixture
                            .handler
                            .report_usage(ReportUsageRequest {
                                session_id: session_id.clone(),
                                usage: UsageDelta {
                                    blocks_processed: 1,
                                    bytes_transferred: 10,
                                    requests: 1,
                                },
                            })
                            .unwrap();
                        if !response.should_continue {
                            return acknowledged;
                        }
                        acknowledged += 1;
                    }
                })
            })
            .collect();

        barrier.wait();
        let ended = fixture
            .handler
            .end_session(EndSessionRequest {
                session_id: session_id.clone(),
                reason: EndReason::Completed,
                final_usage: None,
            })
            .unwrap();
        let acknowledged: u64 = reporters
            .into_iter()
            .map(|reporter| reporter.join().unwrap())
            .sum();

        // Every acknowledged report is in the final totals, and nothing lands afterwards.
        assert_eq!(ended.total_usage.blocks_processed, acknowledged);
        assert_eq!(ended.total_usage.requests, acknowledged);
        let session = fixture.handler.sessions().get(&session_id).unwrap();
        assert_eq!(session.usage(), ended.total_usage);
        assert_eq!(session.usage().cost, ended.total_cost);
    }
}

#[rstest]
fn signers_added_at_runtime_are_accepted(fixture: Fixture) {
    let session_id = fixture.start(None);
    let delegate = PrivateKeySigner::random();
    let rav = fixture.rav_with(5, fixture.payer, fixture.provider, &delegate);

    let response = fixture.handler.submit_rav(SubmitRavRequest {
        session_id: session_id.clone(),
        signed_rav: Some(rav.clone()),
    });
    assert!(!response.accepted);

    assert!(fixture
        .handler
        .add_accepted_signer(delegate.address(), fixture.payer));
    let response = fixture.handler.submit_rav(SubmitRavRequest {
        session_id,
        signed_rav: Some(rav),
    });
    assert!(response.accepted);
}

#[rstest]
fn delegate_of_one_payer_cannot_sign_for_another(fixture: Fixture) {
    let session_id = fixture.start(None);
    let other_payer = Address::from([0x77u8; 20]);
    let delegate = PrivateKeySigner::random();
    assert!(fixture
        .handler
        .add_accepted_signer(delegate.address(), other_payer));

    // A RAV charged to the session's payer, signed by a key the payer never authorized.
    let response = fixture.handler.submit_rav(SubmitRavRequest {
        session_id: session_id.clone(),
        signed_rav: Some(fixture.rav_with(
            5,
            fixture.payer,
            fixture.provider,
            &delegate,
        )),
    });
    assert!(!response.accepted);
    assert!(response
        .rejection_reason
        .unwrap()
        .contains("is not authorized for payer"));

    let response = fixture.handler.start_session(StartSessionRequest {
        escrow_account: fixture.escrow_account(),
        data_service: None,
        initial_rav: Some(fixture.rav_with(
            5,
            fixture.payer,
            fixture.provider,
            &delegate,
        )),
    });
    assert!(!response.accepted);

    let session = fixture.handler.sessions().get(&session_id).unwrap();
    assert!(session.rav().is_none());
}

#[rstest]
#[tokio::test]
async fn validate_payment_refuses_delegate_of_another_payer(fixture: Fixture) {
    let other_payer = Address::from([0x77u8; 20]);
    let delegate = PrivateKeySigner::random();
    fixture
        .handler
        .add_accepted_signer(delegate.address(), other_payer);

    let response = fixture
        .handler
        .validate_payment(ValidatePaymentRequest {
            session_id: None,
            payment_rav: Some(fixture.rav_with(
                5,
                fixture.payer,
                fixture.provider,
                &delegate,
            )),
        })
        .await;

    assert!(!response.valid);
    assert_eq!(fixture.handler.sessions().count(), 0);
}
