// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, SystemTime},
};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    error_handling::HandleError, http::StatusCode, routing::post_service, BoxError, Router,
};
use jsonrpsee::{
    proc_macros::rpc,
    server::{ServerBuilder, ServerConfig, ServerHandle, TowerService},
};
use log::info;
use sidecar_core::{
    escrow::EscrowBalanceQuerier,
    protocol::{
        EndSessionRequest, EndSessionResponse, GetSessionStatusRequest,
        GetSessionStatusResponse, ReportUsageRequest, ReportUsageResponse, SessionHandler,
        StartSessionRequest, StartSessionResponse, SubmitRavRequest, SubmitRavResponse,
        ValidatePaymentRequest, ValidatePaymentResponse,
    },
};
use thegraph_core::alloy::dyn_abi::Eip712Domain;
use tokio::{net::TcpListener, signal, task::JoinHandle};
use tower::layer::util::Identity;

use crate::{
    error_codes::JsonRpcWarningCode,
    jsonrpsee_helpers::{to_rpc_error, JsonRpcResponse, JsonRpcResult, JsonRpcWarning},
    metrics::{
        ACTIVE_SESSIONS, ESCROW_QUERY_FAILURES, RAVS_ACCEPTED, RAVS_REJECTED, SESSIONS_STARTED,
    },
};

/// Generates the `RpcServer` trait that is used to define the JSON-RPC API.
///
/// Note that because of the way the `rpc` macro works, we cannot document the RpcServer trait here.
/// As a result, we document the JSON-RPC API in the `sidecar_server/README.md` file.
/// Do not forget to update the documentation there if you make any changes to the JSON-RPC API.
///
/// Accepted signers are configured by the operator at startup; no method changes them.
#[rpc(server)]
pub trait Rpc {
    /// Returns the EIP-712 domain separator RAVs must be signed under.
    #[method(name = "eip712domain_info")]
    fn eip712_domain_info(&self) -> JsonRpcResult<Eip712Domain>;

    #[method(name = "start_session")]
    fn start_session(&self, request: StartSessionRequest)
        -> JsonRpcResult<StartSessionResponse>;

    #[method(name = "validate_payment")]
    async fn validate_payment(
        &self,
        request: ValidatePaymentRequest,
    ) -> JsonRpcResult<ValidatePaymentResponse>;

    #[method(name = "report_usage")]
    fn report_usage(&self, request: ReportUsageRequest) -> JsonRpcResult<ReportUsageResponse>;

    #[method(name = "submit_rav")]
    fn submit_rav(&self, request: SubmitRavRequest) -> JsonRpcResult<SubmitRavResponse>;

    #[method(name = "get_session_status")]
    async fn get_session_status(
        &self,
        request: GetSessionStatusRequest,
    ) -> JsonRpcResult<GetSessionStatusResponse>;

    #[method(name = "end_session")]
    fn end_session(&self, request: EndSessionRequest) -> JsonRpcResult<EndSessionResponse>;
}

struct RpcImpl<E> {
    handler: Arc<SessionHandler<E>>,
}

impl<E> RpcImpl<E> {
    fn refresh_active_sessions(&self) {
        ACTIVE_SESSIONS.set(self.handler.sessions().active().len() as i64);
    }
}

fn escrow_unavailable_warning() -> JsonRpcWarning {
    ESCROW_QUERY_FAILURES.inc();
    JsonRpcWarning::new(
        JsonRpcWarningCode::EscrowBalanceUnavailable as i32,
        "The escrow balance could not be read and is reported as zero.".to_string(),
        None::<()>,
    )
}

#[async_trait]
impl<E> RpcServer for RpcImpl<E>
where
    E: EscrowBalanceQuerier + 'static,
{
    fn eip712_domain_info(&self) -> JsonRpcResult<Eip712Domain> {
        Ok(JsonRpcResponse::ok(
            self.handler.verifier().domain_separator().clone(),
        ))
    }

    fn start_session(
        &self,
        request: StartSessionRequest,
    ) -> JsonRpcResult<StartSessionResponse> {
        let has_rav = request.initial_rav.is_some();
        let response = self.handler.start_session(request);
        if response.accepted {
            SESSIONS_STARTED.inc();
            if has_rav {
                RAVS_ACCEPTED.inc();
            }
            self.refresh_active_sessions();
        } else {
            RAVS_REJECTED.inc();
        }
        Ok(JsonRpcResponse::ok(response))
    }

    async fn validate_payment(
        &self,
        request: ValidatePaymentRequest,
    ) -> JsonRpcResult<ValidatePaymentResponse> {
        let resumed = request
            .session_id
            .as_ref()
            .is_some_and(|session_id| self.handler.sessions().get(session_id).is_ok());
        let response = self.handler.validate_payment(request).await;
        if !response.valid {
            RAVS_REJECTED.inc();
            return Ok(JsonRpcResponse::ok(response));
        }

        RAVS_ACCEPTED.inc();
        if !resumed {
            SESSIONS_STARTED.inc();
            self.refresh_active_sessions();
        }
        let mut warnings = Vec::new();
        if response.escrow_balance.is_none() {
            warnings.push(escrow_unavailable_warning());
        }
        Ok(JsonRpcResponse::warn(response, warnings))
    }

    fn report_usage(&self, request: ReportUsageRequest) -> JsonRpcResult<ReportUsageResponse> {
        self.handler
            .report_usage(request)
            .map(JsonRpcResponse::ok)
            .map_err(to_rpc_error)
    }

    fn submit_rav(&self, request: SubmitRavRequest) -> JsonRpcResult<SubmitRavResponse> {
        let response = self.handler.submit_rav(request);
        if response.accepted {
            RAVS_ACCEPTED.inc();
        } else {
            RAVS_REJECTED.inc();
        }
        Ok(JsonRpcResponse::ok(response))
    }

    async fn get_session_status(
        &self,
        request: GetSessionStatusRequest,
    ) -> JsonRpcResult<GetSessionStatusResponse> {
        let response = self.handler.get_session_status(request).await;
        let mut warnings = Vec::new();
        if response.session.is_some() && !response.escrow_balance_known {
            warnings.push(escrow_unavailable_warning());
        }
        Ok(JsonRpcResponse::warn(response, warnings))
    }

    fn end_session(&self, request: EndSessionRequest) -> JsonRpcResult<EndSessionResponse> {
        let response = self.handler.end_session(request).map_err(to_rpc_error)?;
        self.refresh_active_sessions();
        Ok(JsonRpcResponse::ok(response))
    }
}

pub async fn run_server<E>(
    port: u16,
    handler: Arc<SessionHandler<E>>,
    max_request_body_size: u32,
    max_response_body_size: u32,
    max_concurrent_connections: u32,
) -> Result<(JoinHandle<()>, SocketAddr)>
where
    E: EscrowBalanceQuerier + 'static,
{
    // Setting up the JSON RPC server
    let rpc_impl = RpcImpl { handler };
    let (json_rpc_service, _) = create_json_rpc_service(
        rpc_impl,
        max_request_body_size,
        max_response_body_size,
        max_concurrent_connections,
    )?;

    async fn handle_anyhow_error(err: BoxError) -> (StatusCode, String) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {err}"),
        )
    }
    let json_rpc_router = Router::new().route_service(
        "/",
        HandleError::new(post_service(json_rpc_service), handle_anyhow_error),
    );

    // Create a `TcpListener` using tokio.
    let listener = TcpListener::bind(&format!("0.0.0.0:{port}")).await?;

    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, json_rpc_router)
            .with_graceful_shutdown(shutdown_handler())
            .await
        {
            log::error!("Payment sidecar error: {e}");
        }
    });

    Ok((handle, addr))
}

/// Removes ended sessions once they are older than `retention`.
pub fn spawn_session_sweeper<E>(
    handler: Arc<SessionHandler<E>>,
    retention: Duration,
) -> JoinHandle<()>
where
    E: Send + Sync + 'static,
{
    let period = retention.clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let Some(cutoff) = SystemTime::now().checked_sub(retention) else {
                continue;
            };
            let removed = handler.sessions().delete_ended_before(cutoff);
            if removed > 0 {
                info!("Removed {removed} ended sessions");
            }
            ACTIVE_SESSIONS.set(handler.sessions().active().len() as i64);
        }
    })
}

/// Graceful shutdown handler
async fn shutdown_handler() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}

fn create_json_rpc_service<E>(
    rpc_impl: RpcImpl<E>,
    max_request_body_size: u32,
    max_response_body_size: u32,
    max_concurrent_connections: u32,
) -> Result<(TowerService<Identity, Identity>, ServerHandle)>
where
    E: EscrowBalanceQuerier + 'static,
{
    let config = ServerConfig::builder()
        .max_request_body_size(max_request_body_size)
        .max_response_body_size(max_response_body_size)
        .max_connections(max_concurrent_connections)
        .http_only()
        .build();

    let service_builder = ServerBuilder::new().set_config(config).to_service_builder();
    use jsonrpsee::server::stop_channel;
    let (stop_handle, server_handle) = stop_channel();
    let handle = service_builder.build(rpc_impl.into_rpc(), stop_handle);
    Ok((handle, server_handle))
}
