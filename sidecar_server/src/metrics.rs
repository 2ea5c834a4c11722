// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;

use anyhow::Result;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use log::{debug, error, info};
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge, TextEncoder};
use tokio::net::TcpListener;

// Register the metrics into the global metrics registry.
lazy_static! {
    pub static ref SESSIONS_STARTED: IntCounter = register_int_counter!(
        "sidecar_sessions_started_count",
        "Number of sessions opened, through StartSession or ValidatePayment."
    )
    .unwrap();
    pub static ref ACTIVE_SESSIONS: IntGauge = register_int_gauge!(
        "sidecar_active_sessions",
        "Number of sessions currently active."
    )
    .unwrap();
    pub static ref RAVS_ACCEPTED: IntCounter = register_int_counter!(
        "sidecar_ravs_accepted_count",
        "Number of RAVs accepted, including those presented when a session starts."
    )
    .unwrap();
    pub static ref RAVS_REJECTED: IntCounter = register_int_counter!(
        "sidecar_ravs_rejected_count",
        "Number of RAVs or session requests rejected (for any reason)."
    )
    .unwrap();
    pub static ref ESCROW_QUERY_FAILURES: IntCounter = register_int_counter!(
        "sidecar_escrow_query_failure_count",
        "Number of escrow balance lookups that failed or timed out."
    )
    .unwrap();
}

async fn handler_metrics() -> (StatusCode, String) {
    let metric_families = prometheus::gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(s) => (StatusCode::OK, s),
        Err(e) => {
            error!("Error encoding metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error encoding metrics: {e}"),
            )
        }
    }
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 Not Found")
}

async fn _run_server(port: u16) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(handler_metrics))
        .fallback(handler_404);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);
    axum::serve(listener, app).await?;
    debug!("Metrics server stopped");
    Ok(())
}

/// Serves the Prometheus metrics at `/metrics` until the process exits.
pub async fn run_server(port: u16) {
    if let Err(e) = _run_server(port).await {
        error!("Metrics server error: {:#?}", e);
    }
}
