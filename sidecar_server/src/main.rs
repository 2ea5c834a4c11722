// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use log::{debug, info, warn};
use sidecar_core::{
    protocol::{ProviderConfig, SessionHandler},
    verifier::AcceptedSigners,
};
use sidecar_server::{
    config::{self, SignerBinding},
    escrow_rpc::ChainEscrowQuerier,
    metrics, server,
};
use thegraph_core::alloy::primitives::Address;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for JSON-RPC requests.
    /// Defaults to 8080.
    #[arg(long, default_value_t = 8080, env = "SIDECAR_PORT")]
    port: u16,

    /// Chain ID of the chain the collector and escrow contracts are deployed on.
    #[arg(long, default_value_t = 1, env = "SIDECAR_CHAIN_ID")]
    chain_id: u64,

    /// Collector contract address. RAVs are signed for it (EIP-712 verifying contract).
    #[arg(long, env = "SIDECAR_COLLECTOR")]
    collector: Address,

    /// Address of the provider running this sidecar. RAVs and escrow accounts must name it as
    /// the receiver.
    #[arg(long, env = "SIDECAR_SERVICE_PROVIDER")]
    service_provider: Address,

    /// Payments escrow contract address.
    #[arg(long, env = "SIDECAR_ESCROW_CONTRACT")]
    escrow_contract: Address,

    /// Ethereum JSON-RPC endpoint used to read escrow balances.
    #[arg(long, env = "SIDECAR_ESCROW_RPC_URL")]
    escrow_rpc_url: String,

    /// Signers whose RAVs are accepted, each bound to the payer that authorized it.
    /// Expects a comma-separated list of `<signer>:<authorizer>` entries. A bare `<signer>`
    /// signs for itself.
    #[arg(long, env = "SIDECAR_ACCEPTED_SIGNERS", value_delimiter = ',')]
    accepted_signers: Option<Vec<SignerBinding>>,

    /// Bound on a single escrow balance lookup, in milliseconds.
    /// Defaults to 2000.
    #[arg(long, default_value_t = 2000, env = "SIDECAR_ESCROW_QUERY_TIMEOUT_MS")]
    escrow_query_timeout_ms: u64,

    /// How long ended sessions are kept before being removed, in seconds.
    /// Defaults to 3600.
    #[arg(long, default_value_t = 3600, env = "SIDECAR_SESSION_RETENTION_SECS")]
    session_retention_secs: u64,

    /// JSON pricing document with the keys `price_per_block` and `price_per_byte`.
    /// Takes precedence over `--price-per-block` and `--price-per-byte`.
    #[arg(long, env = "SIDECAR_PRICING_CONFIG")]
    pricing_config: Option<PathBuf>,

    /// Price of one processed block, in tokens (e.g. "0.000001").
    #[arg(long, default_value = "0", env = "SIDECAR_PRICE_PER_BLOCK")]
    price_per_block: String,

    /// Price of one transferred byte, in tokens.
    #[arg(long, default_value = "0", env = "SIDECAR_PRICE_PER_BYTE")]
    price_per_byte: String,

    /// Maximum request body size in bytes.
    /// Defaults to 10MB.
    #[arg(long, default_value_t = 10 * 1024 * 1024, env = "SIDECAR_MAX_REQUEST_BODY_SIZE")]
    max_request_body_size: u32,

    /// Maximum response body size in bytes.
    /// Defaults to 100kB.
    #[arg(long, default_value_t = 100 * 1024, env = "SIDECAR_MAX_RESPONSE_BODY_SIZE")]
    max_response_body_size: u32,

    /// Maximum number of concurrent connections.
    /// Defaults to 32.
    #[arg(long, default_value_t = 32, env = "SIDECAR_MAX_CONNECTIONS")]
    max_connections: u32,

    /// Metrics server port.
    /// Defaults to 5000.
    #[arg(long, default_value_t = 5000, env = "SIDECAR_METRICS_PORT")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger.
    // Set the log level by setting the RUST_LOG environment variable.
    // tracing_subscriber also picks up the jsonrpsee log spans (client IP, etc).
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    debug!("Settings: {:?}", args);

    // Start the metrics server.
    // We just let it gracelessly get killed at the end of main()
    tokio::spawn(metrics::run_server(args.metrics_port));

    let pricing = config::load_pricing(
        args.pricing_config.as_deref(),
        &args.price_per_block,
        &args.price_per_byte,
    )?;
    info!(
        "Pricing: {} per block, {} per byte",
        pricing.price_per_block, pricing.price_per_byte
    );

    let provider_config = ProviderConfig::new(args.service_provider, args.collector, args.chain_id)
        .with_pricing(pricing)
        .with_escrow_query_timeout(Duration::from_millis(args.escrow_query_timeout_ms));
    let escrow = ChainEscrowQuerier::new(&args.escrow_rpc_url, args.escrow_contract)?;
    let accepted_signers: AcceptedSigners = args
        .accepted_signers
        .into_iter()
        .flatten()
        .map(Into::into)
        .collect();
    if accepted_signers.is_empty() {
        warn!("No accepted signers configured, every RAV will be rejected");
    } else {
        info!("Accepting RAVs from {} signers", accepted_signers.len());
    }
    let handler = Arc::new(SessionHandler::new(
        provider_config,
        escrow,
        accepted_signers,
    ));

    // Sessions live in memory only; ended ones are swept after the retention period.
    server::spawn_session_sweeper(
        handler.clone(),
        Duration::from_secs(args.session_retention_secs),
    );

    // Start the JSON-RPC server.
    // This await is non-blocking
    let (handle, _) = server::run_server(
        args.port,
        handler,
        args.max_request_body_size,
        args.max_response_body_size,
        args.max_connections,
    )
    .await?;
    info!("Server started. Listening on port {}.", args.port);

    let _ = handle.await;

    // If we're here, we've received a signal to exit.
    info!("Shutting down...");
    Ok(())
}
