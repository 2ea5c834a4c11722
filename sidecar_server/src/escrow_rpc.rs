// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Escrow balances read from the payments escrow contract over Ethereum JSON-RPC.

use async_trait::async_trait;
use jsonrpsee::{
    core::{client::ClientT, ClientError},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use serde_json::json;
use sidecar_core::escrow::{EscrowAccount, EscrowBalanceQuerier};
use thegraph_core::alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};
use thiserror::Error;

sol! {
    interface IPaymentsEscrow {
        function getBalance(address payer, address collector, address receiver) external view returns (uint256);
    }
}

#[derive(Debug, Error)]
pub enum ChainEscrowError {
    #[error("escrow RPC request failed: {0}")]
    Rpc(#[from] ClientError),
    #[error("eth_call returned {len} bytes, expected 32")]
    MalformedResult { len: usize },
}

/// Reads balances with `eth_call` against the escrow contract at the latest block.
pub struct ChainEscrowQuerier {
    client: HttpClient,
    escrow_contract: Address,
}

impl ChainEscrowQuerier {
    pub fn new(rpc_url: &str, escrow_contract: Address) -> Result<Self, ChainEscrowError> {
        let client = HttpClientBuilder::default().build(rpc_url)?;
        Ok(Self {
            client,
            escrow_contract,
        })
    }
}

pub(crate) fn encode_get_balance(account: &EscrowAccount) -> Bytes {
    IPaymentsEscrow::getBalanceCall {
        payer: account.payer,
        collector: account.collector,
        receiver: account.receiver,
    }
    .abi_encode()
    .into()
}

pub(crate) fn decode_balance(output: &[u8]) -> Result<U256, ChainEscrowError> {
    if output.len() != 32 {
        return Err(ChainEscrowError::MalformedResult { len: output.len() });
    }
    Ok(U256::from_be_slice(output))
}

#[async_trait]
impl EscrowBalanceQuerier for ChainEscrowQuerier {
    type AdapterError = ChainEscrowError;

    async fn get_balance(&self, account: &EscrowAccount) -> Result<U256, Self::AdapterError> {
        let call = json!({
            "to": self.escrow_contract,
            "data": encode_get_balance(account),
        });
        let output: Bytes = self
            .client
            .request("eth_call", rpc_params![call, "latest"])
            .await?;
        decode_balance(&output)
    }
}
