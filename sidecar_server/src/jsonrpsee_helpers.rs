// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::result::Result as StdResult;

use jsonrpsee::{
    core::Serialize,
    types::{error::INVALID_PARAMS_CODE, ErrorObject},
};
use serde::Deserialize;
use serde_json::value::Value;
use sidecar_core::Error;

use crate::error_codes::JsonRpcErrorCode;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JsonRpcWarning {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct JsonRpcResponse<T: Serialize> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<JsonRpcWarning>>,
}

pub type JsonRpcError = jsonrpsee::types::ErrorObjectOwned;
pub type JsonRpcResult<T> = StdResult<JsonRpcResponse<T>, JsonRpcError>;

impl<T: Serialize> JsonRpcResponse<T> {
    /// Helper method that returns a JsonRpcResponse with the given data and no warnings.
    pub fn ok(data: T) -> Self {
        JsonRpcResponse {
            data,
            warnings: None,
        }
    }

    /// Helper method that returns a JsonRpcResponse with the given data and warnings.
    /// If the warnings vector is empty, no warning field is added to the JSON-RPC response.
    pub fn warn(data: T, warnings: Vec<JsonRpcWarning>) -> Self {
        JsonRpcResponse {
            data,
            warnings: if warnings.is_empty() {
                None
            } else {
                Some(warnings)
            },
        }
    }
}

impl JsonRpcWarning {
    pub fn new<S: Serialize>(code: i32, message: String, data: Option<S>) -> Self {
        JsonRpcWarning {
            code,
            message,
            data: data.and_then(|d| serde_json::to_value(&d).ok()),
        }
    }
}

/// Maps a core error onto its JSON-RPC error object.
pub fn to_rpc_error(err: Error) -> JsonRpcError {
    match err {
        Error::SessionNotFound { ref session_id } => ErrorObject::owned(
            JsonRpcErrorCode::SessionNotFound as i32,
            err.to_string(),
            Some(session_id.clone()),
        ),
        Error::InvalidPrice(_) => {
            ErrorObject::owned(INVALID_PARAMS_CODE, err.to_string(), None::<()>)
        }
    }
}
