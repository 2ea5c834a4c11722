// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

/// JSON-RPC error codes specific to the payment sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonRpcErrorCode {
    /// -32001 -- The session does not exist.
    SessionNotFound = -32001,
}

/// JSON-RPC warning codes
/// These are not part of the JSON-RPC standard, but are used to provide additional information to the
/// client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonRpcWarningCode {
    /// -32101 -- The escrow balance could not be read and was treated as zero.
    EscrowBalanceUnavailable = -32101,
}
