// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod config;
pub mod error_codes;
pub mod escrow_rpc;
pub mod jsonrpsee_helpers;
pub mod metrics;
pub mod server;
