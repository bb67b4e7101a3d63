// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-stream connection state machine and source-protocol wire framing.

pub mod connection;
pub mod protocols;

pub use connection::{all_streams_errored, Connection, ConnectionState, ERROR_DELAY};
pub use protocols::{build_transport, HttpTransport, RawTransport, SourceTransport};
