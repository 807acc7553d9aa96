// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace Intelligence Daemon library
//!
//! The IPC protocol types are public for editor and agent clients; the
//! lifecycle and listener modules back the `widd` binary.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod env;
pub mod lifecycle;
pub mod listener;
pub mod protocol;

pub use protocol::{
    ProjectSummary, ProtocolError, Query, Request, Response, RollbackFailure, DEFAULT_TIMEOUT,
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
