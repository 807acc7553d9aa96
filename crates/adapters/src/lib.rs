// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: file actions and workspace checkpoints

pub mod action;
pub mod checkpoint;
pub mod traced;

pub use action::{ActionAdapter, ActionError, FsActionAdapter, PatchOutcome, StepParams};
pub use checkpoint::{CheckpointAdapter, CheckpointError, StoreCheckpointAdapter};
pub use traced::{TracedActions, TracedCheckpoints};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use action::{ActionCall, FakeActionAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use checkpoint::{CheckpointCall, FakeCheckpointAdapter};
