// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer: workspace state reducer and checkpoint store

mod checkpoint;
mod state;

pub use checkpoint::{Checkpoint, CheckpointMeta, CheckpointStore, RestoreSummary, StoreError};
pub use state::{
    BuildState, EditorState, FileState, IntentSignal, Reduction, RuntimeState, WorkspaceState,
    CURSOR_IDLE_THRESHOLD_MS, FINISHED_PLAN_CAP, INTENT_DECAY_FACTOR, RAPID_RESAVE_WINDOW_MS,
};
