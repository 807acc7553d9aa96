// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint service used to snapshot the workspace before each step

mod store;

pub use store::StoreCheckpointAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{CheckpointCall, FakeCheckpointAdapter};

use async_trait::async_trait;
use thiserror::Error;
use wid_core::{CheckpointId, ProjectId};
use wid_storage::StoreError;

/// Errors from checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("checkpoint task failed: {0}")]
    Task(String),
    #[error("checkpoint failed: {0}")]
    Failed(String),
}

/// Adapter that captures and restores workspace checkpoints.
///
/// A successful `create_checkpoint` has fully captured restorable state
/// before it returns.
#[async_trait]
pub trait CheckpointAdapter: Clone + Send + Sync + 'static {
    async fn create_checkpoint(
        &self,
        project_id: &ProjectId,
        description: &str,
    ) -> Result<CheckpointId, CheckpointError>;

    async fn rollback(
        &self,
        project_id: &ProjectId,
        checkpoint_id: &CheckpointId,
    ) -> Result<(), CheckpointError>;

    /// Delete every checkpoint held for a project. Returns how many were deleted.
    async fn discard_all(&self, project_id: &ProjectId) -> Result<usize, CheckpointError>;
}
