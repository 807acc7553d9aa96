// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::action::{ActionAdapter, ActionError, PatchOutcome, StepParams};
use crate::checkpoint::{CheckpointAdapter, CheckpointError};
use async_trait::async_trait;
use tracing::Instrument;
use wid_core::{CheckpointId, ProjectId};

/// Wrapper that adds tracing to any ActionAdapter
#[derive(Clone)]
pub struct TracedActions<A> {
    inner: A,
}

impl<A> TracedActions<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<A: ActionAdapter> ActionAdapter for TracedActions<A> {
    async fn read_file(&self, path: &str) -> Result<String, ActionError> {
        let result = self.inner.read_file(path).await;
        tracing::info_span!("action.read", path).in_scope(|| match &result {
            Ok(content) => tracing::debug!(len = content.len(), "read"),
            Err(e) => tracing::error!(error = %e, "read failed"),
        });
        result
    }

    async fn patch_file(
        &self,
        path: &str,
        params: &StepParams,
    ) -> Result<PatchOutcome, ActionError> {
        async {
            tracing::info!(params = params.len(), "starting");
            let start = std::time::Instant::now();
            let result = self.inner.patch_file(path, params).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(out) => tracing::info!(len = out.fixed_content.len(), elapsed_ms, "patched"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "patch failed"),
            }
            result
        }
        .instrument(tracing::info_span!("action.patch", path))
        .await
    }

    async fn run_command(&self, command: &str, params: &StepParams) -> Result<String, ActionError> {
        let result = self.inner.run_command(command, params).await;
        if let Err(ref e) = result {
            tracing::warn!(command, error = %e, "run_command rejected");
        }
        result
    }
}

/// Wrapper that adds tracing to any CheckpointAdapter
#[derive(Clone)]
pub struct TracedCheckpoints<K> {
    inner: K,
}

impl<K> TracedCheckpoints<K> {
    pub fn new(inner: K) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<K: CheckpointAdapter> CheckpointAdapter for TracedCheckpoints<K> {
    async fn create_checkpoint(
        &self,
        project_id: &ProjectId,
        description: &str,
    ) -> Result<CheckpointId, CheckpointError> {
        async {
            tracing::info!(description, "starting");
            let start = std::time::Instant::now();
            let result = self.inner.create_checkpoint(project_id, description).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(id) => tracing::info!(checkpoint_id = %id, elapsed_ms, "checkpoint created"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "checkpoint failed"),
            }
            result
        }
        .instrument(tracing::info_span!("checkpoint.create", project = %project_id))
        .await
    }

    async fn rollback(
        &self,
        project_id: &ProjectId,
        checkpoint_id: &CheckpointId,
    ) -> Result<(), CheckpointError> {
        async {
            let start = std::time::Instant::now();
            let result = self.inner.rollback(project_id, checkpoint_id).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::info!(elapsed_ms, "rolled back"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "rollback failed"),
            }
            result
        }
        .instrument(tracing::info_span!(
            "checkpoint.rollback",
            project = %project_id,
            checkpoint_id = %checkpoint_id
        ))
        .await
    }

    async fn discard_all(&self, project_id: &ProjectId) -> Result<usize, CheckpointError> {
        let result = self.inner.discard_all(project_id).await;
        tracing::info_span!("checkpoint.discard", project = %project_id).in_scope(|| {
            match &result {
                Ok(count) => tracing::info!(count, "discarded checkpoints"),
                Err(e) => tracing::error!(error = %e, "discard failed"),
            }
        });
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
