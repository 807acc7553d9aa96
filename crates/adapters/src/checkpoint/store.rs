// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint adapter backed by the on-disk [`CheckpointStore`]

use super::{CheckpointAdapter, CheckpointError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use wid_core::{CheckpointId, IdGen, ProjectId, UuidIdGen};
use wid_storage::CheckpointStore;

/// Snapshots `workspace_root` into a [`CheckpointStore`].
///
/// Adapters for different workspaces may share one store; entries are
/// keyed by project.
///
/// Store I/O is blocking, so each call runs on the blocking pool.
#[derive(Clone)]
pub struct StoreCheckpointAdapter<G: IdGen = UuidIdGen> {
    store: Arc<CheckpointStore>,
    workspace_root: PathBuf,
    ids: G,
}

impl StoreCheckpointAdapter<UuidIdGen> {
    pub fn new(store: CheckpointStore, workspace_root: impl Into<PathBuf>) -> Self {
        Self::with_id_gen(store, workspace_root, UuidIdGen)
    }
}

impl<G: IdGen> StoreCheckpointAdapter<G> {
    pub fn with_id_gen(
        store: CheckpointStore,
        workspace_root: impl Into<PathBuf>,
        ids: G,
    ) -> Self {
        Self::shared(Arc::new(store), workspace_root, ids)
    }

    pub fn shared(store: Arc<CheckpointStore>, workspace_root: impl Into<PathBuf>, ids: G) -> Self {
        Self {
            store,
            workspace_root: workspace_root.into(),
            ids,
        }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }
}

#[async_trait]
impl<G: IdGen> CheckpointAdapter for StoreCheckpointAdapter<G> {
    async fn create_checkpoint(
        &self,
        project_id: &ProjectId,
        description: &str,
    ) -> Result<CheckpointId, CheckpointError> {
        let store = Arc::clone(&self.store);
        let root = self.workspace_root.clone();
        let project_id = project_id.clone();
        let id = CheckpointId::new(self.ids.next());
        let description = description.to_string();

        let meta = tokio::task::spawn_blocking(move || {
            store.save(&project_id, id, &description, &root)
        })
        .await
        .map_err(|e| CheckpointError::Task(e.to_string()))??;
        Ok(meta.id)
    }

    async fn rollback(
        &self,
        project_id: &ProjectId,
        checkpoint_id: &CheckpointId,
    ) -> Result<(), CheckpointError> {
        let store = Arc::clone(&self.store);
        let root = self.workspace_root.clone();
        let project_id = project_id.clone();
        let checkpoint_id = checkpoint_id.clone();

        tokio::task::spawn_blocking(move || store.restore(&project_id, &checkpoint_id, &root))
            .await
            .map_err(|e| CheckpointError::Task(e.to_string()))??;
        Ok(())
    }

    async fn discard_all(&self, project_id: &ProjectId) -> Result<usize, CheckpointError> {
        let store = Arc::clone(&self.store);
        let project_id = project_id.clone();

        let count = tokio::task::spawn_blocking(move || store.delete_all(&project_id))
            .await
            .map_err(|e| CheckpointError::Task(e.to_string()))??;
        Ok(count)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
