// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake checkpoint adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{CheckpointAdapter, CheckpointError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use wid_core::{CheckpointId, ProjectId};

/// Recorded checkpoint call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointCall {
    Create {
        project_id: ProjectId,
        description: String,
    },
    Rollback {
        project_id: ProjectId,
        checkpoint_id: CheckpointId,
    },
    DiscardAll {
        project_id: ProjectId,
    },
}

struct FakeCheckpointState {
    calls: Vec<CheckpointCall>,
    next_id: u64,
    /// Checkpoints created and not yet discarded, per project
    live: HashMap<ProjectId, usize>,
    fail_create: Option<String>,
    fail_rollback: HashSet<CheckpointId>,
}

/// Fake checkpoint adapter that hands out `cp-N` ids
#[derive(Clone)]
pub struct FakeCheckpointAdapter {
    inner: Arc<Mutex<FakeCheckpointState>>,
}

impl Default for FakeCheckpointAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeCheckpointState {
                calls: Vec::new(),
                next_id: 0,
                live: HashMap::new(),
                fail_create: None,
                fail_rollback: HashSet::new(),
            })),
        }
    }
}

impl FakeCheckpointAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<CheckpointCall> {
        self.inner.lock().calls.clone()
    }

    /// Checkpoint ids passed to `rollback`, in call order
    pub fn rollbacks(&self) -> Vec<CheckpointId> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                CheckpointCall::Rollback { checkpoint_id, .. } => Some(checkpoint_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Projects passed to `discard_all`, in call order
    pub fn discarded(&self) -> Vec<ProjectId> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                CheckpointCall::DiscardAll { project_id } => Some(project_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Make `create_checkpoint` fail until cleared
    pub fn fail_create(&self, message: &str) {
        self.inner.lock().fail_create = Some(message.to_string());
    }

    pub fn clear_create_failure(&self) {
        self.inner.lock().fail_create = None;
    }

    /// Make rollback to a specific checkpoint fail
    pub fn fail_rollback(&self, checkpoint_id: &str) {
        self.inner
            .lock()
            .fail_rollback
            .insert(CheckpointId::new(checkpoint_id));
    }
}

#[async_trait]
impl CheckpointAdapter for FakeCheckpointAdapter {
    async fn create_checkpoint(
        &self,
        project_id: &ProjectId,
        description: &str,
    ) -> Result<CheckpointId, CheckpointError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CheckpointCall::Create {
            project_id: project_id.clone(),
            description: description.to_string(),
        });
        if let Some(message) = &inner.fail_create {
            return Err(CheckpointError::Failed(message.clone()));
        }
        inner.next_id += 1;
        *inner.live.entry(project_id.clone()).or_default() += 1;
        Ok(CheckpointId::new(format!("cp-{}", inner.next_id)))
    }

    async fn rollback(
        &self,
        project_id: &ProjectId,
        checkpoint_id: &CheckpointId,
    ) -> Result<(), CheckpointError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CheckpointCall::Rollback {
            project_id: project_id.clone(),
            checkpoint_id: checkpoint_id.clone(),
        });
        if inner.fail_rollback.contains(checkpoint_id) {
            return Err(CheckpointError::Failed(format!(
                "rollback to {checkpoint_id} failed"
            )));
        }
        Ok(())
    }

    async fn discard_all(&self, project_id: &ProjectId) -> Result<usize, CheckpointError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CheckpointCall::DiscardAll {
            project_id: project_id.clone(),
        });
        Ok(inner.live.remove(project_id).unwrap_or(0))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
