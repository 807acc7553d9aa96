// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake action adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{apply_patch, ActionAdapter, ActionError, PatchOutcome, StepParams};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Recorded action call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionCall {
    ReadFile { path: String },
    PatchFile { path: String, params: StepParams },
    RunCommand { command: String },
}

struct FakeActionState {
    files: HashMap<String, String>,
    failures: HashMap<String, String>,
    calls: Vec<ActionCall>,
}

/// In-memory action adapter with per-path failure injection
#[derive(Clone)]
pub struct FakeActionAdapter {
    inner: Arc<Mutex<FakeActionState>>,
}

impl Default for FakeActionAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeActionState {
                files: HashMap::new(),
                failures: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }
}

impl FakeActionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file
    pub fn set_file(&self, path: &str, content: &str) {
        self.inner
            .lock()
            .files
            .insert(path.to_string(), content.to_string());
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.inner.lock().files.get(path).cloned()
    }

    /// Make every action on `path` fail with `message`
    pub fn fail_on(&self, path: &str, message: &str) {
        self.inner
            .lock()
            .failures
            .insert(path.to_string(), message.to_string());
    }

    pub fn clear_failure(&self, path: &str) {
        self.inner.lock().failures.remove(path);
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ActionCall> {
        self.inner.lock().calls.clone()
    }

    /// Paths passed to `patch_file`, in call order
    pub fn patched_paths(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                ActionCall::PatchFile { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ActionAdapter for FakeActionAdapter {
    async fn read_file(&self, path: &str) -> Result<String, ActionError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ActionCall::ReadFile {
            path: path.to_string(),
        });
        if let Some(message) = inner.failures.get(path) {
            return Err(ActionError::Failed(message.clone()));
        }
        inner
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| ActionError::NotFound(path.to_string()))
    }

    async fn patch_file(
        &self,
        path: &str,
        params: &StepParams,
    ) -> Result<PatchOutcome, ActionError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ActionCall::PatchFile {
            path: path.to_string(),
            params: params.clone(),
        });
        if let Some(message) = inner.failures.get(path) {
            return Err(ActionError::Failed(message.clone()));
        }
        let fixed = apply_patch(path, inner.files.get(path).map(String::as_str), params)?;
        inner.files.insert(path.to_string(), fixed.clone());
        Ok(PatchOutcome {
            file_path: path.to_string(),
            fixed_content: fixed,
        })
    }

    async fn run_command(&self, command: &str, _params: &StepParams) -> Result<String, ActionError> {
        self.inner.lock().calls.push(ActionCall::RunCommand {
            command: command.to_string(),
        });
        Err(ActionError::Unsupported(format!("run-command `{command}`")))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
