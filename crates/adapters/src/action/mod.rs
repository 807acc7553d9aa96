// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Action runners used by the plan executor

mod fs;

pub use fs::FsActionAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ActionCall, FakeActionAdapter};

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Free-form step parameters, as carried on a plan step.
pub type StepParams = BTreeMap<String, String>;

/// Errors from action operations
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("path escapes workspace root: {0}")]
    InvalidPath(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("invalid patch parameters: {0}")]
    InvalidParameters(String),
    #[error("pattern not found in {path}: {pattern}")]
    PatternNotFound { path: String, pattern: String },
    #[error("unsupported action: {0}")]
    Unsupported(String),
    #[error("action failed: {0}")]
    Failed(String),
}

/// Result of a successful patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub file_path: String,
    pub fixed_content: String,
}

/// Adapter that performs plan step actions against the workspace.
///
/// Calls must be safe to retry at the call site.
#[async_trait]
pub trait ActionAdapter: Clone + Send + Sync + 'static {
    /// Read a workspace file
    async fn read_file(&self, path: &str) -> Result<String, ActionError>;

    /// Apply a patch described by `params` to a workspace file.
    ///
    /// `content` replaces the whole file. Otherwise `search` and `replace`
    /// substitute every occurrence of `search`.
    async fn patch_file(&self, path: &str, params: &StepParams)
        -> Result<PatchOutcome, ActionError>;

    /// Command execution is not available through this layer.
    async fn run_command(&self, command: &str, _params: &StepParams) -> Result<String, ActionError> {
        Err(ActionError::Unsupported(format!("run-command `{command}`")))
    }
}

/// Compute patched file content from the step parameters.
pub(crate) fn apply_patch(
    path: &str,
    current: Option<&str>,
    params: &StepParams,
) -> Result<String, ActionError> {
    if let Some(content) = params.get("content") {
        return Ok(content.clone());
    }
    let (Some(search), Some(replace)) = (params.get("search"), params.get("replace")) else {
        return Err(ActionError::InvalidParameters(
            "expected `content` or `search`/`replace`".to_string(),
        ));
    };
    if search.is_empty() {
        return Err(ActionError::InvalidParameters("`search` is empty".to_string()));
    }
    let current = current.ok_or_else(|| ActionError::NotFound(path.to_string()))?;
    if !current.contains(search.as_str()) {
        return Err(ActionError::PatternNotFound {
            path: path.to_string(),
            pattern: search.clone(),
        });
    }
    Ok(current.replace(search.as_str(), replace))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
