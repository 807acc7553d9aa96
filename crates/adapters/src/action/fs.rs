// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem action adapter rooted at the workspace directory

use super::{apply_patch, ActionAdapter, ActionError, PatchOutcome, StepParams};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Reads and patches files relative to a workspace root.
#[derive(Clone, Debug)]
pub struct FsActionAdapter {
    root: PathBuf,
}

impl FsActionAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a step target to a path under the root. Absolute paths and
    /// `..` components are rejected.
    fn resolve(&self, target: &str) -> Result<PathBuf, ActionError> {
        let rel = Path::new(target);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if target.is_empty() || escapes {
            return Err(ActionError::InvalidPath(target.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

fn io_error(path: &str, err: std::io::Error) -> ActionError {
    if err.kind() == ErrorKind::NotFound {
        ActionError::NotFound(path.to_string())
    } else {
        ActionError::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl ActionAdapter for FsActionAdapter {
    async fn read_file(&self, path: &str) -> Result<String, ActionError> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| io_error(path, e))
    }

    async fn patch_file(
        &self,
        path: &str,
        params: &StepParams,
    ) -> Result<PatchOutcome, ActionError> {
        let full = self.resolve(path)?;
        let current = match tokio::fs::read_to_string(&full).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(io_error(path, e)),
        };
        let fixed = apply_patch(path, current.as_deref(), params)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        tokio::fs::write(&full, &fixed)
            .await
            .map_err(|e| io_error(path, e))?;

        Ok(PatchOutcome {
            file_path: path.to_string(),
            fixed_content: fixed,
        })
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
