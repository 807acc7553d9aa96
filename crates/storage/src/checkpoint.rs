// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace checkpoints: zstd-compressed JSON captures of a project
//! directory, written durably and restorable on rollback.
//!
//! ```text
//! <root>/<project_id>/<sequence>.<checkpoint_id>.json.zst
//! ```
//!
//! The zero-padded sequence in the file name orders checkpoints without
//! decompressing them.
//!
//! Writes follow the tmp → fsync → rename → fsync(dir) sequence so a
//! checkpoint that `save` returned is fully on disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use wid_core::{CheckpointId, ProjectId};

const CHECKPOINT_EXT: &str = "json.zst";
const COMPRESSION_LEVEL: i32 = 3;

/// Directory names never captured or touched by restore.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// Errors from checkpoint store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Compress(String),
    #[error("checkpoint not found: {0}")]
    NotFound(String),
    #[error("invalid path in checkpoint: {0}")]
    InvalidPath(String),
}

/// Summary of a stored checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub id: CheckpointId,
    pub project_id: ProjectId,
    pub description: String,
    /// Monotonic per-project sequence; higher is newer
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    pub file_count: usize,
}

/// A full checkpoint: metadata plus captured file bytes keyed by
/// root-relative, `/`-separated path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub meta: CheckpointMeta,
    pub files: BTreeMap<String, Vec<u8>>,
}

/// What a restore changed on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub written: usize,
    pub removed: usize,
}

/// On-disk checkpoint store.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

/// A checkpoint file located by name alone.
#[derive(Debug)]
struct Entry {
    sequence: u64,
    id: CheckpointId,
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project_id: &ProjectId) -> PathBuf {
        self.root.join(project_id.as_str())
    }

    fn checkpoint_path(&self, project_id: &ProjectId, sequence: u64, id: &CheckpointId) -> PathBuf {
        self.project_dir(project_id)
            .join(format!("{sequence:08}.{}.{CHECKPOINT_EXT}", id.as_str()))
    }

    /// Checkpoint files for a project, newest first, read from names only.
    fn entries(&self, project_id: &ProjectId) -> Result<Vec<Entry>, StoreError> {
        let dir = self.project_dir(project_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            match parse_file_name(&path) {
                Some((sequence, id)) => entries.push(Entry { sequence, id, path }),
                None if path.extension().is_some_and(|ext| ext == "tmp") => {}
                None => tracing::warn!(path = %path.display(), "ignoring unrecognised checkpoint file"),
            }
        }
        entries.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(entries)
    }

    /// Capture every file under `workspace_root` and store it durably.
    pub fn save(
        &self,
        project_id: &ProjectId,
        id: CheckpointId,
        description: &str,
        workspace_root: &Path,
    ) -> Result<CheckpointMeta, StoreError> {
        let files = self.capture(workspace_root)?;
        let sequence = self.next_sequence(project_id)?;
        let meta = CheckpointMeta {
            id,
            project_id: project_id.clone(),
            description: description.to_string(),
            sequence,
            created_at: Utc::now(),
            file_count: files.len(),
        };
        let checkpoint = Checkpoint {
            meta: meta.clone(),
            files,
        };

        let json = serde_json::to_vec(&checkpoint)?;
        let compressed = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)
            .map_err(|e| StoreError::Compress(e.to_string()))?;

        let path = self.checkpoint_path(project_id, sequence, &meta.id);
        write_durable(&path, &compressed)?;

        tracing::debug!(
            project = %project_id,
            checkpoint = %meta.id,
            files = meta.file_count,
            bytes = compressed.len(),
            "saved checkpoint"
        );
        Ok(meta)
    }

    pub fn load(
        &self,
        project_id: &ProjectId,
        id: &CheckpointId,
    ) -> Result<Checkpoint, StoreError> {
        let entry = self
            .entries(project_id)?
            .into_iter()
            .find(|e| &e.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        read_checkpoint(&entry.path)
    }

    /// All checkpoints for a project, newest first.
    pub fn list(&self, project_id: &ProjectId) -> Result<Vec<CheckpointMeta>, StoreError> {
        let mut metas = Vec::new();
        for entry in self.entries(project_id)? {
            match read_checkpoint(&entry.path) {
                Ok(cp) => metas.push(cp.meta),
                Err(e) => {
                    tracing::warn!(path = %entry.path.display(), error = %e, "skipping unreadable checkpoint")
                }
            }
        }
        Ok(metas)
    }

    /// The newest checkpoint; decompresses only that one.
    pub fn latest(&self, project_id: &ProjectId) -> Result<Option<CheckpointMeta>, StoreError> {
        match self.entries(project_id)?.into_iter().next() {
            Some(entry) => Ok(Some(read_checkpoint(&entry.path)?.meta)),
            None => Ok(None),
        }
    }

    /// Remove every checkpoint for a project. Returns how many were removed.
    pub fn delete_all(&self, project_id: &ProjectId) -> Result<usize, StoreError> {
        let dir = self.project_dir(project_id);
        if !dir.exists() {
            return Ok(0);
        }
        let count = self.entries(project_id)?.len();
        fs::remove_dir_all(&dir)?;
        tracing::info!(project = %project_id, count, "deleted checkpoints");
        Ok(count)
    }

    /// Put `workspace_root` back to the captured state: rewrite captured
    /// files and remove files that did not exist at capture time.
    pub fn restore(
        &self,
        project_id: &ProjectId,
        id: &CheckpointId,
        workspace_root: &Path,
    ) -> Result<RestoreSummary, StoreError> {
        let checkpoint = self.load(project_id, id)?;
        let mut summary = RestoreSummary::default();

        for current in self.walk(workspace_root)? {
            let rel = relative_key(workspace_root, &current)?;
            if !checkpoint.files.contains_key(&rel) {
                fs::remove_file(&current)?;
                summary.removed += 1;
            }
        }

        for (rel, bytes) in &checkpoint.files {
            if rel.split('/').any(|part| part == ".." || part.is_empty()) {
                return Err(StoreError::InvalidPath(rel.clone()));
            }
            let path = workspace_root.join(rel);
            if fs::read(&path).ok().as_deref() == Some(bytes.as_slice()) {
                continue;
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, bytes)?;
            summary.written += 1;
        }

        tracing::info!(
            project = %project_id,
            checkpoint = %id,
            written = summary.written,
            removed = summary.removed,
            "restored checkpoint"
        );
        Ok(summary)
    }

    fn next_sequence(&self, project_id: &ProjectId) -> Result<u64, StoreError> {
        Ok(self
            .entries(project_id)?
            .first()
            .map(|e| e.sequence + 1)
            .unwrap_or(1))
    }

    fn capture(&self, workspace_root: &Path) -> Result<BTreeMap<String, Vec<u8>>, StoreError> {
        let mut files = BTreeMap::new();
        for path in self.walk(workspace_root)? {
            let rel = relative_key(workspace_root, &path)?;
            files.insert(rel, fs::read(&path)?);
        }
        Ok(files)
    }

    /// Regular files under `root`, skipping hidden and build directories,
    /// the store itself, and anything whose name is not valid UTF-8.
    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let mut out = Vec::new();
        if !root.exists() {
            return Ok(out);
        }
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    tracing::warn!(path = %path.display(), "skipping non-UTF-8 path");
                    continue;
                };
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    if name.starts_with('.')
                        || SKIPPED_DIRS.contains(&name)
                        || path.starts_with(&self.root)
                    {
                        continue;
                    }
                    pending.push(path);
                } else if file_type.is_file() {
                    out.push(path);
                }
            }
        }
        out.sort();
        Ok(out)
    }
}

/// Split `<sequence>.<id>.json.zst` into its sequence and id.
fn parse_file_name(path: &Path) -> Option<(u64, CheckpointId)> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(CHECKPOINT_EXT)?.strip_suffix('.')?;
    let (sequence, id) = stem.split_once('.')?;
    if id.is_empty() {
        return None;
    }
    Some((sequence.parse().ok()?, CheckpointId::new(id)))
}

fn relative_key(root: &Path, path: &Path) -> Result<String, StoreError> {
    let invalid = || StoreError::InvalidPath(path.display().to_string());
    let rel = path.strip_prefix(root).map_err(|_| invalid())?;
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_str().ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("/"))
}

fn read_checkpoint(path: &Path) -> Result<Checkpoint, StoreError> {
    let file = File::open(path)?;
    let decoder = zstd::stream::read::Decoder::new(file)
        .map_err(|e| StoreError::Compress(e.to_string()))?;
    Ok(serde_json::from_reader(decoder)?)
}

/// Write to `.tmp`, fsync, rename into place, fsync the directory.
fn write_durable(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::InvalidPath(path.display().to_string()))?;
    fs::create_dir_all(parent)?;

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    File::open(parent)?.sync_all()?;
    Ok(())
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
