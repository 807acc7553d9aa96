// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};
use wid_adapters::{FsActionAdapter, StoreCheckpointAdapter, TracedActions, TracedCheckpoints};
use wid_core::SystemClock;
use wid_core::ProjectId;
use wid_engine::{EngineConfig, EngineError, ProjectRegistry, RuntimeDeps};
use wid_storage::CheckpointStore;

/// Project registry with concrete adapter types (wrapped with tracing)
pub type DaemonRegistry = ProjectRegistry<
    TracedActions<FsActionAdapter>,
    TracedCheckpoints<StoreCheckpointAdapter>,
    SystemClock,
>;

type DaemonDeps = RuntimeDeps<TracedActions<FsActionAdapter>, TracedCheckpoints<StoreCheckpointAdapter>>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/wid)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to version file
    pub version_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Root of the checkpoint store
    pub checkpoints_path: PathBuf,
    /// Parent of every project workspace; project `p` lives in `<workspace_root>/p`
    pub workspace_root: PathBuf,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// One daemon serves every project for a user; projects are keyed by the
    /// id clients send with each request.
    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::with_dirs(
            crate::env::state_dir()?,
            crate::env::workspace_root()?,
        ))
    }

    /// Fixed file layout under `state_dir`
    pub fn with_dirs(state_dir: PathBuf, workspace_root: PathBuf) -> Self {
        Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            checkpoints_path: state_dir.join("checkpoints"),
            state_dir,
            workspace_root,
        }
    }
}

/// Daemon state during operation.
///
/// The listener is returned separately from startup to be spawned as a Listener task.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Live project runtimes (shared with the listener)
    pub registry: Arc<DaemonRegistry>,
    pub start_time: Instant,
}

/// Result of daemon startup: the daemon state and the bound socket.
pub struct StartupResult {
    pub daemon: DaemonState,
    /// The Unix socket listener to spawn as a task
    pub listener: UnixListener,
}

impl DaemonState {
    /// Fire due project timers
    pub fn tick(&self, now: Instant) {
        self.registry.tick(now);
    }

    /// Shutdown the daemon gracefully.
    ///
    /// Tears down every project runtime, then removes the socket, PID and
    /// version files. Checkpoints stay on disk.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        let projects = self.registry.project_ids().len();
        self.registry.shutdown();
        info!(projects, "project runtimes stopped");

        for path in [
            &self.config.socket_path,
            &self.config.lock_path,
            &self.config.version_path,
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), "Failed to remove file: {}", e);
                }
            }
        }

        info!("Daemon shutdown complete");
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Workspace root is not a directory: {0}")]
    BadWorkspaceRoot(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Another daemon owns these files
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    std::fs::create_dir_all(&config.checkpoints_path)?;
    std::fs::write(&config.version_path, crate::protocol::PROTOCOL_VERSION)?;

    if !config.workspace_root.is_dir() {
        return Err(LifecycleError::BadWorkspaceRoot(
            config.workspace_root.clone(),
        ));
    }

    let registry = Arc::new(build_registry(config));
    info!(
        workspace = %config.workspace_root.display(),
        checkpoints = %config.checkpoints_path.display(),
        "engine configured"
    );

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!("Daemon started");

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            registry,
            start_time: Instant::now(),
        },
        listener,
    })
}

fn build_registry(config: &Config) -> DaemonRegistry {
    let store = Arc::new(CheckpointStore::new(&config.checkpoints_path));
    let workspace_root = config.workspace_root.clone();
    ProjectRegistry::with_deps_factory(
        move |project_id: &ProjectId| project_deps(&workspace_root, &store, project_id),
        SystemClock,
        EngineConfig::default(),
    )
}

/// Adapters confined to the project's own directory, so a rollback in one
/// project never touches another's files.
fn project_deps(
    workspace_root: &Path,
    store: &Arc<CheckpointStore>,
    project_id: &ProjectId,
) -> Result<DaemonDeps, EngineError> {
    let dir = project_dir(workspace_root, project_id)?;
    std::fs::create_dir_all(&dir).map_err(|e| EngineError::ProjectSetup {
        project: project_id.to_string(),
        reason: format!("{}: {e}", dir.display()),
    })?;
    info!(project = %project_id, workspace = %dir.display(), "project workspace ready");
    Ok(RuntimeDeps {
        actions: TracedActions::new(FsActionAdapter::new(&dir)),
        checkpoints: TracedCheckpoints::new(StoreCheckpointAdapter::shared(
            Arc::clone(store),
            &dir,
            wid_core::UuidIdGen,
        )),
    })
}

/// `<workspace_root>/<project_id>`, refusing ids that are not a single plain
/// path component.
pub(crate) fn project_dir(workspace_root: &Path, project_id: &ProjectId) -> Result<PathBuf, EngineError> {
    let id = project_id.as_str();
    let plain = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0']);
    if !plain {
        return Err(EngineError::ProjectSetup {
            project: id.to_string(),
            reason: "project id must be a plain directory name".to_string(),
        });
    }
    Ok(workspace_root.join(id))
}

/// Remove files a failed startup may have created
fn cleanup_on_failure(config: &Config) {
    for path in [&config.socket_path, &config.version_path, &config.lock_path] {
        remove_if_exists(path);
    }
}

fn remove_if_exists(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
