// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: WID_STATE_DIR > XDG_STATE_HOME/wid > ~/.local/state/wid
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("WID_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("wid"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/wid"))
}

/// Parent directory of the per-project workspaces
pub fn workspace_root() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("WID_WORKSPACE_ROOT") {
        return Ok(PathBuf::from(dir));
    }
    Ok(std::env::current_dir()?)
}

/// Timer check interval override
pub fn timer_check_ms() -> Option<Duration> {
    std::env::var("WID_TIMER_CHECK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}
