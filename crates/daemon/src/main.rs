// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace Intelligence Daemon (widd)
//!
//! Background process that keeps one engine runtime per project and answers
//! editor and agent clients over a Unix socket.
//!
//! Architecture:
//! - Listener Task: spawned task handling socket I/O; requests dispatch
//!   straight into the project registry
//! - Timer Loop: main task firing project timers (intent decay and polling)

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};
use wid_core::{Clock, SystemClock};
use wid_daemon::env;
use wid_daemon::lifecycle::{self, Config, LifecycleError, StartupResult};
use wid_daemon::listener::{ListenCtx, Listener};
use wid_daemon::protocol::PROTOCOL_VERSION;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("widd {PROTOCOL_VERSION}");
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("widd {PROTOCOL_VERSION}");
                println!("Workspace Intelligence Daemon - tracks workspace activity and runs approved agent plans");
                println!();
                println!("USAGE:");
                println!("    widd");
                println!();
                println!("Editors and agents talk to the daemon over a Unix socket in the");
                println!("state directory. It serves every project for the current user.");
                println!();
                println!("ENVIRONMENT:");
                println!("    WID_STATE_DIR         State directory (default ~/.local/state/wid)");
                println!("    WID_WORKSPACE_ROOT    Parent of per-project workspaces (default: cwd)");
                println!("    WID_TIMER_CHECK_MS    Timer resolution in milliseconds (default 500)");
                println!("    RUST_LOG              Log filter (default info)");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: widd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    rotate_log_if_needed(&config.log_path);

    // Write startup marker to log (before tracing setup, so clients can find it)
    write_startup_marker(&config)?;

    let log_guard = setup_logging(&config)?;

    info!("Starting workspace daemon");

    let StartupResult {
        mut daemon,
        listener: unix_listener,
    } = match lifecycle::startup(&config).await {
        Ok(r) => r,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            let version = std::fs::read_to_string(&config.version_path)
                .unwrap_or_default()
                .trim()
                .to_string();

            eprintln!("widd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            if !version.is_empty() {
                if version == PROTOCOL_VERSION {
                    eprintln!("  version: {version}");
                } else {
                    eprintln!("  version: {version} (outdated, current: {PROTOCOL_VERSION})");
                }
            }
            std::process::exit(1);
        }
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let shutdown_notify = Arc::new(Notify::new());

    let listener = Listener::new(
        unix_listener,
        ListenCtx {
            registry: Arc::clone(&daemon.registry),
            start_time: daemon.start_time,
            shutdown: Arc::clone(&shutdown_notify),
        },
    );
    let listener_task = tokio::spawn(listener.run());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        "Daemon ready, listening on {}",
        config.socket_path.display()
    );

    // Signal ready for parent process (e.g., systemd, editor plugin waiting for startup)
    println!("READY");

    // NOTE: Must be created outside the loop - tokio::select! re-evaluates
    // branches on each iteration, so a sleep() inside would reset on every
    // wakeup and timers would never fire.
    let mut timer_check = tokio::time::interval(timer_check_interval());

    loop {
        tokio::select! {
            _ = shutdown_notify.notified() => {
                info!("Shutdown requested via command");
                break;
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }

            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                break;
            }

            _ = timer_check.tick() => {
                daemon.tick(SystemClock.now());
            }
        }
    }

    listener_task.abort();
    daemon.shutdown()?;
    info!("Daemon stopped");
    Ok(())
}

/// Default timer resolution. Project timers fire at 2 s and 3 s periods.
const DEFAULT_TIMER_CHECK: Duration = Duration::from_millis(500);

fn timer_check_interval() -> Duration {
    env::timer_check_ms().unwrap_or(DEFAULT_TIMER_CHECK)
}

/// Rotate daemon.log once it exceeds this size
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated logs kept: daemon.log.1 (newest) through daemon.log.3
const MAX_ROTATED_LOGS: u32 = 3;

fn rotated_path(log_path: &Path, n: u32) -> PathBuf {
    let mut name = log_path.as_os_str().to_owned();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

/// Shift daemon.log to daemon.log.1 (and .1 to .2, ...) when it is too large.
/// Failures are ignored; logging must never stop the daemon from starting.
fn rotate_log_if_needed(log_path: &Path) {
    let Ok(meta) = std::fs::metadata(log_path) else {
        return;
    };
    if meta.len() < MAX_LOG_SIZE {
        return;
    }

    let _ = std::fs::remove_file(rotated_path(log_path, MAX_ROTATED_LOGS));
    for n in (1..MAX_ROTATED_LOGS).rev() {
        let from = rotated_path(log_path, n);
        if from.exists() {
            let _ = std::fs::rename(&from, rotated_path(log_path, n + 1));
        }
    }
    let _ = std::fs::rename(log_path, rotated_path(log_path, 1));
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- widd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- widd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
