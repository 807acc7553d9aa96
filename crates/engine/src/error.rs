// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use thiserror::Error;
use wid_adapters::CheckpointError;

/// Errors that can occur in the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("cannot set up project {project}: {reason}")]
    ProjectSetup { project: String, reason: String },
    #[error("event not accepted from clients: {0}")]
    EventNotAccepted(&'static str),
    #[error("plan not found: {0}")]
    PlanNotFound(String),
    #[error("plan already registered: {0}")]
    PlanExists(String),
    #[error("plan {plan} has no step {step}")]
    StepNotFound { plan: String, step: String },
    #[error("step {plan}/{step} has no checkpoint")]
    NoCheckpoint { plan: String, step: String },
    #[error("step {plan}/{step} cannot be rolled back while {status}")]
    InvalidRollback {
        plan: String,
        step: String,
        status: String,
    },
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}
