// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol between editor/agent clients and the daemon.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

use serde::{Deserialize, Serialize};
use wid_core::{
    AgentPlan, CheckpointId, ConfidenceReport, Event, Observation, PlanId, ProjectId, StepId,
};
use wid_storage::WorkspaceState;

#[path = "protocol_wire.rs"]
mod wire;
pub use wire::{
    decode, encode, read_message, read_request, read_response, write_message, write_request,
    write_response, ProtocolError, DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};

/// Observations returned when a query does not give a limit
pub const DEFAULT_OBSERVATION_LIMIT: usize = 20;

fn default_observation_limit() -> usize {
    DEFAULT_OBSERVATION_LIMIT
}

/// Request from a client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Dispatch an event into a project's store, creating the project on first use
    Event { project_id: ProjectId, event: Event },

    /// Read a project's state
    Query { project_id: ProjectId, query: Query },

    /// Propose a plan for approval
    RegisterPlan {
        project_id: ProjectId,
        plan: AgentPlan,
    },

    /// Undo every completed step of a plan, newest first, and cancel it
    RollbackPlan {
        project_id: ProjectId,
        plan_id: PlanId,
    },

    /// Restore the checkpoint taken before one step
    RollbackStep {
        project_id: ProjectId,
        plan_id: PlanId,
        step_id: StepId,
    },

    /// Tear down a project's runtime and forget its state
    DestroyProject { project_id: ProjectId },

    /// Get daemon status
    Status,

    /// Request daemon shutdown
    Shutdown,
}

/// Read-only project queries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Query {
    State,
    Report,
    Observations {
        #[serde(default = "default_observation_limit")]
        limit: usize,
    },
    Plan {
        plan_id: PlanId,
    },
}

/// Response from the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Daemon is shutting down
    ShuttingDown,

    /// Request failed
    Error { message: String },

    State { state: Box<WorkspaceState> },

    Report { report: ConfidenceReport },

    /// Latest observations, oldest first
    Observations { observations: Vec<Observation> },

    Plan { plan: Option<Box<AgentPlan>> },

    PlanRolledBack {
        rolled_back: Vec<StepId>,
        failed: Vec<RollbackFailure>,
    },

    StepRolledBack { checkpoint_id: CheckpointId },

    ProjectDestroyed { existed: bool },

    Status {
        uptime_secs: u64,
        projects: Vec<ProjectSummary>,
    },
}

/// A step whose checkpoint could not be restored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RollbackFailure {
    pub step_id: StepId,
    pub error: String,
}

/// One live project in a status response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectSummary {
    pub project_id: ProjectId,
    pub files: usize,
    pub plans: usize,
    pub confidence_score: f64,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
