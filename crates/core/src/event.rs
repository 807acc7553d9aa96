// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace events.
//!
//! Serializes with `{"type": "area:name", ...fields}` format.
//! Unknown type tags deserialize to `Custom`, which every subscriber ignores.

use crate::confidence::ConfidenceReport;
use crate::id::{CheckpointId, PlanId, StepId};
use crate::observation::{Observation, Suggestion};
use crate::plan::AgentPlan;
use crate::workspace::BuildError;
use serde::{Deserialize, Serialize};

/// Events that flow through the bus and drive the state reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- file --
    #[serde(rename = "file:changed")]
    FileChanged { path: String, content: String },

    #[serde(rename = "file:saved")]
    FileSaved {
        path: String,
        /// Content as written, if the editor sent it
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },

    #[serde(rename = "file:deleted")]
    FileDeleted { path: String },

    // -- editor --
    #[serde(rename = "editor:focus_changed")]
    EditorFocusChanged { path: String },

    #[serde(rename = "editor:cursor_moved")]
    EditorCursorMoved { path: String, line: u32, column: u32 },

    // -- build --
    #[serde(rename = "build:started")]
    BuildStarted,

    #[serde(rename = "build:succeeded")]
    BuildSucceeded,

    #[serde(rename = "build:failed")]
    BuildFailed {
        #[serde(default)]
        errors: Vec<BuildError>,
    },

    // -- runtime --
    #[serde(rename = "runtime:started")]
    RuntimeStarted {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
    },

    #[serde(rename = "runtime:stopped")]
    RuntimeStopped,

    #[serde(rename = "runtime:crashed")]
    RuntimeCrashed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    // -- intent --
    /// Periodic decay tick, dispatched by the project timer
    #[serde(rename = "intent:decay")]
    IntentDecay,

    // -- agent --
    #[serde(rename = "agent:observation")]
    AgentObservation { observation: Observation },

    #[serde(rename = "agent:suggestion")]
    AgentSuggestion { suggestion: Suggestion },

    #[serde(rename = "agent:confidence")]
    ConfidenceUpdated { report: ConfidenceReport },

    // -- plan --
    #[serde(rename = "plan:proposed")]
    AgentPlanProposed { plan: AgentPlan },

    #[serde(rename = "plan:approved")]
    AgentPlanApproved { plan_id: PlanId },

    #[serde(rename = "plan:step_approved")]
    AgentPlanStepApproved { plan_id: PlanId, step_id: StepId },

    #[serde(rename = "plan:step_started")]
    AgentPlanStepStarted { plan_id: PlanId, step_id: StepId },

    #[serde(rename = "plan:step_checkpointed")]
    AgentPlanStepCheckpointed {
        plan_id: PlanId,
        step_id: StepId,
        checkpoint_id: CheckpointId,
    },

    #[serde(rename = "plan:step_completed")]
    AgentPlanStepCompleted {
        plan_id: PlanId,
        step_id: StepId,
        #[serde(default)]
        result: String,
    },

    #[serde(rename = "plan:step_failed")]
    AgentPlanStepFailed {
        plan_id: PlanId,
        step_id: StepId,
        error: String,
    },

    #[serde(rename = "plan:step_rolled_back")]
    AgentPlanStepRolledBack { plan_id: PlanId, step_id: StepId },

    #[serde(rename = "plan:completed")]
    AgentPlanCompleted { plan_id: PlanId },

    #[serde(rename = "plan:cancelled")]
    AgentPlanCancelled { plan_id: PlanId },

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

/// Payload-free discriminant of [`Event`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    FileChanged,
    FileSaved,
    FileDeleted,
    EditorFocusChanged,
    EditorCursorMoved,
    BuildStarted,
    BuildSucceeded,
    BuildFailed,
    RuntimeStarted,
    RuntimeStopped,
    RuntimeCrashed,
    IntentDecay,
    AgentObservation,
    AgentSuggestion,
    ConfidenceUpdated,
    AgentPlanProposed,
    AgentPlanApproved,
    AgentPlanStepApproved,
    AgentPlanStepStarted,
    AgentPlanStepCheckpointed,
    AgentPlanStepCompleted,
    AgentPlanStepFailed,
    AgentPlanStepRolledBack,
    AgentPlanCompleted,
    AgentPlanCancelled,
    Custom,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::FileChanged { .. } => EventKind::FileChanged,
            Event::FileSaved { .. } => EventKind::FileSaved,
            Event::FileDeleted { .. } => EventKind::FileDeleted,
            Event::EditorFocusChanged { .. } => EventKind::EditorFocusChanged,
            Event::EditorCursorMoved { .. } => EventKind::EditorCursorMoved,
            Event::BuildStarted => EventKind::BuildStarted,
            Event::BuildSucceeded => EventKind::BuildSucceeded,
            Event::BuildFailed { .. } => EventKind::BuildFailed,
            Event::RuntimeStarted { .. } => EventKind::RuntimeStarted,
            Event::RuntimeStopped => EventKind::RuntimeStopped,
            Event::RuntimeCrashed { .. } => EventKind::RuntimeCrashed,
            Event::IntentDecay => EventKind::IntentDecay,
            Event::AgentObservation { .. } => EventKind::AgentObservation,
            Event::AgentSuggestion { .. } => EventKind::AgentSuggestion,
            Event::ConfidenceUpdated { .. } => EventKind::ConfidenceUpdated,
            Event::AgentPlanProposed { .. } => EventKind::AgentPlanProposed,
            Event::AgentPlanApproved { .. } => EventKind::AgentPlanApproved,
            Event::AgentPlanStepApproved { .. } => EventKind::AgentPlanStepApproved,
            Event::AgentPlanStepStarted { .. } => EventKind::AgentPlanStepStarted,
            Event::AgentPlanStepCheckpointed { .. } => EventKind::AgentPlanStepCheckpointed,
            Event::AgentPlanStepCompleted { .. } => EventKind::AgentPlanStepCompleted,
            Event::AgentPlanStepFailed { .. } => EventKind::AgentPlanStepFailed,
            Event::AgentPlanStepRolledBack { .. } => EventKind::AgentPlanStepRolledBack,
            Event::AgentPlanCompleted { .. } => EventKind::AgentPlanCompleted,
            Event::AgentPlanCancelled { .. } => EventKind::AgentPlanCancelled,
            Event::Custom => EventKind::Custom,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::FileChanged { .. } => "file:changed",
            Event::FileSaved { .. } => "file:saved",
            Event::FileDeleted { .. } => "file:deleted",
            Event::EditorFocusChanged { .. } => "editor:focus_changed",
            Event::EditorCursorMoved { .. } => "editor:cursor_moved",
            Event::BuildStarted => "build:started",
            Event::BuildSucceeded => "build:succeeded",
            Event::BuildFailed { .. } => "build:failed",
            Event::RuntimeStarted { .. } => "runtime:started",
            Event::RuntimeStopped => "runtime:stopped",
            Event::RuntimeCrashed { .. } => "runtime:crashed",
            Event::IntentDecay => "intent:decay",
            Event::AgentObservation { .. } => "agent:observation",
            Event::AgentSuggestion { .. } => "agent:suggestion",
            Event::ConfidenceUpdated { .. } => "agent:confidence",
            Event::AgentPlanProposed { .. } => "plan:proposed",
            Event::AgentPlanApproved { .. } => "plan:approved",
            Event::AgentPlanStepApproved { .. } => "plan:step_approved",
            Event::AgentPlanStepStarted { .. } => "plan:step_started",
            Event::AgentPlanStepCheckpointed { .. } => "plan:step_checkpointed",
            Event::AgentPlanStepCompleted { .. } => "plan:step_completed",
            Event::AgentPlanStepFailed { .. } => "plan:step_failed",
            Event::AgentPlanStepRolledBack { .. } => "plan:step_rolled_back",
            Event::AgentPlanCompleted { .. } => "plan:completed",
            Event::AgentPlanCancelled { .. } => "plan:cancelled",
            Event::Custom => "custom",
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::FileChanged { path, content } => {
                format!("{t} path={path} len={}", content.len())
            }
            Event::FileSaved { path, .. }
            | Event::FileDeleted { path }
            | Event::EditorFocusChanged { path } => format!("{t} path={path}"),
            Event::EditorCursorMoved { path, line, column } => {
                format!("{t} path={path} at={line}:{column}")
            }
            Event::BuildFailed { errors } => format!("{t} errors={}", errors.len()),
            Event::RuntimeStarted { container_id, port } => {
                let id = container_id.as_deref().unwrap_or("-");
                match port {
                    Some(port) => format!("{t} container={id} port={port}"),
                    None => format!("{t} container={id}"),
                }
            }
            Event::AgentObservation { observation } => {
                format!("{t} id={} category={}", observation.id, observation.category)
            }
            Event::AgentSuggestion { suggestion } => {
                format!("{t} id={} action={}", suggestion.id, suggestion.action)
            }
            Event::ConfidenceUpdated { report } => format!(
                "{t} score={:.2} risk={}",
                report.confidence_score, report.risk_level
            ),
            Event::AgentPlanProposed { plan } => {
                format!("{t} plan={} steps={}", plan.id, plan.steps.len())
            }
            Event::AgentPlanApproved { plan_id }
            | Event::AgentPlanCompleted { plan_id }
            | Event::AgentPlanCancelled { plan_id } => format!("{t} plan={plan_id}"),
            Event::AgentPlanStepApproved { plan_id, step_id }
            | Event::AgentPlanStepStarted { plan_id, step_id }
            | Event::AgentPlanStepCompleted {
                plan_id, step_id, ..
            }
            | Event::AgentPlanStepRolledBack { plan_id, step_id } => {
                format!("{t} plan={plan_id} step={step_id}")
            }
            Event::AgentPlanStepCheckpointed {
                plan_id,
                step_id,
                checkpoint_id,
            } => format!("{t} plan={plan_id} step={step_id} checkpoint={checkpoint_id}"),
            Event::AgentPlanStepFailed {
                plan_id,
                step_id,
                error,
            } => format!("{t} plan={plan_id} step={step_id} error={error}"),
            Event::BuildStarted
            | Event::BuildSucceeded
            | Event::RuntimeStopped
            | Event::RuntimeCrashed { .. }
            | Event::IntentDecay
            | Event::Custom => t.to_string(),
        }
    }

    /// Whether editors and agents may send this event over the daemon socket.
    ///
    /// Only observations of the workspace and user approvals come from
    /// outside. Plan progress, timer ticks and advisory output are produced
    /// by the engine itself.
    pub fn is_client_ingress(&self) -> bool {
        match self {
            Event::FileChanged { .. }
            | Event::FileSaved { .. }
            | Event::FileDeleted { .. }
            | Event::EditorFocusChanged { .. }
            | Event::EditorCursorMoved { .. }
            | Event::BuildStarted
            | Event::BuildSucceeded
            | Event::BuildFailed { .. }
            | Event::RuntimeStarted { .. }
            | Event::RuntimeStopped
            | Event::RuntimeCrashed { .. }
            | Event::AgentPlanApproved { .. }
            | Event::AgentPlanStepApproved { .. }
            | Event::Custom => true,
            Event::IntentDecay
            | Event::AgentObservation { .. }
            | Event::AgentSuggestion { .. }
            | Event::ConfidenceUpdated { .. }
            | Event::AgentPlanProposed { .. }
            | Event::AgentPlanStepStarted { .. }
            | Event::AgentPlanStepCheckpointed { .. }
            | Event::AgentPlanStepCompleted { .. }
            | Event::AgentPlanStepFailed { .. }
            | Event::AgentPlanStepRolledBack { .. }
            | Event::AgentPlanCompleted { .. }
            | Event::AgentPlanCancelled { .. } => false,
        }
    }

    /// Plan this event belongs to, if any.
    pub fn plan_id(&self) -> Option<&PlanId> {
        match self {
            Event::AgentPlanProposed { plan } => Some(&plan.id),
            Event::AgentPlanApproved { plan_id }
            | Event::AgentPlanStepApproved { plan_id, .. }
            | Event::AgentPlanStepStarted { plan_id, .. }
            | Event::AgentPlanStepCheckpointed { plan_id, .. }
            | Event::AgentPlanStepCompleted { plan_id, .. }
            | Event::AgentPlanStepFailed { plan_id, .. }
            | Event::AgentPlanStepRolledBack { plan_id, .. }
            | Event::AgentPlanCompleted { plan_id }
            | Event::AgentPlanCancelled { plan_id } => Some(plan_id),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
