// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent plans: ordered, user-approved sequences of file/command actions.

use crate::id::{CheckpointId, PlanId, StepId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Proposed,
    Approved,
    Executing,
    Completed,
    Cancelled,
}

impl PlanStatus {
    /// Steps may only start while the plan is in one of these states.
    pub fn allows_execution(&self) -> bool {
        matches!(self, PlanStatus::Approved | PlanStatus::Executing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Cancelled)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Proposed => write!(f, "proposed"),
            PlanStatus::Approved => write!(f, "approved"),
            PlanStatus::Executing => write!(f, "executing"),
            PlanStatus::Completed => write!(f, "completed"),
            PlanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Approved,
    Executing,
    Completed,
    Failed,
    RolledBack,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Approved => write!(f, "approved"),
            StepStatus::Executing => write!(f, "executing"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// What a step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    ReadFile,
    PatchFile,
    RunCommand,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::ReadFile => write!(f, "read-file"),
            ActionType::PatchFile => write!(f, "patch-file"),
            ActionType::RunCommand => write!(f, "run-command"),
        }
    }
}

/// One action within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: StepId,
    pub description: String,
    pub action_type: ActionType,
    /// File path or command, depending on `action_type`
    pub target: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
    #[serde(default)]
    pub status: StepStatus,
    /// Checkpoint taken immediately before the step ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<CheckpointId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlanStep {
    pub fn new(
        id: impl Into<StepId>,
        description: impl Into<String>,
        action_type: ActionType,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            action_type,
            target: target.into(),
            parameters: BTreeMap::new(),
            status: StepStatus::Pending,
            checkpoint_id: None,
            result: None,
            error: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// An externally proposed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPlan {
    pub id: PlanId,
    pub title: String,
    #[serde(default)]
    pub status: PlanStatus,
    pub steps: Vec<PlanStep>,
}

impl AgentPlan {
    pub fn new(id: impl Into<PlanId>, title: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: PlanStatus::Proposed,
            steps,
        }
    }

    pub fn step(&self, id: &StepId) -> Option<&PlanStep> {
        self.steps.iter().find(|s| &s.id == id)
    }

    pub fn step_mut(&mut self, id: &StepId) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|s| &s.id == id)
    }

    /// The first step that has not completed, i.e. the only step allowed to
    /// run next.
    pub fn head_step(&self) -> Option<&PlanStep> {
        self.steps
            .iter()
            .find(|s| s.status != StepStatus::Completed)
    }

    /// The head step, if it is approved and the plan permits execution.
    pub fn next_runnable_step(&self) -> Option<&PlanStep> {
        if !self.status.allows_execution() {
            return None;
        }
        self.head_step()
            .filter(|s| s.status == StepStatus::Approved)
    }

    /// True if any step is currently executing.
    pub fn has_step_in_flight(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.status == StepStatus::Executing)
    }

    pub fn all_completed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    /// Completed steps, last-completed first.
    pub fn completed_steps_rev(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps
            .iter()
            .rev()
            .filter(|s| s.status == StepStatus::Completed)
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
