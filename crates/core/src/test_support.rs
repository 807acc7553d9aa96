// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{ActionType, AgentPlan, BuildError, Event, PlanId, PlanStep, StepId};

// ── Event factory functions ─────────────────────────────────────────────────

pub fn file_changed(path: &str, content: &str) -> Event {
    Event::FileChanged {
        path: path.to_string(),
        content: content.to_string(),
    }
}

pub fn file_saved(path: &str) -> Event {
    Event::FileSaved {
        path: path.to_string(),
        content: None,
    }
}

pub fn focus_changed(path: &str) -> Event {
    Event::EditorFocusChanged {
        path: path.to_string(),
    }
}

pub fn cursor_moved(path: &str, line: u32, column: u32) -> Event {
    Event::EditorCursorMoved {
        path: path.to_string(),
        line,
        column,
    }
}

pub fn build_failed(message: &str) -> Event {
    Event::BuildFailed {
        errors: vec![BuildError::new("src/index.ts", 1, message)],
    }
}

pub fn runtime_crashed() -> Event {
    Event::RuntimeCrashed { message: None }
}

pub fn plan_approved(plan_id: &str) -> Event {
    Event::AgentPlanApproved {
        plan_id: PlanId::new(plan_id),
    }
}

pub fn step_approved(plan_id: &str, step_id: &str) -> Event {
    Event::AgentPlanStepApproved {
        plan_id: PlanId::new(plan_id),
        step_id: StepId::new(step_id),
    }
}

// ── Plan builders ───────────────────────────────────────────────────────────

/// A plan with one patch step per target, named `s1`, `s2`, ...
pub fn patch_plan(plan_id: &str, targets: &[&str]) -> AgentPlan {
    let steps = targets
        .iter()
        .enumerate()
        .map(|(i, target)| {
            PlanStep::new(
                format!("s{}", i + 1),
                format!("patch {target}"),
                ActionType::PatchFile,
                *target,
            )
            .with_param("content", format!("patched {target}"))
        })
        .collect();
    AgentPlan::new(plan_id, format!("plan {plan_id}"), steps)
}
