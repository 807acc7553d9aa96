// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use wid_core::test_support::{
    build_failed, cursor_moved, file_changed, file_saved, focus_changed, patch_plan,
    plan_approved, runtime_crashed, step_approved,
};
use wid_core::{CheckpointId, StepId};

const T0: u64 = 1_000_000;

fn state() -> WorkspaceState {
    WorkspaceState::new(ProjectId::new("proj"))
}

fn assert_distribution(state: &WorkspaceState) {
    let sum: f64 = state.intent.as_array().iter().sum();
    assert!((sum - 1.0).abs() < 1e-6, "sum was {sum}");
}

// --- files ---

#[test]
fn repeated_identical_change_is_not_dirty() {
    let mut s = state();
    s.apply_event(&file_changed("a.ts", "x"), T0);
    s.apply_event(&file_changed("a.ts", "x"), T0 + 10);

    let file = &s.files["a.ts"];
    assert!(!file.dirty);
    assert_eq!(s.files.len(), 1);
}

#[test]
fn changed_content_is_dirty_until_saved() {
    let mut s = state();
    s.apply_event(&file_changed("a.ts", "x"), T0);
    s.apply_event(&file_changed("a.ts", "y"), T0 + 10);
    assert!(s.files["a.ts"].dirty);

    s.apply_event(&file_saved("a.ts"), T0 + 20);
    let file = &s.files["a.ts"];
    assert!(!file.dirty);
    assert_eq!(file.saved_content, "y");
    assert_eq!(file.last_saved_ms, Some(T0 + 20));
}

#[test]
fn reverting_content_clears_dirty() {
    let mut s = state();
    s.apply_event(&file_changed("a.ts", "x"), T0);
    s.apply_event(&file_changed("a.ts", "y"), T0 + 1);
    s.apply_event(&file_changed("a.ts", "x"), T0 + 2);
    assert!(!s.files["a.ts"].dirty);
}

#[test]
fn new_file_bumps_generating() {
    let mut s = state();
    let reduction = s.apply_event(&file_changed("new.ts", ""), T0);
    assert_eq!(reduction.signals, vec![IntentSignal::NewFilesCreated]);
    assert_eq!(s.intent.dominant(), IntentKind::Generating);
    assert!((s.intent.get(IntentKind::Generating) - 0.55 / 1.3).abs() < 1e-9);
}

#[test]
fn known_file_change_does_not_bump() {
    let mut s = state();
    s.apply_event(&file_changed("a.ts", "x"), T0);
    let before = s.intent.clone();
    let reduction = s.apply_event(&file_changed("a.ts", "y"), T0 + 1);
    assert!(reduction.signals.is_empty());
    assert_eq!(s.intent, before);
}

#[test]
fn delete_removes_entry_and_focus() {
    let mut s = state();
    s.apply_event(&file_changed("a.ts", "x"), T0);
    s.apply_event(&focus_changed("a.ts"), T0);
    s.apply_event(
        &Event::FileDeleted {
            path: "a.ts".to_string(),
        },
        T0 + 1,
    );
    assert!(s.files.is_empty());
    assert!(s.editor.active_file.is_none());
}

#[test]
fn save_with_content_updates_both_copies() {
    let mut s = state();
    s.apply_event(&file_changed("a.ts", "x"), T0);
    s.apply_event(
        &Event::FileSaved {
            path: "a.ts".to_string(),
            content: Some("z".to_string()),
        },
        T0 + 1,
    );
    let file = &s.files["a.ts"];
    assert_eq!(file.content, "z");
    assert_eq!(file.saved_content, "z");
    assert!(!file.dirty);
}

#[yare::parameterized(
    rapid     = { 4_999, true },
    boundary  = { 5_000, false },
    slow      = { 30_000, false },
)]
fn resave_within_window_bumps_refactoring(gap_ms: u64, expect_bump: bool) {
    let mut s = state();
    s.apply_event(&file_changed("a.ts", "x"), T0);
    s.apply_event(&file_saved("a.ts"), T0);
    let reduction = s.apply_event(&file_saved("a.ts"), T0 + gap_ms);
    assert_eq!(
        reduction.signals.contains(&IntentSignal::RapidResave),
        expect_bump
    );
}

// --- build / runtime ---

#[test]
fn build_failure_records_errors_and_bumps_debugging() {
    let mut s = state();
    let reduction = s.apply_event(&build_failed("Unexpected token"), T0);
    assert_eq!(s.build.status, BuildStatus::Failed);
    assert_eq!(s.build.errors.len(), 1);
    assert_eq!(reduction.signals, vec![IntentSignal::BuildFailure]);
    assert_eq!(s.intent.dominant(), IntentKind::Debugging);

    s.apply_event(&Event::BuildSucceeded, T0 + 1);
    assert_eq!(s.build.status, BuildStatus::Success);
    assert!(s.build.errors.is_empty());
}

#[test]
fn build_started_sets_building() {
    let mut s = state();
    s.apply_event(&Event::BuildStarted, T0);
    assert_eq!(s.build.status, BuildStatus::Building);
}

#[test]
fn runtime_lifecycle() {
    let mut s = state();
    s.apply_event(
        &Event::RuntimeStarted {
            container_id: Some("c1".to_string()),
            port: Some(3000),
        },
        T0,
    );
    assert_eq!(s.runtime.status, RuntimeStatus::Running);
    assert_eq!(s.runtime.port, Some(3000));

    let reduction = s.apply_event(&runtime_crashed(), T0 + 1);
    assert_eq!(s.runtime.status, RuntimeStatus::Crashed);
    assert_eq!(reduction.signals, vec![IntentSignal::RuntimeCrash]);

    s.apply_event(&Event::RuntimeStopped, T0 + 2);
    assert_eq!(s.runtime, RuntimeState::default());
}

// --- editor ---

#[test]
fn stationary_cursor_bumps_learning_once_per_idle_period() {
    let mut s = state();
    s.apply_event(&cursor_moved("a.ts", 4, 2), T0);

    let early = s.apply_event(&cursor_moved("a.ts", 4, 2), T0 + 5_000);
    assert!(early.signals.is_empty());

    let idle = s.apply_event(&cursor_moved("a.ts", 4, 2), T0 + 10_001);
    assert_eq!(idle.signals, vec![IntentSignal::IdleCursor]);

    let again = s.apply_event(&cursor_moved("a.ts", 4, 2), T0 + 20_000);
    assert!(again.signals.is_empty(), "must not fire twice in one idle period");

    // Moving starts a new idle period
    s.apply_event(&cursor_moved("a.ts", 5, 0), T0 + 21_000);
    let next = s.apply_event(&cursor_moved("a.ts", 5, 0), T0 + 31_001);
    assert_eq!(next.signals, vec![IntentSignal::IdleCursor]);
}

#[test]
fn cursor_in_other_file_resets_idle() {
    let mut s = state();
    s.apply_event(&cursor_moved("a.ts", 1, 1), T0);
    let moved = s.apply_event(&cursor_moved("b.ts", 1, 1), T0 + 11_000);
    assert!(moved.signals.is_empty());
    assert_eq!(s.editor.active_file.as_deref(), Some("b.ts"));
}

#[test]
fn presence_is_announced_once() {
    let mut s = state();
    let first = s.apply_event(&focus_changed("a.ts"), T0);
    assert!(first.announce_presence);
    let second = s.apply_event(&file_changed("a.ts", "x"), T0 + 1);
    assert!(!second.announce_presence);
    assert!(s.presence_announced);
}

#[test]
fn build_events_do_not_announce_presence() {
    let mut s = state();
    let r = s.apply_event(&Event::BuildSucceeded, T0);
    assert!(!r.announce_presence);
}

// --- intent ---

#[test]
fn decay_event_moves_toward_uniform() {
    let mut s = state();
    s.apply_event(&runtime_crashed(), T0);
    let before = s.intent.get(IntentKind::Debugging);
    s.apply_event(&Event::IntentDecay, T0 + 2_000);
    let after = s.intent.get(IntentKind::Debugging);
    assert!(after < before && after > 0.25);
    assert_distribution(&s);
}

#[test]
fn intent_shift_is_reported() {
    let mut s = state();
    s.apply_event(&file_changed("a.ts", "x"), T0);
    let r = s.apply_event(&runtime_crashed(), T0 + 1);
    assert_eq!(
        r.intent_shift,
        Some((IntentKind::Generating, IntentKind::Debugging))
    );
}

// --- plans ---

fn with_plan(targets: &[&str]) -> WorkspaceState {
    let mut s = state();
    s.apply_event(
        &Event::AgentPlanProposed {
            plan: patch_plan("p1", targets),
        },
        T0,
    );
    s
}

fn step_status(s: &WorkspaceState, step: &str) -> StepStatus {
    s.plan(&PlanId::new("p1"))
        .and_then(|p| p.step(&StepId::new(step)))
        .map(|st| st.status)
        .unwrap()
}

fn plan_status(s: &WorkspaceState) -> PlanStatus {
    s.plan(&PlanId::new("p1")).map(|p| p.status).unwrap()
}

fn started(step: &str) -> Event {
    Event::AgentPlanStepStarted {
        plan_id: PlanId::new("p1"),
        step_id: StepId::new(step),
    }
}

#[test]
fn proposed_plan_is_registered_once() {
    let mut s = with_plan(&["a.ts"]);
    let mut other = patch_plan("p1", &["b.ts", "c.ts"]);
    other.title = "dup".to_string();
    s.apply_event(&Event::AgentPlanProposed { plan: other }, T0 + 1);
    assert_eq!(s.plans["p1"].steps.len(), 1);
    assert_eq!(plan_status(&s), PlanStatus::Proposed);
}

#[test]
fn proposed_plan_discards_incoming_step_progress() {
    let mut plan = patch_plan("p1", &["a.ts", "b.ts"]);
    for step in &mut plan.steps {
        step.status = StepStatus::Completed;
        step.checkpoint_id = Some(CheckpointId::new("cp-forged"));
        step.result = Some("done".to_string());
        step.error = Some("old".to_string());
    }
    plan.status = PlanStatus::Completed;

    let mut s = state();
    s.apply_event(&Event::AgentPlanProposed { plan }, T0);
    s.apply_event(&plan_approved("p1"), T0);
    s.apply_event(&Event::AgentPlanCompleted { plan_id: PlanId::new("p1") }, T0);

    assert_eq!(plan_status(&s), PlanStatus::Approved);
    for step in &s.plans["p1"].steps {
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!(step.checkpoint_id, None);
        assert_eq!(step.result, None);
        assert_eq!(step.error, None);
    }
}

#[test]
fn step_start_requires_approvals() {
    let mut s = with_plan(&["a.ts"]);
    s.apply_event(&started("s1"), T0);
    assert_eq!(step_status(&s, "s1"), StepStatus::Pending);

    s.apply_event(&step_approved("p1", "s1"), T0);
    s.apply_event(&started("s1"), T0);
    assert_eq!(step_status(&s, "s1"), StepStatus::Approved, "plan not approved");

    s.apply_event(&plan_approved("p1"), T0);
    s.apply_event(&started("s1"), T0);
    assert_eq!(step_status(&s, "s1"), StepStatus::Executing);
    assert_eq!(plan_status(&s), PlanStatus::Executing);
}

#[test]
fn only_one_step_in_flight() {
    let mut s = with_plan(&["a.ts", "b.ts"]);
    s.apply_event(&plan_approved("p1"), T0);
    s.apply_event(&step_approved("p1", "s1"), T0);
    s.apply_event(&step_approved("p1", "s2"), T0);
    s.apply_event(&started("s1"), T0);
    s.apply_event(&started("s2"), T0);
    assert_eq!(step_status(&s, "s1"), StepStatus::Executing);
    assert_eq!(step_status(&s, "s2"), StepStatus::Approved);
}

#[test]
fn step_outcomes_are_recorded() {
    let mut s = with_plan(&["a.ts", "b.ts"]);
    s.apply_event(&plan_approved("p1"), T0);
    s.apply_event(&step_approved("p1", "s1"), T0);
    s.apply_event(&started("s1"), T0);
    s.apply_event(
        &Event::AgentPlanStepCheckpointed {
            plan_id: PlanId::new("p1"),
            step_id: StepId::new("s1"),
            checkpoint_id: CheckpointId::new("cp-1"),
        },
        T0,
    );
    s.apply_event(
        &Event::AgentPlanStepCompleted {
            plan_id: PlanId::new("p1"),
            step_id: StepId::new("s1"),
            result: "ok".to_string(),
        },
        T0,
    );
    let step = &s.plans["p1"].steps[0];
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.result.as_deref(), Some("ok"));
    assert_eq!(step.checkpoint_id, Some(CheckpointId::new("cp-1")));

    s.apply_event(&step_approved("p1", "s2"), T0);
    s.apply_event(&started("s2"), T0);
    s.apply_event(
        &Event::AgentPlanStepFailed {
            plan_id: PlanId::new("p1"),
            step_id: StepId::new("s2"),
            error: "disk full".to_string(),
        },
        T0,
    );
    assert_eq!(step_status(&s, "s2"), StepStatus::Failed);
    assert_eq!(plan_status(&s), PlanStatus::Executing);
    assert_eq!(s.plans["p1"].steps[1].error.as_deref(), Some("disk full"));

    // Incomplete plans never complete
    s.apply_event(
        &Event::AgentPlanCompleted {
            plan_id: PlanId::new("p1"),
        },
        T0,
    );
    assert_eq!(plan_status(&s), PlanStatus::Executing);
}

#[test]
fn cancelled_plan_rejects_step_approval() {
    let mut s = with_plan(&["a.ts"]);
    s.apply_event(
        &Event::AgentPlanCancelled {
            plan_id: PlanId::new("p1"),
        },
        T0,
    );
    s.apply_event(&step_approved("p1", "s1"), T0);
    assert_eq!(plan_status(&s), PlanStatus::Cancelled);
    assert_eq!(step_status(&s, "s1"), StepStatus::Pending);
}

#[test]
fn advisory_events_leave_state_untouched() {
    let mut s = with_plan(&["a.ts"]);
    let before = s.clone();
    s.apply_event(&Event::Custom, T0);
    assert_eq!(s, before);
}

#[test]
fn every_event_keeps_distribution_normalized() {
    let mut s = state();
    let events = vec![
        file_changed("a.ts", "x"),
        file_changed("b.ts", "y"),
        build_failed("boom"),
        runtime_crashed(),
        file_saved("a.ts"),
        file_saved("a.ts"),
        Event::IntentDecay,
        cursor_moved("a.ts", 0, 0),
    ];
    for (i, event) in events.iter().enumerate() {
        s.apply_event(event, T0 + i as u64);
        assert_distribution(&s);
    }
}

#[test]
fn oldest_finished_plans_are_dropped_past_the_cap() {
    let mut s = state();
    let live = PlanId::new("live");
    s.apply_event(
        &Event::AgentPlanProposed {
            plan: patch_plan("live", &["a.ts"]),
        },
        T0,
    );
    for n in 0..=FINISHED_PLAN_CAP {
        let id = format!("done-{n}");
        s.apply_event(
            &Event::AgentPlanProposed {
                plan: patch_plan(&id, &["a.ts"]),
            },
            T0,
        );
        s.apply_event(&Event::AgentPlanCancelled { plan_id: PlanId::new(&id) }, T0);
    }

    assert_eq!(s.finished_plans.len(), FINISHED_PLAN_CAP);
    assert!(s.plan(&PlanId::new("done-0")).is_none());
    assert!(s.plan(&PlanId::new("done-1")).is_some());
    assert!(s.plan(&live).is_some());
    assert_eq!(s.plans.len(), FINISHED_PLAN_CAP + 1);
}

#[test]
fn cancelling_twice_does_not_count_twice() {
    let mut s = with_plan(&["a.ts"]);
    let cancel = Event::AgentPlanCancelled {
        plan_id: PlanId::new("p1"),
    };
    s.apply_event(&cancel, T0);
    s.apply_event(&cancel, T0);
    assert_eq!(s.finished_plans, VecDeque::from([PlanId::new("p1")]));
}
