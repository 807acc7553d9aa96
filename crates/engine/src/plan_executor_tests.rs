// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::BusError;
use parking_lot::Mutex;
use wid_adapters::{ActionCall, FakeActionAdapter, FakeCheckpointAdapter};
use wid_core::test_support::{patch_plan, plan_approved, step_approved};
use wid_core::{FakeClock, PlanStatus, ProjectId};

type TestExecutor = PlanExecutor<FakeActionAdapter, FakeCheckpointAdapter, FakeClock>;

struct Harness {
    store: WorkspaceStore<FakeClock>,
    executor: TestExecutor,
    actions: FakeActionAdapter,
    checkpoints: FakeCheckpointAdapter,
    events: Arc<Mutex<Vec<Event>>>,
    _subs: Vec<Subscription>,
}

impl Harness {
    fn new() -> Self {
        let bus = EventBus::new();
        let ids = SequentialIdGen::new("obs");
        let store = WorkspaceStore::new(ProjectId::new("p1"), bus.clone(), FakeClock::new(), ids.clone());
        let actions = FakeActionAdapter::new();
        let checkpoints = FakeCheckpointAdapter::new();
        let executor = PlanExecutor::new(store.clone(), actions.clone(), checkpoints.clone(), ids);

        let events = Arc::new(Mutex::new(Vec::new()));
        let subs = [
            EventKind::AgentPlanStepStarted,
            EventKind::AgentPlanStepCheckpointed,
            EventKind::AgentPlanStepCompleted,
            EventKind::AgentPlanStepFailed,
            EventKind::AgentPlanStepRolledBack,
            EventKind::AgentPlanCompleted,
            EventKind::AgentPlanCancelled,
            EventKind::AgentObservation,
        ]
        .into_iter()
        .map(|kind| {
            let sink = Arc::clone(&events);
            bus.subscribe(kind, "test", move |event| {
                sink.lock().push(event.clone());
                Ok::<(), BusError>(())
            })
        })
        .collect();

        Self {
            store,
            executor,
            actions,
            checkpoints,
            events,
            _subs: subs,
        }
    }

    fn register(&self, targets: &[&str]) -> PlanId {
        let plan = patch_plan("plan-1", targets);
        let id = plan.id.clone();
        self.executor.register_plan(plan).unwrap();
        id
    }

    fn plan(&self) -> AgentPlan {
        self.store.plan(&PlanId::new("plan-1")).unwrap()
    }

    fn step_status(&self, step: &str) -> StepStatus {
        self.plan().step(&StepId::new(step)).unwrap().status
    }

    fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.name()).collect()
    }

    fn plan_observations(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::AgentObservation { observation }
                    if observation.category == ObservationCategory::Plan =>
                {
                    Some(observation.message.clone())
                }
                _ => None,
            })
            .collect()
    }
}

fn step(id: &str) -> StepId {
    StepId::new(id)
}

#[tokio::test]
async fn register_rejects_duplicate_plan() {
    let h = Harness::new();
    h.register(&["a.ts"]);
    let err = h.executor.register_plan(patch_plan("plan-1", &["b.ts"])).unwrap_err();
    assert!(matches!(err, EngineError::PlanExists(_)));
    assert_eq!(h.plan().steps[0].target, "a.ts");
}

#[tokio::test]
async fn register_resets_step_progress() {
    let h = Harness::new();
    let mut plan = patch_plan("plan-1", &["a.ts"]);
    plan.steps[0].status = StepStatus::Completed;
    plan.steps[0].checkpoint_id = Some(CheckpointId::new("forged"));
    h.executor.register_plan(plan).unwrap();

    assert_eq!(h.plan().status, PlanStatus::Proposed);
    assert_eq!(h.step_status("s1"), StepStatus::Pending);
    assert!(h.plan().steps[0].checkpoint_id.is_none());
}

#[tokio::test]
async fn plan_approval_alone_runs_nothing() {
    let h = Harness::new();
    let plan_id = h.register(&["a.ts", "b.ts"]);
    h.executor.approve_plan(&plan_id).unwrap();

    let outcomes = h.executor.advance(&plan_id).await.unwrap();

    assert!(outcomes.is_empty());
    assert_eq!(h.plan().status, PlanStatus::Approved);
    assert!(h.actions.calls().is_empty());
    assert!(h.checkpoints.calls().is_empty());
}

#[tokio::test]
async fn unapproved_step_execution_changes_nothing() {
    let h = Harness::new();
    let plan_id = h.register(&["a.ts"]);
    h.executor.approve_plan(&plan_id).unwrap();
    let before = h.store.state();

    let outcome = h.executor.execute_step(&plan_id, &step("s1")).await.unwrap();

    assert_eq!(
        outcome,
        StepOutcome::Rejected {
            reason: "step is pending".to_string()
        }
    );
    assert_eq!(h.store.state(), before);
    assert!(h.checkpoints.calls().is_empty());
    assert_eq!(h.plan_observations().len(), 1);
}

#[tokio::test]
async fn safety_checks_refuse() {
    let cases: [(bool, &[&str], &str, &str); 2] = [
        (false, &["s1"], "s1", "plan is proposed"),
        (true, &["s1", "s2"], "s2", "step s1 must run first"),
    ];
    for (approve_plan, approved_steps, target, reason) in cases {
        let h = Harness::new();
        let plan_id = h.register(&["a.ts", "b.ts"]);
        for s in approved_steps {
            h.executor.approve_step(&plan_id, &step(s)).unwrap();
        }
        if approve_plan {
            h.executor.approve_plan(&plan_id).unwrap();
        }
        let before = h.store.state();

        let outcome = h.executor.execute_step(&plan_id, &step(target)).await.unwrap();

        assert_eq!(
            outcome,
            StepOutcome::Rejected {
                reason: reason.to_string()
            },
            "{target}"
        );
        assert_eq!(h.store.state(), before);
    }
}

#[tokio::test]
async fn step_checkpoints_before_acting() {
    let h = Harness::new();
    let plan_id = h.register(&["a.ts"]);
    h.executor.approve_plan(&plan_id).unwrap();
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();

    let outcomes = h.executor.advance(&plan_id).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0].1,
        StepOutcome::Completed {
            result: "patched a.ts".to_string()
        }
    );
    assert_eq!(
        h.event_names(),
        vec![
            "plan:step_started",
            "plan:step_checkpointed",
            "plan:step_completed",
            "plan:completed"
        ]
    );
    let s1 = h.plan().steps[0].clone();
    assert_eq!(s1.status, StepStatus::Completed);
    assert_eq!(s1.checkpoint_id, Some(CheckpointId::new("cp-1")));
    assert_eq!(s1.result.as_deref(), Some("patched a.ts"));
    assert_eq!(h.plan().status, PlanStatus::Completed);
    assert_eq!(h.actions.file("a.ts").as_deref(), Some("patched a.ts"));
}

#[tokio::test]
async fn checkpoint_failure_fails_step_without_acting() {
    let h = Harness::new();
    h.checkpoints.fail_create("disk full");
    let plan_id = h.register(&["a.ts"]);
    h.executor.approve_plan(&plan_id).unwrap();
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();

    let outcomes = h.executor.advance(&plan_id).await.unwrap();

    assert_eq!(
        outcomes[0].1,
        StepOutcome::Failed {
            error: "checkpoint failed: disk full".to_string()
        }
    );
    assert!(h.actions.calls().is_empty());
    let s1 = h.plan().steps[0].clone();
    assert_eq!(s1.status, StepStatus::Failed);
    assert!(s1.checkpoint_id.is_none());
    assert_eq!(s1.error.as_deref(), Some("checkpoint failed: disk full"));
    assert_eq!(h.plan().status, PlanStatus::Executing);
}

#[tokio::test]
async fn failed_step_keeps_plan_executing_and_blocks_later_steps() {
    let h = Harness::new();
    h.actions.fail_on("b.ts", "permission denied");
    let plan_id = h.register(&["a.ts", "b.ts", "c.ts"]);
    h.executor.approve_plan(&plan_id).unwrap();

    h.executor.approve_step(&plan_id, &step("s1")).unwrap();
    h.executor.advance(&plan_id).await.unwrap();
    assert_eq!(h.step_status("s1"), StepStatus::Completed);

    h.executor.approve_step(&plan_id, &step("s2")).unwrap();
    h.executor.advance(&plan_id).await.unwrap();

    h.executor.approve_step(&plan_id, &step("s3")).unwrap();
    h.executor.advance(&plan_id).await.unwrap();

    let plan = h.plan();
    assert_eq!(plan.status, PlanStatus::Executing);
    assert_eq!(h.step_status("s2"), StepStatus::Failed);
    assert_eq!(
        plan.steps[1].error.as_deref(),
        Some("action failed: permission denied")
    );
    assert_eq!(h.step_status("s3"), StepStatus::Approved);
    assert_eq!(h.actions.patched_paths(), vec!["a.ts", "b.ts"]);
    assert!(h
        .plan_observations()
        .iter()
        .any(|m| m.contains("permission denied")));
    // No automatic rollback
    assert!(h.checkpoints.rollbacks().is_empty());
}

#[tokio::test]
async fn failed_step_can_be_retried() {
    let h = Harness::new();
    h.actions.fail_on("a.ts", "locked");
    let plan_id = h.register(&["a.ts"]);
    h.executor.approve_plan(&plan_id).unwrap();
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();
    h.executor.advance(&plan_id).await.unwrap();
    assert_eq!(h.step_status("s1"), StepStatus::Failed);

    h.actions.clear_failure("a.ts");
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();
    assert!(h.plan().steps[0].error.is_none());
    h.executor.advance(&plan_id).await.unwrap();

    assert_eq!(h.step_status("s1"), StepStatus::Completed);
    assert_eq!(h.plan().status, PlanStatus::Completed);
}

#[tokio::test]
async fn execute_step_continues_with_next_approved_step() {
    let h = Harness::new();
    let plan_id = h.register(&["a.ts", "b.ts", "c.ts"]);
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();
    h.executor.approve_step(&plan_id, &step("s2")).unwrap();
    h.store.dispatch(Event::AgentPlanApproved {
        plan_id: plan_id.clone(),
    });

    let outcome = h.executor.execute_step(&plan_id, &step("s1")).await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(h.step_status("s2"), StepStatus::Completed);
    assert_eq!(h.step_status("s3"), StepStatus::Pending);
    assert_eq!(h.plan().status, PlanStatus::Executing);
}

#[tokio::test]
async fn read_step_returns_file_content() {
    let h = Harness::new();
    h.actions.set_file("notes.md", "hello");
    let plan = AgentPlan::new(
        "plan-1",
        "read",
        vec![PlanStep::new("s1", "read notes", ActionType::ReadFile, "notes.md")],
    );
    h.executor.register_plan(plan).unwrap();
    let plan_id = PlanId::new("plan-1");
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();
    h.executor.approve_plan(&plan_id).unwrap();

    h.executor.advance(&plan_id).await.unwrap();

    assert_eq!(h.plan().steps[0].result.as_deref(), Some("hello"));
    assert_eq!(
        h.actions.calls(),
        vec![ActionCall::ReadFile {
            path: "notes.md".to_string()
        }]
    );
}

#[tokio::test]
async fn command_steps_are_unsupported() {
    let h = Harness::new();
    let plan = AgentPlan::new(
        "plan-1",
        "test",
        vec![PlanStep::new("s1", "run tests", ActionType::RunCommand, "npm test")],
    );
    h.executor.register_plan(plan).unwrap();
    let plan_id = PlanId::new("plan-1");
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();
    h.executor.approve_plan(&plan_id).unwrap();

    let outcomes = h.executor.advance(&plan_id).await.unwrap();

    assert_eq!(
        outcomes[0].1,
        StepOutcome::Failed {
            error: "unsupported action: run-command `npm test`".to_string()
        }
    );
    assert_eq!(h.step_status("s1"), StepStatus::Failed);
}

#[tokio::test]
async fn unknown_plan_and_step_are_errors() {
    let h = Harness::new();
    let missing = PlanId::new("nope");
    assert!(matches!(
        h.executor.advance(&missing).await,
        Err(EngineError::PlanNotFound(_))
    ));
    let plan_id = h.register(&["a.ts"]);
    assert!(matches!(
        h.executor.approve_step(&plan_id, &step("s9")),
        Err(EngineError::StepNotFound { .. })
    ));
    assert!(matches!(
        h.executor.execute_step(&plan_id, &step("s9")).await,
        Err(EngineError::StepNotFound { .. })
    ));
}

#[tokio::test]
async fn rollback_step_restores_its_checkpoint() {
    let h = Harness::new();
    let plan_id = h.register(&["a.ts", "b.ts"]);
    h.executor.approve_plan(&plan_id).unwrap();
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();
    h.executor.advance(&plan_id).await.unwrap();

    let checkpoint = h.executor.rollback_step(&plan_id, &step("s1")).await.unwrap();

    assert_eq!(checkpoint, "cp-1");
    assert_eq!(h.checkpoints.rollbacks(), vec![CheckpointId::new("cp-1")]);
    assert_eq!(h.step_status("s1"), StepStatus::RolledBack);
}

#[tokio::test]
async fn rollback_step_requires_a_finished_step_with_checkpoint() {
    let h = Harness::new();
    h.checkpoints.fail_create("no space");
    let plan_id = h.register(&["a.ts", "b.ts"]);

    let err = h.executor.rollback_step(&plan_id, &step("s1")).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRollback { .. }), "{err}");

    h.executor.approve_plan(&plan_id).unwrap();
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();
    h.executor.advance(&plan_id).await.unwrap();
    let err = h.executor.rollback_step(&plan_id, &step("s1")).await.unwrap_err();
    assert!(matches!(err, EngineError::NoCheckpoint { .. }), "{err}");
}

#[tokio::test]
async fn rollback_plan_visits_completed_steps_in_reverse_then_cancels() {
    let h = Harness::new();
    h.actions.fail_on("c.ts", "conflict");
    let plan_id = h.register(&["a.ts", "b.ts", "c.ts"]);
    for s in ["s1", "s2", "s3"] {
        h.executor.approve_step(&plan_id, &step(s)).unwrap();
    }
    h.executor.approve_plan(&plan_id).unwrap();
    h.executor.advance(&plan_id).await.unwrap();
    assert_eq!(h.step_status("s3"), StepStatus::Failed);

    let report = h.executor.rollback_plan(&plan_id).await.unwrap();

    assert_eq!(report.rolled_back, vec![step("s2"), step("s1")]);
    assert!(report.failed.is_empty());
    assert_eq!(
        h.checkpoints.rollbacks(),
        vec![CheckpointId::new("cp-2"), CheckpointId::new("cp-1")]
    );
    assert_eq!(h.plan().status, PlanStatus::Cancelled);
    assert_eq!(h.step_status("s1"), StepStatus::RolledBack);
    assert_eq!(h.step_status("s3"), StepStatus::Failed);
}

#[tokio::test]
async fn rollback_plan_is_best_effort() {
    let h = Harness::new();
    let plan_id = h.register(&["a.ts", "b.ts"]);
    for s in ["s1", "s2"] {
        h.executor.approve_step(&plan_id, &step(s)).unwrap();
    }
    h.executor.approve_plan(&plan_id).unwrap();
    h.executor.advance(&plan_id).await.unwrap();
    assert_eq!(h.plan().status, PlanStatus::Completed);
    h.checkpoints.fail_rollback("cp-2");

    let report = h.executor.rollback_plan(&plan_id).await.unwrap();

    assert_eq!(report.rolled_back, vec![step("s1")]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, step("s2"));
    assert_eq!(h.plan().status, PlanStatus::Cancelled);
    assert_eq!(h.step_status("s2"), StepStatus::Completed);
    assert!(h
        .plan_observations()
        .iter()
        .any(|m| m.contains("Could not roll back step s2")));
}

#[tokio::test]
async fn cancelled_plan_does_not_run() {
    let h = Harness::new();
    let plan_id = h.register(&["a.ts"]);
    h.executor.approve_plan(&plan_id).unwrap();
    h.executor.rollback_plan(&plan_id).await.unwrap();
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();

    let outcomes = h.executor.advance(&plan_id).await.unwrap();

    assert!(outcomes.is_empty());
    assert_eq!(h.plan().status, PlanStatus::Cancelled);
}

#[tokio::test]
async fn runner_advances_on_approval_events() {
    let h = Harness::new();
    let runner = ExecutorRunner::spawn(h.executor.clone());
    let _subs = runner.attach(h.store.bus());
    h.register(&["a.ts", "b.ts"]);

    h.store.dispatch(plan_approved("plan-1"));
    h.store.dispatch(step_approved("plan-1", "s1"));
    runner.wait_idle().await;
    assert_eq!(h.step_status("s1"), StepStatus::Completed);
    assert_eq!(h.step_status("s2"), StepStatus::Pending);

    h.store.dispatch(step_approved("plan-1", "s2"));
    runner.wait_idle().await;
    assert_eq!(h.plan().status, PlanStatus::Completed);
}

#[tokio::test]
async fn runner_survives_unknown_plans() {
    let h = Harness::new();
    let runner = ExecutorRunner::spawn(h.executor.clone());
    runner.enqueue(PlanId::new("ghost"));
    runner.wait_idle().await;

    let plan_id = h.register(&["a.ts"]);
    h.executor.approve_step(&plan_id, &step("s1")).unwrap();
    h.executor.approve_plan(&plan_id).unwrap();
    runner.enqueue(plan_id);
    runner.wait_idle().await;
    assert_eq!(h.plan().status, PlanStatus::Completed);
}
