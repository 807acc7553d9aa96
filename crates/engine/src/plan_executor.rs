// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan executor: approval-gated, checkpointed, one step at a time.
//!
//! Plan and step status live in the workspace state. The executor reads them
//! through the store, performs the checkpoint and action I/O, and records
//! every outcome by dispatching plan events.

use crate::bus::{EventBus, Subscription};
use crate::error::EngineError;
use crate::store::WorkspaceStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use wid_adapters::{ActionAdapter, CheckpointAdapter};
use wid_core::{
    ActionType, AgentPlan, CheckpointId, Clock, Event, EventKind, IdGen, Observation,
    ObservationCategory, PlanId, PlanStep, SequentialIdGen, StepId, StepStatus,
};

/// Result of one attempt to execute a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed { result: String },
    Failed { error: String },
    /// Safety check refused the step; nothing changed
    Rejected { reason: String },
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed { .. })
    }
}

/// What `rollback_plan` managed to undo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Steps restored, in the order they were visited (reverse plan order)
    pub rolled_back: Vec<StepId>,
    /// Steps whose rollback failed, with the error
    pub failed: Vec<(StepId, String)>,
}

/// Drives plans for one project
pub struct PlanExecutor<A, K, C: Clock> {
    store: WorkspaceStore<C>,
    actions: A,
    checkpoints: K,
    ids: SequentialIdGen,
    /// Held for the whole of a step so two steps never run concurrently
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl<A: Clone, K: Clone, C: Clock> Clone for PlanExecutor<A, K, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            actions: self.actions.clone(),
            checkpoints: self.checkpoints.clone(),
            ids: self.ids.clone(),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<A, K, C> PlanExecutor<A, K, C>
where
    A: ActionAdapter,
    K: CheckpointAdapter,
    C: Clock,
{
    pub fn new(store: WorkspaceStore<C>, actions: A, checkpoints: K, ids: SequentialIdGen) -> Self {
        Self {
            store,
            actions,
            checkpoints,
            ids,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Record an externally proposed plan. Every step starts `pending`.
    pub fn register_plan(&self, mut plan: AgentPlan) -> Result<(), EngineError> {
        if self.store.plan(&plan.id).is_some() {
            return Err(EngineError::PlanExists(plan.id.to_string()));
        }
        for step in &mut plan.steps {
            step.status = StepStatus::Pending;
            step.checkpoint_id = None;
            step.result = None;
            step.error = None;
        }
        tracing::info!(plan = %plan.id, steps = plan.steps.len(), "plan registered");
        self.store.dispatch(Event::AgentPlanProposed { plan });
        Ok(())
    }

    pub fn approve_plan(&self, plan_id: &PlanId) -> Result<(), EngineError> {
        self.require_plan(plan_id)?;
        self.store.dispatch(Event::AgentPlanApproved {
            plan_id: plan_id.clone(),
        });
        Ok(())
    }

    pub fn approve_step(&self, plan_id: &PlanId, step_id: &StepId) -> Result<(), EngineError> {
        require_step(&self.require_plan(plan_id)?, step_id)?;
        self.store.dispatch(Event::AgentPlanStepApproved {
            plan_id: plan_id.clone(),
            step_id: step_id.clone(),
        });
        Ok(())
    }

    /// Run approved steps from the head of the plan until one fails, the head
    /// is not yet approved, or the plan completes.
    pub async fn advance(&self, plan_id: &PlanId) -> Result<Vec<(StepId, StepOutcome)>, EngineError> {
        let _gate = self.gate.lock().await;
        self.advance_locked(plan_id).await
    }

    /// Execute one named step, then continue with whatever follows it.
    ///
    /// Refuses (with an observation and no state change) unless the plan is
    /// approved or executing, the step is approved, nothing else is in
    /// flight, and the step is the next one in order.
    pub async fn execute_step(
        &self,
        plan_id: &PlanId,
        step_id: &StepId,
    ) -> Result<StepOutcome, EngineError> {
        let _gate = self.gate.lock().await;
        let plan = self.require_plan(plan_id)?;
        let step = require_step(&plan, step_id)?.clone();

        if let Err(reason) = check_runnable(&plan, &step) {
            self.observe(format!("Refused step {step_id} of plan {plan_id}: {reason}"));
            tracing::warn!(plan = %plan_id, step = %step_id, %reason, "step rejected");
            return Ok(StepOutcome::Rejected { reason });
        }

        let outcome = self.run_step(plan_id, &step).await;
        if outcome.is_completed() {
            self.advance_locked(plan_id).await?;
        }
        Ok(outcome)
    }

    /// Restore the checkpoint taken before `step_id` ran and mark it rolled back
    pub async fn rollback_step(
        &self,
        plan_id: &PlanId,
        step_id: &StepId,
    ) -> Result<CheckpointId, EngineError> {
        let _gate = self.gate.lock().await;
        let plan = self.require_plan(plan_id)?;
        let step = require_step(&plan, step_id)?;

        if !matches!(step.status, StepStatus::Completed | StepStatus::Failed) {
            return Err(EngineError::InvalidRollback {
                plan: plan_id.to_string(),
                step: step_id.to_string(),
                status: step.status.to_string(),
            });
        }
        let Some(checkpoint_id) = step.checkpoint_id.clone() else {
            return Err(EngineError::NoCheckpoint {
                plan: plan_id.to_string(),
                step: step_id.to_string(),
            });
        };

        self.checkpoints
            .rollback(self.store.project_id(), &checkpoint_id)
            .await?;
        self.store.dispatch(Event::AgentPlanStepRolledBack {
            plan_id: plan_id.clone(),
            step_id: step_id.clone(),
        });
        tracing::info!(plan = %plan_id, step = %step_id, checkpoint = %checkpoint_id, "step rolled back");
        Ok(checkpoint_id)
    }

    /// Roll back every completed step, last first, then cancel the plan.
    ///
    /// Best-effort: a step that cannot be restored is reported and observed,
    /// and the walk continues.
    pub async fn rollback_plan(&self, plan_id: &PlanId) -> Result<RollbackReport, EngineError> {
        let _gate = self.gate.lock().await;
        let plan = self.require_plan(plan_id)?;
        let mut report = RollbackReport::default();

        for step in plan.completed_steps_rev() {
            let result = match &step.checkpoint_id {
                Some(checkpoint_id) => self
                    .checkpoints
                    .rollback(self.store.project_id(), checkpoint_id)
                    .await
                    .map_err(|e| e.to_string()),
                None => Err("no checkpoint recorded".to_string()),
            };
            match result {
                Ok(()) => {
                    self.store.dispatch(Event::AgentPlanStepRolledBack {
                        plan_id: plan_id.clone(),
                        step_id: step.id.clone(),
                    });
                    report.rolled_back.push(step.id.clone());
                }
                Err(error) => {
                    tracing::warn!(plan = %plan_id, step = %step.id, %error, "step rollback failed");
                    self.observe(format!(
                        "Could not roll back step {} of plan {plan_id}: {error}",
                        step.id
                    ));
                    report.failed.push((step.id.clone(), error));
                }
            }
        }

        self.store.dispatch(Event::AgentPlanCancelled {
            plan_id: plan_id.clone(),
        });
        tracing::info!(
            plan = %plan_id,
            rolled_back = report.rolled_back.len(),
            failed = report.failed.len(),
            "plan rolled back"
        );
        Ok(report)
    }

    /// Delete every checkpoint this project holds. Waits for a running step.
    pub async fn discard_checkpoints(&self) -> Result<usize, EngineError> {
        let _gate = self.gate.lock().await;
        Ok(self.checkpoints.discard_all(self.store.project_id()).await?)
    }

    async fn advance_locked(
        &self,
        plan_id: &PlanId,
    ) -> Result<Vec<(StepId, StepOutcome)>, EngineError> {
        let mut outcomes = Vec::new();
        loop {
            let plan = self.require_plan(plan_id)?;
            if plan.has_step_in_flight() {
                break;
            }
            if let Some(step) = plan.next_runnable_step().cloned() {
                let outcome = self.run_step(plan_id, &step).await;
                let done = outcome.is_completed();
                outcomes.push((step.id, outcome));
                if !done {
                    break;
                }
                continue;
            }
            if plan.status.allows_execution() && plan.all_completed() {
                self.store.dispatch(Event::AgentPlanCompleted {
                    plan_id: plan_id.clone(),
                });
                tracing::info!(plan = %plan_id, "plan completed");
            }
            break;
        }
        Ok(outcomes)
    }

    /// Start, checkpoint, act, record. Caller holds the gate and has checked
    /// that the step is runnable.
    async fn run_step(&self, plan_id: &PlanId, step: &PlanStep) -> StepOutcome {
        let step_id = &step.id;
        self.store.dispatch(Event::AgentPlanStepStarted {
            plan_id: plan_id.clone(),
            step_id: step_id.clone(),
        });
        let started = self
            .store
            .plan(plan_id)
            .and_then(|p| p.step(step_id).map(|s| s.status))
            == Some(StepStatus::Executing);
        if !started {
            let reason = "step did not start".to_string();
            self.observe(format!("Refused step {step_id} of plan {plan_id}: {reason}"));
            return StepOutcome::Rejected { reason };
        }
        tracing::info!(plan = %plan_id, step = %step_id, action = %step.action_type, "step started");

        let description = format!("before step {step_id} of plan {plan_id}: {}", step.description);
        let checkpoint_id = match self
            .checkpoints
            .create_checkpoint(self.store.project_id(), &description)
            .await
        {
            Ok(id) => id,
            Err(e) => return self.fail_step(plan_id, step_id, e.to_string()),
        };
        self.store.dispatch(Event::AgentPlanStepCheckpointed {
            plan_id: plan_id.clone(),
            step_id: step_id.clone(),
            checkpoint_id,
        });

        let result = match step.action_type {
            ActionType::ReadFile => self.actions.read_file(&step.target).await,
            ActionType::PatchFile => self
                .actions
                .patch_file(&step.target, &step.parameters)
                .await
                .map(|outcome| outcome.fixed_content),
            ActionType::RunCommand => self.actions.run_command(&step.target, &step.parameters).await,
        };

        match result {
            Ok(result) => {
                self.store.dispatch(Event::AgentPlanStepCompleted {
                    plan_id: plan_id.clone(),
                    step_id: step_id.clone(),
                    result: result.clone(),
                });
                tracing::info!(plan = %plan_id, step = %step_id, "step completed");
                StepOutcome::Completed { result }
            }
            Err(e) => self.fail_step(plan_id, step_id, e.to_string()),
        }
    }

    fn fail_step(&self, plan_id: &PlanId, step_id: &StepId, error: String) -> StepOutcome {
        self.store.dispatch(Event::AgentPlanStepFailed {
            plan_id: plan_id.clone(),
            step_id: step_id.clone(),
            error: error.clone(),
        });
        tracing::error!(plan = %plan_id, step = %step_id, %error, "step failed");
        self.observe(format!("Step {step_id} of plan {plan_id} failed: {error}"));
        StepOutcome::Failed { error }
    }

    fn observe(&self, message: String) {
        let observation = Observation::new(
            self.ids.next(),
            self.store.clock().epoch_ms(),
            ObservationCategory::Plan,
            message,
            1.0,
        );
        self.store.bus().publish(&Event::AgentObservation { observation });
    }

    fn require_plan(&self, plan_id: &PlanId) -> Result<AgentPlan, EngineError> {
        self.store
            .plan(plan_id)
            .ok_or_else(|| EngineError::PlanNotFound(plan_id.to_string()))
    }
}

fn require_step<'a>(plan: &'a AgentPlan, step_id: &StepId) -> Result<&'a PlanStep, EngineError> {
    plan.step(step_id).ok_or_else(|| EngineError::StepNotFound {
        plan: plan.id.to_string(),
        step: step_id.to_string(),
    })
}

fn check_runnable(plan: &AgentPlan, step: &PlanStep) -> Result<(), String> {
    if !plan.status.allows_execution() {
        return Err(format!("plan is {}", plan.status));
    }
    if step.status != StepStatus::Approved {
        return Err(format!("step is {}", step.status));
    }
    if plan.has_step_in_flight() {
        return Err("another step is executing".to_string());
    }
    match plan.head_step() {
        Some(head) if head.id == step.id => Ok(()),
        Some(head) => Err(format!("step {} must run first", head.id)),
        None => Err("plan has no remaining steps".to_string()),
    }
}

/// Background queue that advances plans when approvals arrive on the bus.
///
/// Bus handlers are synchronous, so approvals are forwarded over a channel
/// to a single task that advances plans one at a time.
pub struct ExecutorRunner {
    tx: mpsc::UnboundedSender<PlanId>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    task: tokio::task::JoinHandle<()>,
}

impl ExecutorRunner {
    /// Spawn the runner task. Must be called inside a tokio runtime.
    pub fn spawn<A, K, C>(executor: PlanExecutor<A, K, C>) -> Self
    where
        A: ActionAdapter,
        K: CheckpointAdapter,
        C: Clock,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<PlanId>();
        let pending = Arc::new(AtomicUsize::new(0));
        let idle = Arc::new(Notify::new());

        let task_pending = Arc::clone(&pending);
        let task_idle = Arc::clone(&idle);
        let task = tokio::spawn(async move {
            while let Some(plan_id) = rx.recv().await {
                if let Err(e) = executor.advance(&plan_id).await {
                    tracing::warn!(plan = %plan_id, error = %e, "advance failed");
                }
                if task_pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                    task_idle.notify_waiters();
                }
            }
        });

        Self {
            tx,
            pending,
            idle,
            task,
        }
    }

    /// Advance plans whenever a plan or one of its steps is approved
    pub fn attach(&self, bus: &EventBus) -> Vec<Subscription> {
        [EventKind::AgentPlanApproved, EventKind::AgentPlanStepApproved]
            .into_iter()
            .map(|kind| {
                let tx = self.tx.clone();
                let pending = Arc::clone(&self.pending);
                bus.subscribe(kind, "plan-executor", move |event| {
                    if let Event::AgentPlanApproved { plan_id }
                    | Event::AgentPlanStepApproved { plan_id, .. } = event
                    {
                        enqueue(&tx, &pending, plan_id.clone());
                    }
                    Ok(())
                })
            })
            .collect()
    }

    pub fn enqueue(&self, plan_id: PlanId) {
        enqueue(&self.tx, &self.pending, plan_id);
    }

    /// Wait until every queued advance has finished
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending.load(Ordering::SeqCst) == 0 || self.task.is_finished() {
                return;
            }
            notified.await;
        }
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for ExecutorRunner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn enqueue(tx: &mpsc::UnboundedSender<PlanId>, pending: &AtomicUsize, plan_id: PlanId) {
    pending.fetch_add(1, Ordering::SeqCst);
    if tx.send(plan_id).is_err() {
        pending.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "plan_executor_tests.rs"]
mod tests;
