// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project runtimes and the registry that owns them

use crate::bus::{EventBus, Subscription};
use crate::confidence::ConfidenceEngine;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::observer::Observer;
use crate::plan_executor::{ExecutorRunner, PlanExecutor, RollbackReport};
use crate::scheduler::Scheduler;
use crate::store::WorkspaceStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use wid_adapters::{ActionAdapter, CheckpointAdapter};
use wid_core::{
    AgentPlan, CheckpointId, Clock, ConfidenceReport, Event, Observation, PlanId, ProjectId,
    SequentialIdGen, StepId, TimerId,
};
use wid_storage::WorkspaceState;

/// External collaborators for one project runtime
#[derive(Clone)]
pub struct RuntimeDeps<A, K> {
    pub actions: A,
    pub checkpoints: K,
}

/// Builds a project's collaborators the first time the project is used
pub type DepsFactory<A, K> =
    Arc<dyn Fn(&ProjectId) -> Result<RuntimeDeps<A, K>, EngineError> + Send + Sync>;

/// One project's wired components: store, confidence engine, observer and
/// plan executor on a private bus, plus the project's timers.
pub struct ProjectRuntime<A, K, C: Clock> {
    project_id: ProjectId,
    store: WorkspaceStore<C>,
    confidence: ConfidenceEngine<C>,
    observer: Observer<C>,
    executor: PlanExecutor<A, K, C>,
    runner: ExecutorRunner,
    scheduler: Mutex<Scheduler>,
    subscriptions: Mutex<Vec<Subscription>>,
    config: EngineConfig,
    torn_down: AtomicBool,
}

impl<A, K, C> ProjectRuntime<A, K, C>
where
    A: ActionAdapter,
    K: CheckpointAdapter,
    C: Clock,
{
    /// Build and start a runtime. Must be called inside a tokio runtime.
    pub fn new(project_id: ProjectId, deps: RuntimeDeps<A, K>, clock: C, config: EngineConfig) -> Self {
        let bus = EventBus::new();
        let ids = SequentialIdGen::new(format!("obs-{project_id}"));
        let store = WorkspaceStore::new(project_id.clone(), bus.clone(), clock.clone(), ids.clone());
        let confidence = ConfidenceEngine::new(project_id.clone(), bus.clone(), clock.clone());
        let observer = Observer::new(
            project_id.clone(),
            store.view(),
            confidence.clone(),
            bus.clone(),
            clock.clone(),
            ids.clone(),
            config.clone(),
        );
        let executor = PlanExecutor::new(store.clone(), deps.actions, deps.checkpoints, ids);
        let runner = ExecutorRunner::spawn(executor.clone());

        // Confidence first so the observer reads a report that includes the event
        let mut subscriptions = confidence.attach();
        subscriptions.extend(observer.attach());
        subscriptions.extend(runner.attach(&bus));

        let mut scheduler = Scheduler::new();
        let now = clock.now();
        scheduler.set_periodic(TimerId::intent_decay(&project_id), config.decay_interval, now);
        scheduler.set_periodic(TimerId::intent_poll(&project_id), config.intent_poll_interval, now);

        tracing::info!(project = %project_id, "project runtime started");
        Self {
            project_id,
            store,
            confidence,
            observer,
            executor,
            runner,
            scheduler: Mutex::new(scheduler),
            subscriptions: Mutex::new(subscriptions),
            config,
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn store(&self) -> &WorkspaceStore<C> {
        &self.store
    }

    pub fn executor(&self) -> &PlanExecutor<A, K, C> {
        &self.executor
    }

    pub fn dispatch(&self, event: Event) {
        if self.is_torn_down() {
            tracing::warn!(project = %self.project_id, event = event.name(), "dropping event after teardown");
            return;
        }
        self.store.dispatch(event);
    }

    /// Dispatch an event received from a client. Only workspace activity and
    /// approvals are accepted; plan progress, observations, confidence and
    /// decay are produced by the engine itself.
    pub fn ingest(&self, event: Event) -> Result<(), EngineError> {
        if !event.is_client_ingress() {
            tracing::warn!(project = %self.project_id, event = event.name(), "refusing client event");
            return Err(EngineError::EventNotAccepted(event.name()));
        }
        self.dispatch(event);
        Ok(())
    }

    pub fn state(&self) -> WorkspaceState {
        self.store.state()
    }

    pub fn confidence_report(&self) -> ConfidenceReport {
        self.confidence.current_report()
    }

    /// Recompute and publish the confidence report; see [`ConfidenceEngine::check_recovery`]
    pub fn check_recovery(&self) -> Option<u64> {
        self.confidence.check_recovery()
    }

    pub fn observations(&self, limit: usize) -> Vec<Observation> {
        self.observer.get_observations(limit)
    }

    pub fn plan(&self, plan_id: &PlanId) -> Option<AgentPlan> {
        self.store.plan(plan_id)
    }

    pub fn register_plan(&self, plan: AgentPlan) -> Result<(), EngineError> {
        self.executor.register_plan(plan)
    }

    pub async fn rollback_plan(&self, plan_id: &PlanId) -> Result<RollbackReport, EngineError> {
        self.executor.rollback_plan(plan_id).await
    }

    pub async fn rollback_step(
        &self,
        plan_id: &PlanId,
        step_id: &StepId,
    ) -> Result<CheckpointId, EngineError> {
        self.executor.rollback_step(plan_id, step_id).await
    }

    /// Delete every checkpoint held for this project
    pub async fn discard_checkpoints(&self) -> Result<usize, EngineError> {
        self.executor.discard_checkpoints().await
    }

    /// Wait for queued plan advances to finish
    pub async fn wait_idle(&self) {
        self.runner.wait_idle().await;
    }

    /// Fire due timers. Decay goes through dispatch like any other event.
    /// Both timers repeat on their own period; see [`Scheduler::set_periodic`].
    pub fn tick(&self, now: Instant) {
        let fired = self.scheduler.lock().fired_timers(now);
        for timer in fired {
            if timer.is_intent_decay() {
                self.store.dispatch(Event::IntentDecay);
            } else if timer.is_intent_poll() {
                self.observer.poll_intent();
            } else {
                tracing::debug!(project = %self.project_id, timer = timer.as_str(), "unknown timer");
            }
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.lock().next_deadline()
    }

    pub fn has_timers(&self) -> bool {
        self.scheduler.lock().has_timers()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Stop timers, detach every subscription and stop the plan runner.
    /// Safe to call more than once.
    pub fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.scheduler.lock().cancel_all();
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        drop(subscriptions);
        self.runner.stop();
        tracing::info!(project = %self.project_id, "project runtime stopped");
    }
}

impl<A, K, C: Clock> Drop for ProjectRuntime<A, K, C> {
    fn drop(&mut self) {
        if !self.torn_down.swap(true, Ordering::SeqCst) {
            self.scheduler.get_mut().cancel_all();
            self.subscriptions.get_mut().clear();
            self.runner.stop();
        }
    }
}

/// Exactly one live runtime per project, created on first use
pub struct ProjectRegistry<A, K, C: Clock> {
    projects: Mutex<HashMap<ProjectId, Arc<ProjectRuntime<A, K, C>>>>,
    deps: DepsFactory<A, K>,
    clock: C,
    config: EngineConfig,
}

impl<A, K, C> ProjectRegistry<A, K, C>
where
    A: ActionAdapter,
    K: CheckpointAdapter,
    C: Clock,
{
    /// Every project uses the same collaborators
    pub fn new(deps: RuntimeDeps<A, K>, clock: C, config: EngineConfig) -> Self {
        Self::with_deps_factory(move |_: &ProjectId| Ok(deps.clone()), clock, config)
    }

    /// Collaborators are built per project, e.g. rooted at its own directory
    pub fn with_deps_factory<F>(factory: F, clock: C, config: EngineConfig) -> Self
    where
        F: Fn(&ProjectId) -> Result<RuntimeDeps<A, K>, EngineError> + Send + Sync + 'static,
    {
        Self {
            projects: Mutex::new(HashMap::new()),
            deps: Arc::new(factory),
            clock,
            config,
        }
    }

    pub fn get_or_create(
        &self,
        project_id: &ProjectId,
    ) -> Result<Arc<ProjectRuntime<A, K, C>>, EngineError> {
        let mut projects = self.projects.lock();
        if let Some(runtime) = projects.get(project_id) {
            return Ok(Arc::clone(runtime));
        }
        let deps = (self.deps)(project_id)?;
        let runtime = Arc::new(ProjectRuntime::new(
            project_id.clone(),
            deps,
            self.clock.clone(),
            self.config.clone(),
        ));
        projects.insert(project_id.clone(), Arc::clone(&runtime));
        Ok(runtime)
    }

    pub fn get(&self, project_id: &ProjectId) -> Option<Arc<ProjectRuntime<A, K, C>>> {
        self.projects.lock().get(project_id).cloned()
    }

    pub fn require(&self, project_id: &ProjectId) -> Result<Arc<ProjectRuntime<A, K, C>>, EngineError> {
        self.get(project_id)
            .ok_or_else(|| EngineError::ProjectNotFound(project_id.to_string()))
    }

    /// Tear down and forget a project, deleting its checkpoints.
    /// Returns false if it was not live.
    pub async fn destroy(&self, project_id: &ProjectId) -> bool {
        let removed = self.projects.lock().remove(project_id);
        let Some(runtime) = removed else {
            return false;
        };
        runtime.teardown();
        if let Err(e) = runtime.discard_checkpoints().await {
            tracing::warn!(project = %project_id, error = %e, "failed to discard checkpoints");
        }
        true
    }

    /// Fire due timers for every project
    pub fn tick(&self, now: Instant) {
        for runtime in self.runtimes() {
            runtime.tick(now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.runtimes().iter().filter_map(|r| r.next_deadline()).min()
    }

    pub fn project_ids(&self) -> Vec<ProjectId> {
        let mut ids: Vec<ProjectId> = self.projects.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Tear down every project
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.projects.lock().drain().map(|(_, r)| r).collect();
        for runtime in drained {
            runtime.teardown();
        }
    }

    // Snapshot so timers and handlers run without the registry lock
    fn runtimes(&self) -> Vec<Arc<ProjectRuntime<A, K, C>>> {
        self.projects.lock().values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
