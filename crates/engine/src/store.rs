// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace state store: the single mutator of a project's [`WorkspaceState`]

use crate::bus::EventBus;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use wid_core::{
    AgentPlan, Clock, Event, IdGen, IntentScores, Observation, ObservationCategory, PlanId,
    ProjectId, SequentialIdGen,
};
use wid_storage::WorkspaceState;

/// Owns a project's state. `dispatch` is the only way to change it.
#[derive(Clone)]
pub struct WorkspaceStore<C: Clock> {
    project_id: ProjectId,
    state: Arc<Mutex<WorkspaceState>>,
    // Serializes reduce+publish so subscribers see dispatch order
    order: Arc<ReentrantMutex<()>>,
    bus: EventBus,
    clock: C,
    ids: SequentialIdGen,
}

impl<C: Clock> WorkspaceStore<C> {
    pub fn new(project_id: ProjectId, bus: EventBus, clock: C, ids: SequentialIdGen) -> Self {
        Self {
            state: Arc::new(Mutex::new(WorkspaceState::new(project_id.clone()))),
            project_id,
            order: Arc::new(ReentrantMutex::new(())),
            bus,
            clock,
            ids,
        }
    }

    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Reduce `event` into the state, then publish the raw event to the bus.
    ///
    /// The state lock is released before publishing, so subscribers may read
    /// the post-reduction state through a [`StateView`].
    pub fn dispatch(&self, event: Event) {
        let _order = self.order.lock();
        let now_ms = self.clock.epoch_ms();
        let reduction = self.state.lock().apply_event(&event, now_ms);

        tracing::debug!(project = %self.project_id, event = %event.log_summary(), "dispatch");
        if let Some((from, to)) = reduction.intent_shift {
            tracing::debug!(project = %self.project_id, %from, %to, "dominant intent changed");
        }

        self.bus.publish(&event);

        if reduction.announce_presence {
            let observation = Observation::new(
                self.ids.next(),
                now_ms,
                ObservationCategory::Presence,
                format!("Developer activity detected in project {}", self.project_id),
                1.0,
            );
            self.bus.publish(&Event::AgentObservation { observation });
        }
    }

    /// Immutable snapshot of the current state
    pub fn state(&self) -> WorkspaceState {
        self.state.lock().clone()
    }

    pub fn plan(&self, plan_id: &PlanId) -> Option<AgentPlan> {
        self.state.lock().plan(plan_id).cloned()
    }

    /// Read-only handle for subscribers that must not dispatch
    pub fn view(&self) -> StateView {
        StateView {
            state: Arc::clone(&self.state),
        }
    }
}

/// Read-only access to a project's state.
#[derive(Clone)]
pub struct StateView {
    state: Arc<Mutex<WorkspaceState>>,
}

impl StateView {
    pub fn intent(&self) -> IntentScores {
        self.state.lock().intent.clone()
    }

    pub fn read<T>(&self, f: impl FnOnce(&WorkspaceState) -> T) -> T {
        f(&self.state.lock())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
