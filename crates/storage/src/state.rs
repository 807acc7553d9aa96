// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace state derived from events

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use wid_core::{
    AgentPlan, BuildError, BuildStatus, CursorPosition, Event, IntentKind, IntentScores, PlanId,
    PlanStatus, ProjectId, RuntimeStatus, StepStatus,
};

/// Multiplier applied to every intent score on each decay tick.
pub const INTENT_DECAY_FACTOR: f64 = 0.98;
/// Saves of the same path closer together than this count as a rapid re-save.
pub const RAPID_RESAVE_WINDOW_MS: u64 = 5_000;
/// A cursor held still in one file for longer than this marks an idle read.
pub const CURSOR_IDLE_THRESHOLD_MS: u64 = 10_000;
/// Completed or cancelled plans kept for queries and rollback; older ones are dropped.
pub const FINISHED_PLAN_CAP: usize = 20;

/// Tracked state of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    pub content: String,
    /// Content as of the last save (or first sighting)
    pub saved_content: String,
    /// True iff `content` differs from `saved_content`
    pub dirty: bool,
    pub last_modified_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorState {
    pub active_file: Option<String>,
    pub cursor: CursorPosition,
    pub last_activity_ms: u64,
    /// When the cursor last changed position
    #[serde(default)]
    pub cursor_moved_at_ms: u64,
    /// Whether the learning bump already fired for the current idle period
    #[serde(default)]
    pub idle_bump_fired: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub status: RuntimeStatus,
    pub container_id: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    pub status: BuildStatus,
    pub errors: Vec<BuildError>,
}

/// Heuristic signals that move the intent distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSignal {
    /// A previously unseen path appeared
    NewFilesCreated,
    /// The same path was saved twice within [`RAPID_RESAVE_WINDOW_MS`]
    RapidResave,
    BuildFailure,
    RuntimeCrash,
    /// Cursor stationary past [`CURSOR_IDLE_THRESHOLD_MS`]
    IdleCursor,
}

impl IntentSignal {
    pub fn intent(&self) -> IntentKind {
        match self {
            IntentSignal::NewFilesCreated => IntentKind::Generating,
            IntentSignal::RapidResave => IntentKind::Refactoring,
            IntentSignal::BuildFailure | IntentSignal::RuntimeCrash => IntentKind::Debugging,
            IntentSignal::IdleCursor => IntentKind::Learning,
        }
    }

    /// Pre-normalization score bump.
    pub fn weight(&self) -> f64 {
        match self {
            IntentSignal::NewFilesCreated => 0.3,
            IntentSignal::RapidResave => 0.1,
            IntentSignal::BuildFailure => 0.2,
            IntentSignal::RuntimeCrash => 0.3,
            IntentSignal::IdleCursor => 0.1,
        }
    }
}

/// What a single reduction derived, beyond the state change itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reduction {
    pub signals: Vec<IntentSignal>,
    /// First file or focus activity for this instance
    pub announce_presence: bool,
    /// Set when the dominant intent changed
    pub intent_shift: Option<(IntentKind, IntentKind)>,
}

/// Canonical state of one project's workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub project_id: ProjectId,
    pub files: HashMap<String, FileState>,
    pub editor: EditorState,
    pub runtime: RuntimeState,
    pub build: BuildState,
    pub intent: IntentScores,
    #[serde(default)]
    pub plans: HashMap<PlanId, AgentPlan>,
    /// Finished plans, oldest first
    #[serde(default)]
    pub finished_plans: VecDeque<PlanId>,
    #[serde(default)]
    pub presence_announced: bool,
}

impl WorkspaceState {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            files: HashMap::new(),
            editor: EditorState::default(),
            runtime: RuntimeState::default(),
            build: BuildState::default(),
            intent: IntentScores::uniform(),
            plans: HashMap::new(),
            finished_plans: VecDeque::new(),
            presence_announced: false,
        }
    }

    pub fn plan(&self, id: &PlanId) -> Option<&AgentPlan> {
        self.plans.get(id)
    }

    /// Remember a plan as finished, dropping the oldest finished plans past
    /// [`FINISHED_PLAN_CAP`].
    fn retire_plan(&mut self, plan_id: &PlanId) {
        if self.finished_plans.contains(plan_id) {
            return;
        }
        self.finished_plans.push_back(plan_id.clone());
        while self.finished_plans.len() > FINISHED_PLAN_CAP {
            if let Some(oldest) = self.finished_plans.pop_front() {
                self.plans.remove(&oldest);
            }
        }
    }

    /// Apply an event: reduce the workspace fields, then run the intent
    /// update pass over whatever signals the reduction produced.
    ///
    /// Pure given `(self, event, now_ms)`; performs no I/O.
    pub fn apply_event(&mut self, event: &Event, now_ms: u64) -> Reduction {
        let mut reduction = Reduction::default();
        let before = self.intent.dominant();

        self.reduce(event, now_ms, &mut reduction);

        for signal in &reduction.signals {
            self.intent.bump(signal.intent(), signal.weight());
        }
        if matches!(event, Event::IntentDecay) {
            self.intent.decay(INTENT_DECAY_FACTOR);
        }
        self.intent.check_invariants();

        let after = self.intent.dominant();
        if before != after {
            reduction.intent_shift = Some((before, after));
        }
        reduction
    }

    fn reduce(&mut self, event: &Event, now_ms: u64, out: &mut Reduction) {
        match event {
            Event::FileChanged { path, content } => {
                self.note_presence(out);
                match self.files.get_mut(path) {
                    Some(file) => {
                        file.content = content.clone();
                        file.dirty = file.content != file.saved_content;
                        file.last_modified_ms = now_ms;
                    }
                    None => {
                        self.files.insert(
                            path.clone(),
                            FileState {
                                content: content.clone(),
                                saved_content: content.clone(),
                                dirty: false,
                                last_modified_ms: now_ms,
                                last_saved_ms: None,
                            },
                        );
                        out.signals.push(IntentSignal::NewFilesCreated);
                    }
                }
            }

            Event::FileSaved { path, content } => {
                let file = self.files.entry(path.clone()).or_insert_with(|| FileState {
                    content: String::new(),
                    saved_content: String::new(),
                    dirty: false,
                    last_modified_ms: now_ms,
                    last_saved_ms: None,
                });
                if let Some(content) = content {
                    file.content = content.clone();
                }
                file.saved_content = file.content.clone();
                file.dirty = false;
                if let Some(prev) = file.last_saved_ms {
                    if now_ms.saturating_sub(prev) < RAPID_RESAVE_WINDOW_MS {
                        out.signals.push(IntentSignal::RapidResave);
                    }
                }
                file.last_saved_ms = Some(now_ms);
            }

            Event::FileDeleted { path } => {
                self.files.remove(path);
                if self.editor.active_file.as_deref() == Some(path.as_str()) {
                    self.editor.active_file = None;
                }
            }

            Event::EditorFocusChanged { path } => {
                self.note_presence(out);
                if self.editor.active_file.as_deref() != Some(path.as_str()) {
                    self.editor.active_file = Some(path.clone());
                    self.editor.cursor_moved_at_ms = now_ms;
                    self.editor.idle_bump_fired = false;
                }
                self.editor.last_activity_ms = now_ms;
            }

            Event::EditorCursorMoved { path, line, column } => {
                let position = CursorPosition {
                    line: *line,
                    column: *column,
                };
                let same_file = self.editor.active_file.as_deref() == Some(path.as_str());
                if same_file && self.editor.cursor == position {
                    let idle_ms = now_ms.saturating_sub(self.editor.cursor_moved_at_ms);
                    if idle_ms > CURSOR_IDLE_THRESHOLD_MS && !self.editor.idle_bump_fired {
                        self.editor.idle_bump_fired = true;
                        out.signals.push(IntentSignal::IdleCursor);
                    }
                } else {
                    self.editor.active_file = Some(path.clone());
                    self.editor.cursor = position;
                    self.editor.cursor_moved_at_ms = now_ms;
                    self.editor.idle_bump_fired = false;
                }
                self.editor.last_activity_ms = now_ms;
            }

            Event::BuildStarted => {
                self.build.status = BuildStatus::Building;
            }

            Event::BuildSucceeded => {
                self.build.status = BuildStatus::Success;
                self.build.errors.clear();
            }

            Event::BuildFailed { errors } => {
                self.build.status = BuildStatus::Failed;
                self.build.errors = errors.clone();
                out.signals.push(IntentSignal::BuildFailure);
            }

            Event::RuntimeStarted { container_id, port } => {
                self.runtime.status = RuntimeStatus::Running;
                self.runtime.container_id = container_id.clone();
                self.runtime.port = *port;
            }

            Event::RuntimeStopped => {
                self.runtime = RuntimeState::default();
            }

            Event::RuntimeCrashed { .. } => {
                self.runtime.status = RuntimeStatus::Crashed;
                out.signals.push(IntentSignal::RuntimeCrash);
            }

            // Handled by the intent pass in apply_event
            Event::IntentDecay => {}

            // === Plan lifecycle ===
            Event::AgentPlanProposed { plan } => {
                if self.plans.contains_key(&plan.id) {
                    tracing::warn!(plan = %plan.id, "plan already registered, ignoring");
                    return;
                }
                // Progress is earned through the executor, never carried in
                let mut plan = plan.clone();
                plan.status = PlanStatus::Proposed;
                for step in &mut plan.steps {
                    step.status = StepStatus::Pending;
                    step.checkpoint_id = None;
                    step.result = None;
                    step.error = None;
                }
                self.plans.insert(plan.id.clone(), plan);
            }

            Event::AgentPlanApproved { plan_id } => {
                if let Some(plan) = self.plans.get_mut(plan_id) {
                    if plan.status == PlanStatus::Proposed {
                        plan.status = PlanStatus::Approved;
                    }
                }
            }

            Event::AgentPlanStepApproved { plan_id, step_id } => {
                let Some(plan) = self.plans.get_mut(plan_id) else {
                    return;
                };
                if plan.status.is_terminal() {
                    return;
                }
                if let Some(step) = plan.step_mut(step_id) {
                    if matches!(
                        step.status,
                        StepStatus::Pending | StepStatus::Failed | StepStatus::RolledBack
                    ) {
                        step.status = StepStatus::Approved;
                        step.error = None;
                    }
                }
            }

            Event::AgentPlanStepStarted { plan_id, step_id } => {
                let Some(plan) = self.plans.get_mut(plan_id) else {
                    return;
                };
                let startable = plan.status.allows_execution()
                    && !plan.has_step_in_flight()
                    && plan.step(step_id).map(|s| s.status) == Some(StepStatus::Approved);
                if !startable {
                    tracing::warn!(plan = %plan_id, step = %step_id, "ignoring step start");
                    return;
                }
                plan.status = PlanStatus::Executing;
                if let Some(step) = plan.step_mut(step_id) {
                    step.status = StepStatus::Executing;
                }
            }

            Event::AgentPlanStepCheckpointed {
                plan_id,
                step_id,
                checkpoint_id,
            } => {
                if let Some(step) = self
                    .plans
                    .get_mut(plan_id)
                    .and_then(|p| p.step_mut(step_id))
                {
                    step.checkpoint_id = Some(checkpoint_id.clone());
                }
            }

            Event::AgentPlanStepCompleted {
                plan_id,
                step_id,
                result,
            } => {
                if let Some(step) = self
                    .plans
                    .get_mut(plan_id)
                    .and_then(|p| p.step_mut(step_id))
                {
                    if step.status == StepStatus::Executing {
                        step.status = StepStatus::Completed;
                        step.result = Some(result.clone());
                        step.error = None;
                    }
                }
            }

            Event::AgentPlanStepFailed {
                plan_id,
                step_id,
                error,
            } => {
                if let Some(step) = self
                    .plans
                    .get_mut(plan_id)
                    .and_then(|p| p.step_mut(step_id))
                {
                    if step.status == StepStatus::Executing {
                        step.status = StepStatus::Failed;
                        step.error = Some(error.clone());
                    }
                }
            }

            Event::AgentPlanStepRolledBack { plan_id, step_id } => {
                if let Some(step) = self
                    .plans
                    .get_mut(plan_id)
                    .and_then(|p| p.step_mut(step_id))
                {
                    step.status = StepStatus::RolledBack;
                }
            }

            Event::AgentPlanCompleted { plan_id } => {
                if let Some(plan) = self.plans.get_mut(plan_id) {
                    if plan.all_completed() && plan.status.allows_execution() {
                        plan.status = PlanStatus::Completed;
                        self.retire_plan(plan_id);
                    }
                }
            }

            Event::AgentPlanCancelled { plan_id } => {
                if let Some(plan) = self.plans.get_mut(plan_id) {
                    plan.status = PlanStatus::Cancelled;
                    self.retire_plan(plan_id);
                }
            }

            // Advisory output, not state
            Event::AgentObservation { .. }
            | Event::AgentSuggestion { .. }
            | Event::ConfidenceUpdated { .. }
            | Event::Custom => {}
        }
    }

    fn note_presence(&mut self, out: &mut Reduction) {
        if !self.presence_announced {
            self.presence_announced = true;
            out.announce_presence = true;
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
