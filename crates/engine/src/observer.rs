// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observer: reactive pattern detection over workspace events.
//!
//! Reads state through a [`StateView`] and publishes advisory events
//! straight to the bus. It never dispatches, touches the filesystem, or
//! runs actions.

use crate::bus::{EventBus, Subscription};
use crate::confidence::ConfidenceEngine;
use crate::config::EngineConfig;
use crate::store::StateView;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use wid_core::{
    BuildError, Clock, Event, EventKind, IdGen, IntentKind, Observation, ObservationCategory,
    ProjectId, SequentialIdGen, Suggestion,
};

/// Window for repeated build failures and crash bursts
pub const FAILURE_BURST_WINDOW_MS: u64 = 60 * 1000;
/// Window over which consecutive build failures are counted
pub const CONSECUTIVE_FAILURE_WINDOW_MS: u64 = 10 * 60 * 1000;
/// Window for repeated saves of one path
pub const RESAVE_WINDOW_MS: u64 = 10 * 1000;
/// Consecutive failures that trigger the investigate suggestion
pub const SUGGESTION_THRESHOLD: usize = 2;

const BUILD_FAILURE_CONFIDENCE: f64 = 0.8;
const RUNTIME_BURST_CONFIDENCE: f64 = 0.7;
const STABILITY_CONFIDENCE: f64 = 0.6;
const RECOVERY_CONFIDENCE: f64 = 0.7;

const DEPENDENCY_MARKERS: &[&str] = &["module", "import", "dependency", "cannot find", "resolve"];

#[derive(Debug, Clone)]
enum ErrorRecord {
    Build { at_ms: u64, messages: Vec<String> },
    Crash { at_ms: u64 },
}

impl ErrorRecord {
    fn at_ms(&self) -> u64 {
        match self {
            ErrorRecord::Build { at_ms, .. } | ErrorRecord::Crash { at_ms } => *at_ms,
        }
    }
}

struct ObserverState {
    errors: VecDeque<ErrorRecord>,
    saves: HashMap<String, VecDeque<u64>>,
    /// Failure timestamps since the last successful build
    consecutive_failures: VecDeque<u64>,
    suggestion_latched: bool,
    last_dominant: IntentKind,
    feed: VecDeque<Observation>,
}

/// Per-project observer
#[derive(Clone)]
pub struct Observer<C: Clock> {
    project_id: ProjectId,
    inner: Arc<Mutex<ObserverState>>,
    view: StateView,
    confidence: ConfidenceEngine<C>,
    bus: EventBus,
    clock: C,
    ids: SequentialIdGen,
    config: EngineConfig,
}

/// Advisory output computed under the state lock, published after release
enum Emit {
    Observation(Observation),
    Suggestion(Suggestion),
}

impl<C: Clock> Observer<C> {
    pub fn new(
        project_id: ProjectId,
        view: StateView,
        confidence: ConfidenceEngine<C>,
        bus: EventBus,
        clock: C,
        ids: SequentialIdGen,
        config: EngineConfig,
    ) -> Self {
        let last_dominant = view.intent().dominant();
        Self {
            project_id,
            inner: Arc::new(Mutex::new(ObserverState {
                errors: VecDeque::new(),
                saves: HashMap::new(),
                consecutive_failures: VecDeque::new(),
                suggestion_latched: false,
                last_dominant,
                feed: VecDeque::new(),
            })),
            view,
            confidence,
            bus,
            clock,
            ids,
            config,
        }
    }

    /// Subscribe to the events this observer reacts to
    pub fn attach(&self) -> Vec<Subscription> {
        let kinds = [
            EventKind::BuildFailed,
            EventKind::RuntimeCrashed,
            EventKind::FileSaved,
            EventKind::EditorFocusChanged,
            EventKind::BuildSucceeded,
            EventKind::AgentObservation,
        ];
        kinds
            .into_iter()
            .map(|kind| {
                let this = self.clone();
                self.bus.subscribe(kind, "observer", move |event| {
                    this.handle(event);
                    Ok(())
                })
            })
            .collect()
    }

    pub fn handle(&self, event: &Event) {
        let now = self.clock.epoch_ms();
        let emits = match event {
            Event::BuildFailed { errors } => self.on_build_failed(errors, now),
            Event::RuntimeCrashed { .. } => self.on_runtime_crashed(now),
            Event::FileSaved { path, .. } => self.on_file_saved(path, now),
            Event::EditorFocusChanged { .. } => self.check_intent(now),
            Event::BuildSucceeded => self.on_build_succeeded(now),
            Event::AgentObservation { observation } => {
                self.record_external(observation);
                Vec::new()
            }
            _ => Vec::new(),
        };
        self.publish(emits);
    }

    /// Compare the dominant intent with the last one seen and report a shift.
    /// Driven by the intent-poll timer and by focus changes.
    pub fn poll_intent(&self) {
        let emits = self.check_intent(self.clock.epoch_ms());
        self.publish(emits);
    }

    /// The most recent `limit` observations, oldest first
    pub fn get_observations(&self, limit: usize) -> Vec<Observation> {
        let inner = self.inner.lock();
        let skip = inner.feed.len().saturating_sub(limit);
        inner.feed.iter().skip(skip).cloned().collect()
    }

    fn on_build_failed(&self, errors: &[BuildError], now: u64) -> Vec<Emit> {
        let mut inner = self.inner.lock();
        let mut out = Vec::new();

        self.push_error(
            &mut inner,
            ErrorRecord::Build {
                at_ms: now,
                messages: errors.iter().map(|e| e.message.clone()).collect(),
            },
        );

        let recent: Vec<&Vec<String>> = inner
            .errors
            .iter()
            .filter(|e| now.saturating_sub(e.at_ms()) <= FAILURE_BURST_WINDOW_MS)
            .filter_map(|e| match e {
                ErrorRecord::Build { messages, .. } => Some(messages),
                ErrorRecord::Crash { .. } => None,
            })
            .collect();
        if recent.len() >= 2 {
            let cause = if recent.iter().flat_map(|m| m.iter()).any(|m| is_dependency_error(m)) {
                "dependency"
            } else {
                "syntax"
            };
            out.push(Emit::Observation(Observation::new(
                self.ids.next(),
                now,
                ObservationCategory::BuildFailure,
                format!(
                    "Build failed {} times in the last minute; likely a {cause} issue",
                    recent.len()
                ),
                BUILD_FAILURE_CONFIDENCE,
            )));
        }

        inner.consecutive_failures.push_back(now);
        while inner
            .consecutive_failures
            .front()
            .is_some_and(|&t| now.saturating_sub(t) > CONSECUTIVE_FAILURE_WINDOW_MS)
        {
            inner.consecutive_failures.pop_front();
        }
        if inner.consecutive_failures.len() == SUGGESTION_THRESHOLD && !inner.suggestion_latched {
            inner.suggestion_latched = true;
            let risk_level = Some(self.confidence.current_report().risk_level);
            out.push(Emit::Suggestion(Suggestion {
                id: self.ids.next().into(),
                timestamp_ms: now,
                message: format!(
                    "The build has failed {SUGGESTION_THRESHOLD} times in a row. Investigate the errors?"
                ),
                action: "investigate_build".to_string(),
                risk_level,
            }));
        }
        out
    }

    fn on_runtime_crashed(&self, now: u64) -> Vec<Emit> {
        let mut inner = self.inner.lock();
        self.push_error(&mut inner, ErrorRecord::Crash { at_ms: now });

        let crashes = inner
            .errors
            .iter()
            .filter(|e| matches!(e, ErrorRecord::Crash { .. }))
            .filter(|e| now.saturating_sub(e.at_ms()) <= FAILURE_BURST_WINDOW_MS)
            .count();
        if crashes < 2 {
            return Vec::new();
        }
        vec![Emit::Observation(Observation::new(
            self.ids.next(),
            now,
            ObservationCategory::Runtime,
            format!("Runtime crashed {crashes} times in the last minute"),
            RUNTIME_BURST_CONFIDENCE,
        ))]
    }

    fn on_file_saved(&self, path: &str, now: u64) -> Vec<Emit> {
        let cap = self.config.history_cap;
        let mut inner = self.inner.lock();
        // Only saves inside the window count; paths that went quiet are dropped
        inner.saves.retain(|_, times| {
            while times
                .front()
                .is_some_and(|&t| now.saturating_sub(t) > RESAVE_WINDOW_MS)
            {
                times.pop_front();
            }
            !times.is_empty()
        });
        let saves = inner.saves.entry(path.to_string()).or_default();
        saves.push_back(now);
        while saves.len() > cap {
            saves.pop_front();
        }
        let recent = saves.len();
        if recent < 2 {
            return Vec::new();
        }
        vec![Emit::Observation(Observation::new(
            self.ids.next(),
            now,
            ObservationCategory::Stability,
            format!("{path} saved {recent} times in 10 seconds"),
            STABILITY_CONFIDENCE,
        ))]
    }

    fn on_build_succeeded(&self, now: u64) -> Vec<Emit> {
        let mut inner = self.inner.lock();
        let failures = inner.consecutive_failures.len();
        inner.consecutive_failures.clear();
        inner.suggestion_latched = false;
        if failures == 0 {
            return Vec::new();
        }
        vec![Emit::Observation(Observation::new(
            self.ids.next(),
            now,
            ObservationCategory::Recovery,
            format!("Build recovered after {failures} consecutive failure(s)"),
            RECOVERY_CONFIDENCE,
        ))]
    }

    fn check_intent(&self, now: u64) -> Vec<Emit> {
        let intent = self.view.intent();
        let dominant = intent.dominant();
        let mut inner = self.inner.lock();
        if dominant == inner.last_dominant {
            return Vec::new();
        }
        let previous = std::mem::replace(&mut inner.last_dominant, dominant);
        vec![Emit::Observation(Observation::new(
            self.ids.next(),
            now,
            ObservationCategory::IntentShift,
            format!("Intent shifted from {previous} to {dominant}"),
            intent.dominant_score(),
        ))]
    }

    /// Keep observations published by other components in the feed
    fn record_external(&self, observation: &Observation) {
        let mut inner = self.inner.lock();
        if inner.feed.iter().any(|o| o.id == observation.id) {
            return;
        }
        self.push_feed(&mut inner, observation.clone());
    }

    fn push_error(&self, inner: &mut ObserverState, record: ErrorRecord) {
        inner.errors.push_back(record);
        while inner.errors.len() > self.config.history_cap {
            inner.errors.pop_front();
        }
    }

    fn push_feed(&self, inner: &mut ObserverState, observation: Observation) {
        inner.feed.push_back(observation);
        while inner.feed.len() > self.config.observation_cap {
            inner.feed.pop_front();
        }
    }

    fn publish(&self, emits: Vec<Emit>) {
        for emit in emits {
            match emit {
                Emit::Observation(observation) => {
                    self.push_feed(&mut self.inner.lock(), observation.clone());
                    tracing::info!(
                        project = %self.project_id,
                        category = %observation.category,
                        message = %observation.message,
                        "observation"
                    );
                    self.bus.publish(&Event::AgentObservation { observation });
                }
                Emit::Suggestion(suggestion) => {
                    tracing::info!(
                        project = %self.project_id,
                        action = %suggestion.action,
                        "suggestion"
                    );
                    self.bus.publish(&Event::AgentSuggestion { suggestion });
                }
            }
        }
    }
}

fn is_dependency_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    DEPENDENCY_MARKERS.iter().any(|m| lower.contains(m))
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
