// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Confidence and risk scoring over a rolling window of workspace signals.
//!
//! [`compute_report`] is a pure function of `(history, now_ms)`; the
//! [`ConfidenceEngine`] records signals from the bus and publishes a fresh
//! report after every recording.

use crate::bus::{EventBus, Subscription};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use wid_core::{
    Clock, ConfidenceLevel, ConfidenceReport, Event, EventKind, ProjectId, RiskLevel,
    SignalSnapshot,
};

pub const BASE_CONFIDENCE: f64 = 0.8;
/// Builds considered for the success rate
pub const BUILD_SAMPLE_SIZE: usize = 10;
/// Full swing of the build adjustment (±half of this)
pub const BUILD_ADJUSTMENT_RANGE: f64 = 0.3;
pub const RECENT_CRASH_WINDOW_MS: u64 = 5 * 60 * 1000;
pub const RECENT_CRASH_PENALTY: f64 = 0.2;
pub const SIGNAL_WINDOW_MS: u64 = 30 * 60 * 1000;
/// Penalty per full block of [`CRASH_VOLUME_BLOCK`] crashes in the signal window
pub const CRASH_VOLUME_PENALTY: f64 = 0.1;
pub const CRASH_VOLUME_BLOCK: u32 = 10;
pub const CHURN_WINDOW_MS: u64 = 5 * 60 * 1000;
pub const HIGH_CHURN_THRESHOLD: f64 = 0.8;
pub const ELEVATED_CHURN_THRESHOLD: f64 = 0.5;
pub const CHURN_PENALTY: f64 = 0.15;
pub const FAST_RECOVERY_MS: u64 = 60 * 1000;
pub const FAST_RECOVERY_BONUS: f64 = 0.1;
pub const UNRECOVERED_CRASH_MS: u64 = 2 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
struct BuildSample {
    at_ms: u64,
    success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SaveSample {
    at_ms: u64,
    path: String,
}

/// Rolling signal buffer. Entries older than the signal window are pruned
/// on every recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalHistory {
    builds: VecDeque<BuildSample>,
    crashes: VecDeque<u64>,
    saves: VecDeque<SaveSample>,
    recorded: bool,
}

impl SignalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// True until the first signal is recorded
    pub fn is_empty(&self) -> bool {
        !self.recorded
    }

    pub fn record_build(&mut self, success: bool, now_ms: u64) {
        self.builds.push_back(BuildSample {
            at_ms: now_ms,
            success,
        });
        self.touch(now_ms);
    }

    pub fn record_crash(&mut self, now_ms: u64) {
        self.crashes.push_back(now_ms);
        self.touch(now_ms);
    }

    pub fn record_save(&mut self, path: &str, now_ms: u64) {
        self.saves.push_back(SaveSample {
            at_ms: now_ms,
            path: path.to_string(),
        });
        self.touch(now_ms);
    }

    fn touch(&mut self, now_ms: u64) {
        self.recorded = true;
        let horizon = now_ms.saturating_sub(SIGNAL_WINDOW_MS);
        while self.builds.front().is_some_and(|b| b.at_ms < horizon) {
            self.builds.pop_front();
        }
        while self.builds.len() > BUILD_SAMPLE_SIZE {
            self.builds.pop_front();
        }
        while self.crashes.front().is_some_and(|&t| t < horizon) {
            self.crashes.pop_front();
        }
        let churn_horizon = now_ms.saturating_sub(CHURN_WINDOW_MS);
        while self.saves.front().is_some_and(|s| s.at_ms < churn_horizon) {
            self.saves.pop_front();
        }
    }

    /// Recent builds inside the window, oldest first
    fn recent_builds(&self, now_ms: u64) -> Vec<bool> {
        let horizon = now_ms.saturating_sub(SIGNAL_WINDOW_MS);
        let builds: Vec<bool> = self
            .builds
            .iter()
            .filter(|b| b.at_ms >= horizon)
            .map(|b| b.success)
            .collect();
        let skip = builds.len().saturating_sub(BUILD_SAMPLE_SIZE);
        builds[skip..].to_vec()
    }

    pub fn build_success_rate(&self, now_ms: u64) -> Option<f64> {
        let builds = self.recent_builds(now_ms);
        if builds.is_empty() {
            return None;
        }
        let ok = builds.iter().filter(|&&s| s).count();
        Some(ok as f64 / builds.len() as f64)
    }

    pub fn crashes_within(&self, window_ms: u64, now_ms: u64) -> u32 {
        let horizon = now_ms.saturating_sub(window_ms);
        self.crashes.iter().filter(|&&t| t >= horizon).count() as u32
    }

    /// Mean saves per file per minute over the churn window
    pub fn churn_score(&self, now_ms: u64) -> f64 {
        let horizon = now_ms.saturating_sub(CHURN_WINDOW_MS);
        let recent: Vec<&SaveSample> = self.saves.iter().filter(|s| s.at_ms >= horizon).collect();
        if recent.is_empty() {
            return 0.0;
        }
        let files: HashSet<&str> = recent.iter().map(|s| s.path.as_str()).collect();
        let minutes = CHURN_WINDOW_MS as f64 / 60_000.0;
        recent.len() as f64 / files.len() as f64 / minutes
    }

    fn last_crash_ms(&self, now_ms: u64) -> Option<u64> {
        let horizon = now_ms.saturating_sub(SIGNAL_WINDOW_MS);
        self.crashes.back().copied().filter(|&t| t >= horizon)
    }

    /// Time from the most recent crash to the first successful build after it
    pub fn recovery_latency_ms(&self, now_ms: u64) -> Option<u64> {
        let crash = self.last_crash_ms(now_ms)?;
        self.builds
            .iter()
            .find(|b| b.success && b.at_ms >= crash)
            .map(|b| b.at_ms - crash)
    }
}

/// Compute a report from the history as of `now_ms`.
///
/// Returns the neutral report when nothing has been recorded.
pub fn compute_report(history: &SignalHistory, now_ms: u64) -> ConfidenceReport {
    if history.is_empty() {
        return ConfidenceReport::neutral(now_ms);
    }

    let builds = history.recent_builds(now_ms);
    let success_rate = history.build_success_rate(now_ms);
    let recent_crashes = history.crashes_within(RECENT_CRASH_WINDOW_MS, now_ms);
    let window_crashes = history.crashes_within(SIGNAL_WINDOW_MS, now_ms);
    let churn = history.churn_score(now_ms);
    let recovery = history.recovery_latency_ms(now_ms);

    let mut reasons = Vec::new();
    let mut score = BASE_CONFIDENCE;

    if let Some(rate) = success_rate {
        score += (rate - 0.5) * BUILD_ADJUSTMENT_RANGE;
        reasons.push(format!(
            "Build success rate {:.0}% over the last {} builds",
            rate * 100.0,
            builds.len()
        ));
    }
    if recent_crashes > 0 {
        score -= RECENT_CRASH_PENALTY * f64::from(recent_crashes);
        reasons.push(format!(
            "{recent_crashes} crash(es) in the last 5 minutes"
        ));
    }
    let crash_blocks = window_crashes / CRASH_VOLUME_BLOCK;
    if crash_blocks > 0 {
        score -= CRASH_VOLUME_PENALTY * f64::from(crash_blocks);
        reasons.push(format!("{window_crashes} crashes in the last 30 minutes"));
    }
    if churn > HIGH_CHURN_THRESHOLD {
        score -= CHURN_PENALTY;
        reasons.push(format!("High file churn ({churn:.2} saves/file/min)"));
    }
    if let Some(latency) = recovery.filter(|&l| l <= FAST_RECOVERY_MS) {
        score += FAST_RECOVERY_BONUS;
        reasons.push(format!(
            "Fast recovery: build succeeded {}s after crash",
            latency / 1000
        ));
    }
    let score = score.clamp(0.0, 1.0);

    let (risk_level, mut risk_reasons) = evaluate_risk(history, &builds, success_rate, churn, now_ms);
    reasons.append(&mut risk_reasons);

    ConfidenceReport {
        confidence_score: score,
        confidence_level: ConfidenceLevel::from_score(score),
        risk_level,
        signal_snapshot: SignalSnapshot {
            build_success_rate: success_rate,
            crash_count: window_crashes,
            churn_score: churn,
            last_recovery_latency_ms: recovery,
        },
        reasons,
        computed_at_ms: now_ms,
    }
}

/// Rule-based risk, independent of the numeric score. Every triggered rule
/// contributes one reason.
fn evaluate_risk(
    history: &SignalHistory,
    builds: &[bool],
    success_rate: Option<f64>,
    churn: f64,
    now_ms: u64,
) -> (RiskLevel, Vec<String>) {
    let mut level = RiskLevel::Low;
    let mut reasons = Vec::new();
    let mut raise = |to: RiskLevel, reason: String| {
        level = level.max(to);
        reasons.push(reason);
    };

    let recent_crashes = history.crashes_within(RECENT_CRASH_WINDOW_MS, now_ms);
    if recent_crashes >= 2 {
        raise(
            RiskLevel::High,
            format!("{recent_crashes} crashes within 5 minutes"),
        );
    }
    let last_three = &builds[builds.len().saturating_sub(3)..];
    let failed_of_three = last_three.iter().filter(|&&ok| !ok).count();
    if failed_of_three >= 2 {
        raise(
            RiskLevel::High,
            format!("{failed_of_three} of the last 3 builds failed"),
        );
    }
    if churn > HIGH_CHURN_THRESHOLD {
        raise(RiskLevel::High, format!("File churn {churn:.2} above {HIGH_CHURN_THRESHOLD}"));
    }
    if let Some(crash) = history.last_crash_ms(now_ms) {
        let unresolved = history.recovery_latency_ms(now_ms).is_none();
        if unresolved && now_ms.saturating_sub(crash) > UNRECOVERED_CRASH_MS {
            raise(
                RiskLevel::High,
                "Crash unresolved for over 2 minutes".to_string(),
            );
        }
    }

    match success_rate {
        None => raise(RiskLevel::Medium, "No build history yet".to_string()),
        Some(rate) if (0.3..=0.7).contains(&rate) => raise(
            RiskLevel::Medium,
            format!("Mixed build results ({:.0}% success)", rate * 100.0),
        ),
        Some(_) => {}
    }
    if recent_crashes == 1 {
        raise(RiskLevel::Medium, "1 crash in the last 5 minutes".to_string());
    }
    if churn > ELEVATED_CHURN_THRESHOLD && churn <= HIGH_CHURN_THRESHOLD {
        raise(RiskLevel::Medium, format!("Elevated file churn ({churn:.2})"));
    }

    if reasons.is_empty() {
        reasons.push("stable".to_string());
    }
    (level, reasons)
}

/// Per-project confidence engine fed from the bus
#[derive(Clone)]
pub struct ConfidenceEngine<C: Clock> {
    project_id: ProjectId,
    history: Arc<Mutex<SignalHistory>>,
    bus: EventBus,
    clock: C,
}

impl<C: Clock> ConfidenceEngine<C> {
    pub fn new(project_id: ProjectId, bus: EventBus, clock: C) -> Self {
        Self {
            project_id,
            history: Arc::new(Mutex::new(SignalHistory::new())),
            bus,
            clock,
        }
    }

    pub fn record_build(&self, success: bool) -> ConfidenceReport {
        self.record(|h, now| h.record_build(success, now))
    }

    pub fn record_crash(&self) -> ConfidenceReport {
        self.record(|h, now| h.record_crash(now))
    }

    pub fn record_save(&self, path: &str) -> ConfidenceReport {
        self.record(|h, now| h.record_save(path, now))
    }

    /// Recompute and publish. Returns the latency from the last crash to the
    /// build that recovered it, if one has.
    pub fn check_recovery(&self) -> Option<u64> {
        let now = self.clock.epoch_ms();
        let (latency, report) = {
            let history = self.history.lock();
            (history.recovery_latency_ms(now), compute_report(&history, now))
        };
        if let Some(latency_ms) = latency {
            tracing::debug!(project = %self.project_id, latency_ms, "recovered from crash");
        }
        self.publish(report);
        latency
    }

    /// Report as of now. Neutral until a signal has been recorded.
    pub fn current_report(&self) -> ConfidenceReport {
        compute_report(&self.history.lock(), self.clock.epoch_ms())
    }

    pub fn history(&self) -> SignalHistory {
        self.history.lock().clone()
    }

    /// Subscribe to the build, crash and save events this engine records
    pub fn attach(&self) -> Vec<Subscription> {
        let this = self.clone();
        let on_success = self.bus.subscribe(EventKind::BuildSucceeded, "confidence", move |_| {
            this.record_build(true);
            Ok(())
        });
        let this = self.clone();
        let on_failure = self.bus.subscribe(EventKind::BuildFailed, "confidence", move |_| {
            this.record_build(false);
            Ok(())
        });
        let this = self.clone();
        let on_crash = self.bus.subscribe(EventKind::RuntimeCrashed, "confidence", move |_| {
            this.record_crash();
            Ok(())
        });
        let this = self.clone();
        let on_save = self.bus.subscribe(EventKind::FileSaved, "confidence", move |event| {
            if let Event::FileSaved { path, .. } = event {
                this.record_save(path);
            }
            Ok(())
        });
        vec![on_success, on_failure, on_crash, on_save]
    }

    fn record(&self, f: impl FnOnce(&mut SignalHistory, u64)) -> ConfidenceReport {
        let now = self.clock.epoch_ms();
        let report = {
            let mut history = self.history.lock();
            f(&mut history, now);
            compute_report(&history, now)
        };
        self.publish(report.clone());
        report
    }

    fn publish(&self, report: ConfidenceReport) {
        tracing::debug!(
            project = %self.project_id,
            score = report.confidence_score,
            risk = %report.risk_level,
            "confidence updated"
        );
        self.bus.publish(&Event::ConfidenceUpdated { report });
    }
}

#[cfg(test)]
#[path = "confidence_tests.rs"]
mod tests;
