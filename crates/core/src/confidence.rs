// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Confidence and risk report types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scores at or above this are HIGH confidence.
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.75;
/// Scores at or above this (and below HIGH) are MEDIUM confidence.
pub const MEDIUM_CONFIDENCE_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_CONFIDENCE_THRESHOLD {
            ConfidenceLevel::High
        } else if score >= MEDIUM_CONFIDENCE_THRESHOLD {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::Low => write!(f, "LOW"),
            ConfidenceLevel::Medium => write!(f, "MEDIUM"),
            ConfidenceLevel::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Raw signal values the report was computed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    /// Success ratio over recent builds; `None` with no build history
    pub build_success_rate: Option<f64>,
    /// Crashes inside the 30-minute window
    pub crash_count: u32,
    /// Average saves per file per minute over the churn window
    pub churn_score: f64,
    pub last_recovery_latency_ms: Option<u64>,
}

/// Deterministic summary of recent workspace health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub confidence_score: f64,
    pub confidence_level: ConfidenceLevel,
    pub risk_level: RiskLevel,
    pub signal_snapshot: SignalSnapshot,
    /// One entry per contributing factor, in evaluation order
    pub reasons: Vec<String>,
    pub computed_at_ms: u64,
}

/// Score reported before any signal has been recorded.
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

impl ConfidenceReport {
    /// Report returned before any signal exists.
    pub fn neutral(now_ms: u64) -> Self {
        Self {
            confidence_score: NEUTRAL_CONFIDENCE,
            confidence_level: ConfidenceLevel::from_score(NEUTRAL_CONFIDENCE),
            risk_level: RiskLevel::Low,
            signal_snapshot: SignalSnapshot::default(),
            reasons: vec!["No workspace signals recorded yet".to_string()],
            computed_at_ms: now_ms,
        }
    }
}

#[cfg(test)]
#[path = "confidence_tests.rs"]
mod tests;
