// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Developer intent distribution.
//!
//! Four non-negative scores that always sum to 1. Every mutation clamps each
//! score to `[0, 1]`, renormalizes, and recomputes the dominant intent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance for the sum-to-one invariant.
pub const INTENT_EPSILON: f64 = 1e-6;

/// Why the developer is currently acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Debugging,
    Refactoring,
    Generating,
    Learning,
}

impl IntentKind {
    /// All intents, in tie-break order for [`IntentScores::dominant`].
    pub const ALL: [IntentKind; 4] = [
        IntentKind::Debugging,
        IntentKind::Refactoring,
        IntentKind::Generating,
        IntentKind::Learning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Debugging => "debugging",
            IntentKind::Refactoring => "refactoring",
            IntentKind::Generating => "generating",
            IntentKind::Learning => "learning",
        }
    }

    fn index(self) -> usize {
        match self {
            IntentKind::Debugging => 0,
            IntentKind::Refactoring => 1,
            IntentKind::Generating => 2,
            IntentKind::Learning => 3,
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized intent distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentScores {
    debugging: f64,
    refactoring: f64,
    generating: f64,
    learning: f64,
    dominant: IntentKind,
}

impl Default for IntentScores {
    fn default() -> Self {
        Self::uniform()
    }
}

impl IntentScores {
    /// Equal quartiles.
    pub fn uniform() -> Self {
        Self {
            debugging: 0.25,
            refactoring: 0.25,
            generating: 0.25,
            learning: 0.25,
            dominant: IntentKind::Debugging,
        }
    }

    /// Build from raw weights, normalizing them.
    ///
    /// Panics if the weights cannot be normalized (all zero, negative-only,
    /// or non-finite); that is an invariant violation, not a recoverable error.
    pub fn from_weights(weights: [f64; 4]) -> Self {
        let mut scores = Self::uniform();
        scores.set_all(weights);
        scores.normalize();
        scores
    }

    pub fn get(&self, kind: IntentKind) -> f64 {
        self.as_array()[kind.index()]
    }

    pub fn dominant(&self) -> IntentKind {
        self.dominant
    }

    pub fn dominant_score(&self) -> f64 {
        self.get(self.dominant)
    }

    /// Scores in [`IntentKind::ALL`] order.
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.debugging,
            self.refactoring,
            self.generating,
            self.learning,
        ]
    }

    /// Add `amount` to one intent, then clamp and renormalize.
    pub fn bump(&mut self, kind: IntentKind, amount: f64) {
        let mut values = self.as_array();
        values[kind.index()] += amount;
        self.set_all(values);
        self.normalize();
    }

    /// Multiply every score by `factor` and spread the released mass evenly.
    ///
    /// Repeated application converges on equal quartiles.
    pub fn decay(&mut self, factor: f64) {
        let factor = factor.clamp(0.0, 1.0);
        let released = (1.0 - factor) / IntentKind::ALL.len() as f64;
        let values = self.as_array().map(|v| v * factor + released);
        self.set_all(values);
        self.normalize();
    }

    /// Assert the distribution invariant: every score in `[0, 1]` and the
    /// sum within [`INTENT_EPSILON`] of 1.
    pub fn check_invariants(&self) {
        let values = self.as_array();
        for v in values {
            assert!(
                v.is_finite() && (0.0..=1.0).contains(&v),
                "intent score out of range: {values:?}"
            );
        }
        let sum: f64 = values.iter().sum();
        assert!(
            (sum - 1.0).abs() <= INTENT_EPSILON,
            "intent scores do not sum to 1: {values:?} (sum {sum})"
        );
    }

    fn set_all(&mut self, values: [f64; 4]) {
        let [d, r, g, l] = values;
        self.debugging = d;
        self.refactoring = r;
        self.generating = g;
        self.learning = l;
    }

    fn normalize(&mut self) {
        let clamped = self.as_array().map(|v| {
            assert!(!v.is_nan(), "intent score is NaN");
            v.clamp(0.0, 1.0)
        });
        let sum: f64 = clamped.iter().sum();
        assert!(sum > 0.0, "intent distribution has no mass: {clamped:?}");
        self.set_all(clamped.map(|v| v / sum));
        self.dominant = self.argmax();
        self.check_invariants();
    }

    fn argmax(&self) -> IntentKind {
        let mut best = IntentKind::Debugging;
        for kind in IntentKind::ALL {
            if self.get(kind) > self.get(best) {
                best = kind;
            }
        }
        best
    }
}

#[cfg(test)]
#[path = "intent_tests.rs"]
mod tests;
