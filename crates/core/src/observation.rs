// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory output: observations and suggestions.
//!
//! Observations describe a detected pattern. Suggestions propose a concrete
//! next action. The two are separate event types and never share a feed.

use crate::confidence::RiskLevel;
use crate::id::ObservationId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationCategory {
    /// The daemon noticed the developer for the first time
    Presence,
    BuildFailure,
    /// Rapid repeated saves of one file
    Stability,
    IntentShift,
    Runtime,
    Recovery,
    /// Plan executor notices (rejections, failures, rollback problems)
    Plan,
}

impl fmt::Display for ObservationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObservationCategory::Presence => "presence",
            ObservationCategory::BuildFailure => "build_failure",
            ObservationCategory::Stability => "stability",
            ObservationCategory::IntentShift => "intent_shift",
            ObservationCategory::Runtime => "runtime",
            ObservationCategory::Recovery => "recovery",
            ObservationCategory::Plan => "plan",
        };
        f.write_str(s)
    }
}

/// A read-only advisory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub timestamp_ms: u64,
    pub message: String,
    pub category: ObservationCategory,
    /// How sure the detector is, in `[0, 1]`
    pub confidence: f64,
}

impl Observation {
    pub fn new(
        id: impl Into<ObservationId>,
        timestamp_ms: u64,
        category: ObservationCategory,
        message: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp_ms,
            message: message.into(),
            category,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// A rate-limited proposal for the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: ObservationId,
    pub timestamp_ms: u64,
    pub message: String,
    /// Machine-readable action the user may accept (e.g. `investigate_build`)
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}
