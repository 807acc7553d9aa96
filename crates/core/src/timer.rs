// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifiers for per-project periodic work.

use crate::id::ProjectId;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

const INTENT_DECAY_PREFIX: &str = "intent-decay:";
const INTENT_POLL_PREFIX: &str = "intent-poll:";

/// Unique identifier for a scheduled timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub String);

impl TimerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Timer driving the intent decay tick for a project.
    pub fn intent_decay(project_id: &ProjectId) -> Self {
        Self::new(format!("{INTENT_DECAY_PREFIX}{project_id}"))
    }

    /// Timer driving the observer's dominant-intent poll for a project.
    pub fn intent_poll(project_id: &ProjectId) -> Self {
        Self::new(format!("{INTENT_POLL_PREFIX}{project_id}"))
    }

    pub fn is_intent_decay(&self) -> bool {
        self.0.starts_with(INTENT_DECAY_PREFIX)
    }

    pub fn is_intent_poll(&self) -> bool {
        self.0.starts_with(INTENT_POLL_PREFIX)
    }

    /// Project this timer belongs to, if it is a per-project timer.
    pub fn project_id_str(&self) -> Option<&str> {
        self.0
            .strip_prefix(INTENT_DECAY_PREFIX)
            .or_else(|| self.0.strip_prefix(INTENT_POLL_PREFIX))
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TimerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<&str> for TimerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for TimerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
