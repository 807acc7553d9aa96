// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine tunables

use std::time::Duration;

/// Per-project timing and capacity settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often the intent distribution decays
    pub decay_interval: Duration,
    /// How often the observer polls for a dominant-intent change
    pub intent_poll_interval: Duration,
    /// Observations retained by the observer feed
    pub observation_cap: usize,
    /// Entries retained per observer history (errors, saves per path)
    pub history_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decay_interval: Duration::from_secs(2),
            intent_poll_interval: Duration::from_secs(3),
            observation_cap: 100,
            history_cap: 20,
        }
    }
}
