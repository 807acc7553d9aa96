// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer and scheduling management

use std::collections::HashMap;
use std::time::{Duration, Instant};
use wid_core::TimerId;

/// Shortest accepted period
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Timer entry
#[derive(Debug, Clone)]
struct Timer {
    fires_at: Instant,
    period: Duration,
}

/// Manages one project's periodic timers
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: HashMap<TimerId, Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a repeating timer, first firing one period after `now`.
    /// Replaces any existing timer with the same id.
    pub fn set_periodic(&mut self, id: TimerId, period: Duration, now: Instant) {
        let period = period.max(MIN_PERIOD);
        self.timers.insert(
            id,
            Timer {
                fires_at: now + period,
                period,
            },
        );
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    /// Return every timer whose deadline has passed, earliest first.
    ///
    /// Each fired timer moves to the first deadline on its own period grid
    /// after `now`, so late ticks do not drift it. Several missed periods
    /// fire once.
    pub fn fired_timers(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired: Vec<(Instant, TimerId)> = Vec::new();
        for (id, timer) in self.timers.iter_mut() {
            if timer.fires_at > now {
                continue;
            }
            fired.push((timer.fires_at, id.clone()));
            let behind = now.duration_since(timer.fires_at);
            let periods = behind.as_nanos() / timer.period.as_nanos() + 1;
            timer.fires_at += timer.period * u32::try_from(periods).unwrap_or(u32::MAX);
        }
        fired.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.as_str().cmp(b.1.as_str())));
        fired.into_iter().map(|(_, id)| id).collect()
    }

    /// Get the next timer fire time
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.fires_at).min()
    }

    pub fn has_timers(&self) -> bool {
        !self.timers.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
