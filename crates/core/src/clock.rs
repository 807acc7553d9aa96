// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so time-driven behavior can be tested deterministically.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic and wall-clock time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant, used for timer deadlines.
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch, used for event
    /// timestamps and rolling windows.
    fn epoch_ms(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[derive(Debug)]
struct FakeTime {
    instant: Instant,
    epoch_ms: u64,
}

/// Manually advanced clock for tests.
///
/// Both the monotonic instant and the epoch milliseconds move together
/// on [`FakeClock::advance`].
#[derive(Clone, Debug)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeTime>>,
}

/// Epoch the fake clock starts at (2026-01-01T00:00:00Z).
const FAKE_EPOCH_START_MS: u64 = 1_767_225_600_000;

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeTime {
                instant: Instant::now(),
                epoch_ms: FAKE_EPOCH_START_MS,
            })),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let mut t = self.inner.lock();
        t.instant += by;
        t.epoch_ms += by.as_millis() as u64;
    }

    /// Pin the wall clock to a specific epoch millisecond value.
    pub fn set_epoch_ms(&self, epoch_ms: u64) {
        self.inner.lock().epoch_ms = epoch_ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().instant
    }

    fn epoch_ms(&self) -> u64 {
        self.inner.lock().epoch_ms
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
