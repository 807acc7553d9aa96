// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wid-core: data model for the workspace intelligence daemon

pub mod clock;
pub mod confidence;
pub mod event;
pub mod id;
pub mod intent;
pub mod observation;
pub mod plan;
pub mod timer;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use confidence::{ConfidenceLevel, ConfidenceReport, RiskLevel, SignalSnapshot};
pub use event::{Event, EventKind};
pub use id::{CheckpointId, IdGen, ObservationId, PlanId, ProjectId, SequentialIdGen, StepId, UuidIdGen};
pub use intent::{IntentKind, IntentScores};
pub use observation::{Observation, ObservationCategory, Suggestion};
pub use plan::{ActionType, AgentPlan, PlanStatus, PlanStep, StepStatus};
pub use timer::TimerId;
pub use workspace::{BuildError, BuildStatus, CursorPosition, RuntimeStatus};
