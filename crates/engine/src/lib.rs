// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Workspace intelligence engine: event bus, state store, confidence,
//! observer and plan execution, wired per project.

mod bus;
mod confidence;
mod config;
mod error;
mod observer;
mod plan_executor;
mod registry;
mod scheduler;
mod store;

pub use bus::{BusError, EventBus, Subscription};
pub use confidence::{compute_report, ConfidenceEngine, SignalHistory};
pub use config::EngineConfig;
pub use error::EngineError;
pub use observer::Observer;
pub use plan_executor::{ExecutorRunner, PlanExecutor, RollbackReport, StepOutcome};
pub use registry::{DepsFactory, ProjectRegistry, ProjectRuntime, RuntimeDeps};
pub use scheduler::Scheduler;
pub use store::{StateView, WorkspaceStore};
