// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan proposal and rollback handlers.
//!
//! Approvals arrive as ordinary `plan:*` events; only registration and
//! rollback need their own requests.

use wid_adapters::{ActionAdapter, CheckpointAdapter};
use wid_core::{AgentPlan, Clock, PlanId, ProjectId, StepId};

use crate::protocol::{Response, RollbackFailure};

use super::ListenCtx;

pub(super) fn handle_register_plan<A, K, C>(
    ctx: &ListenCtx<A, K, C>,
    project_id: &ProjectId,
    plan: AgentPlan,
) -> Response
where
    A: ActionAdapter,
    K: CheckpointAdapter,
    C: Clock,
{
    let plan_id = plan.id.clone();
    let registered = ctx
        .registry
        .get_or_create(project_id)
        .and_then(|runtime| runtime.register_plan(plan));
    match registered {
        Ok(()) => {
            tracing::info!(project = %project_id, plan = %plan_id, "plan registered");
            Response::Ok
        }
        Err(e) => Response::Error {
            message: e.to_string(),
        },
    }
}

pub(super) async fn handle_rollback_plan<A, K, C>(
    ctx: &ListenCtx<A, K, C>,
    project_id: &ProjectId,
    plan_id: &PlanId,
) -> Response
where
    A: ActionAdapter,
    K: CheckpointAdapter,
    C: Clock,
{
    let runtime = match ctx.registry.require(project_id) {
        Ok(runtime) => runtime,
        Err(e) => {
            return Response::Error {
                message: e.to_string(),
            }
        }
    };

    match runtime.rollback_plan(plan_id).await {
        Ok(report) => Response::PlanRolledBack {
            rolled_back: report.rolled_back,
            failed: report
                .failed
                .into_iter()
                .map(|(step_id, error)| RollbackFailure { step_id, error })
                .collect(),
        },
        Err(e) => Response::Error {
            message: e.to_string(),
        },
    }
}

pub(super) async fn handle_rollback_step<A, K, C>(
    ctx: &ListenCtx<A, K, C>,
    project_id: &ProjectId,
    plan_id: &PlanId,
    step_id: &StepId,
) -> Response
where
    A: ActionAdapter,
    K: CheckpointAdapter,
    C: Clock,
{
    let runtime = match ctx.registry.require(project_id) {
        Ok(runtime) => runtime,
        Err(e) => {
            return Response::Error {
                message: e.to_string(),
            }
        }
    };

    match runtime.rollback_step(plan_id, step_id).await {
        Ok(checkpoint_id) => Response::StepRolledBack { checkpoint_id },
        Err(e) => Response::Error {
            message: e.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "plans_tests.rs"]
mod tests;
