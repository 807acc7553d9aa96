// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only query handlers. Queries never create a project.

use wid_adapters::{ActionAdapter, CheckpointAdapter};
use wid_core::{Clock, ProjectId};

use crate::protocol::{Query, Response};

use super::ListenCtx;

/// Handle query requests (read-only state access).
pub(super) fn handle_query<A, K, C>(
    ctx: &ListenCtx<A, K, C>,
    project_id: &ProjectId,
    query: Query,
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

    match query {
        Query::State => Response::State {
            state: Box::new(runtime.state()),
        },
        Query::Report => Response::Report {
            report: runtime.confidence_report(),
        },
        Query::Observations { limit } => Response::Observations {
            observations: runtime.observations(limit),
        },
        Query::Plan { plan_id } => Response::Plan {
            plan: runtime.plan(&plan_id).map(Box::new),
        },
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
