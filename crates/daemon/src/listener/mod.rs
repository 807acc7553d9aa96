// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The Listener runs in a spawned task, accepting connections and handling
//! each one in its own task so a slow client never blocks the timer loop.
//! Every connection carries exactly one request and one response.

mod plans;
mod query;

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use wid_adapters::{ActionAdapter, CheckpointAdapter};
use wid_core::Clock;
use wid_engine::ProjectRegistry;

use crate::protocol::{self, ProjectSummary, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// Shared context for request handlers
pub struct ListenCtx<A, K, C: Clock> {
    pub registry: Arc<ProjectRegistry<A, K, C>>,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

/// Listener task for accepting socket connections.
pub struct Listener<A, K, C: Clock> {
    socket: UnixListener,
    ctx: Arc<ListenCtx<A, K, C>>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl<A, K, C> Listener<A, K, C>
where
    A: ActionAdapter,
    K: CheckpointAdapter,
    C: Clock,
{
    pub fn new(socket: UnixListener, ctx: ListenCtx<A, K, C>) -> Self {
        Self {
            socket,
            ctx: Arc::new(ctx),
        }
    }

    /// Run the listener loop until the task is dropped, spawning a task per connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ConnectionError::Protocol(
                                    protocol::ProtocolError::ConnectionClosed,
                                ) => debug!("Client disconnected"),
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!("Connection timeout")
                                }
                                _ => error!("Connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection<A, K, C>(
    stream: UnixStream,
    ctx: &ListenCtx<A, K, C>,
) -> Result<(), ConnectionError>
where
    A: ActionAdapter,
    K: CheckpointAdapter,
    C: Clock,
{
    let (mut reader, mut writer) = stream.into_split();

    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    // Editors stream events and poll queries constantly
    match &request {
        Request::Event { project_id, event } => {
            debug!(project = %project_id, event = event.name(), "received event")
        }
        Request::Query { .. } | Request::Ping => debug!(request = ?request, "received query"),
        _ => info!(request = ?request, "received request"),
    }

    let response = handle_request(request, ctx).await;

    debug!("Sending response: {:?}", response);
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;

    Ok(())
}

/// Handle a single request and return a response.
pub async fn handle_request<A, K, C>(request: Request, ctx: &ListenCtx<A, K, C>) -> Response
where
    A: ActionAdapter,
    K: CheckpointAdapter,
    C: Clock,
{
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                warn!(client = %version, daemon = PROTOCOL_VERSION, "protocol version mismatch");
            }
            Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            }
        }

        Request::Event { project_id, event } => {
            let ingested = ctx
                .registry
                .get_or_create(&project_id)
                .and_then(|runtime| runtime.ingest(event));
            match ingested {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }

        Request::Query { project_id, query } => query::handle_query(ctx, &project_id, query),

        Request::RegisterPlan { project_id, plan } => {
            plans::handle_register_plan(ctx, &project_id, plan)
        }

        Request::RollbackPlan {
            project_id,
            plan_id,
        } => plans::handle_rollback_plan(ctx, &project_id, &plan_id).await,

        Request::RollbackStep {
            project_id,
            plan_id,
            step_id,
        } => plans::handle_rollback_step(ctx, &project_id, &plan_id, &step_id).await,

        Request::DestroyProject { project_id } => Response::ProjectDestroyed {
            existed: ctx.registry.destroy(&project_id).await,
        },

        Request::Status => handle_status(ctx),

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
    }
}

fn handle_status<A, K, C>(ctx: &ListenCtx<A, K, C>) -> Response
where
    A: ActionAdapter,
    K: CheckpointAdapter,
    C: Clock,
{
    let projects = ctx
        .registry
        .project_ids()
        .into_iter()
        .filter_map(|id| ctx.registry.get(&id))
        .map(|runtime| {
            let state = runtime.state();
            ProjectSummary {
                project_id: runtime.project_id().clone(),
                files: state.files.len(),
                plans: state.plans.len(),
                confidence_score: runtime.confidence_report().confidence_score,
            }
        })
        .collect();

    Response::Status {
        uptime_secs: ctx.start_time.elapsed().as_secs(),
        projects,
    }
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
