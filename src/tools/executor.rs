//! Runs the tool calls of one `tools` step.

use super::ToolRegistry;
use crate::error::AgentOpsError;
use crate::graph::InvocationContext;
use crate::message::{ToolCallRequest, ToolCallResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Executes tool call requests against a [`ToolRegistry`].
///
/// Every request yields exactly one result, in request order. Failures of
/// individual calls (unknown tool, tool error, timeout) become failed results
/// and never abort the other calls.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bound each tool call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute all requests concurrently.
    #[instrument(skip_all, fields(count = requests.len()))]
    pub async fn execute(
        &self,
        requests: &[ToolCallRequest],
        ctx: &InvocationContext,
    ) -> Vec<ToolCallResult> {
        let futures: Vec<_> = requests
            .iter()
            .map(|request| self.execute_one(request, ctx))
            .collect();

        // join_all yields outputs in input order regardless of completion order
        futures::future::join_all(futures).await
    }

    async fn execute_one(
        &self,
        request: &ToolCallRequest,
        ctx: &InvocationContext,
    ) -> ToolCallResult {
        let Some(tool) = self.registry.get(&request.tool_name) else {
            warn!("Model requested unknown tool: {}", request.tool_name);
            return ToolCallResult::failure(
                request,
                AgentOpsError::UnknownTool(request.tool_name.clone()),
            );
        };

        if ctx.deadline().is_some_and(|d| d <= tokio::time::Instant::now()) {
            warn!("Skipping tool {}: deadline passed", request.tool_name);
            return ToolCallResult::failure(request, AgentOpsError::DeadlineExceeded);
        }

        info!(
            "Calling tool: {} with args: {}",
            request.tool_name, request.arguments
        );

        let call = tool.invoke(request.arguments.clone());
        let outcome = match effective_deadline(self.timeout, ctx.deadline()) {
            Some(limit) => tokio::time::timeout_at(limit, call).await,
            None => Ok(call.await),
        };

        match outcome {
            Ok(Ok(output)) => {
                debug!("Tool {} succeeded", request.tool_name);
                ToolCallResult::success(request, output)
            }
            Ok(Err(e)) => {
                warn!("Tool {} failed: {}", request.tool_name, e);
                ToolCallResult::failure(request, e)
            }
            Err(_) => {
                warn!("Tool {} timed out", request.tool_name);
                ToolCallResult::failure(request, AgentOpsError::DeadlineExceeded)
            }
        }
    }
}

/// The earlier of "now + timeout" and the invocation deadline.
fn effective_deadline(
    timeout: Option<Duration>,
    deadline: Option<tokio::time::Instant>,
) -> Option<tokio::time::Instant> {
    let from_timeout = timeout.map(|t| tokio::time::Instant::now() + t);
    match (from_timeout, deadline) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
