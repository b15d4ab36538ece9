//! The agent loop.
//!
//! Two nodes, `agent` and `tools`, wired as
//!
//! ```text
//! START -> agent -> (tool calls?) -> tools -> agent ...
//!                \-> (final)      -> END
//! ```
//!
//! Each node execution yields one [`StepUpdate`]. The stream ends when the
//! model replies without tool calls, the step limit is hit, or an error
//! (model unavailable, cancellation, deadline) terminates the run.

mod context;
pub mod router;

pub use context::InvocationContext;
pub use router::{route, Route};

use crate::error::Result;
use crate::message::{ConversationState, Message, Node, StepUpdate};
use crate::model::ModelInvoker;
use crate::tools::ToolExecutor;
use async_stream::try_stream;
use futures::stream::BoxStream;
use tracing::{debug, info, warn};

/// Prefix of the system message appended when the step limit stops the loop.
pub const MAX_STEPS_MARKER: &str = "MaxStepsExceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Start,
    Agent,
    Tools,
    End,
}

/// Orchestrates the model invoker and the tool executor.
#[derive(Debug, Clone)]
pub struct AgentGraph {
    invoker: ModelInvoker,
    executor: ToolExecutor,
}

impl AgentGraph {
    pub fn new(invoker: ModelInvoker, executor: ToolExecutor) -> Self {
        Self { invoker, executor }
    }

    pub fn invoker(&self) -> &ModelInvoker {
        &self.invoker
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    /// Run the graph over `state`, yielding one update per node execution.
    ///
    /// The stream owns the conversation for the duration of the run. A
    /// failed step yields one `Err` and then the stream ends.
    pub fn stream(
        &self,
        state: ConversationState,
        ctx: InvocationContext,
    ) -> BoxStream<'_, Result<StepUpdate>> {
        Box::pin(try_stream! {
            let mut state = state;
            let mut position = Position::Start;
            let mut steps = 0usize;

            while position != Position::End {
                match position {
                    Position::Start => {
                        debug!("Graph transition: START -> agent");
                        position = Position::Agent;
                    }
                    Position::Agent => {
                        ctx.check()?;
                        let reply = self.invoker.invoke(&state, &ctx).await?;
                        steps += 1;
                        let next = route(&reply);
                        state.push(reply.clone());
                        yield StepUpdate::new(Node::Agent, vec![reply]);

                        position = match next {
                            Route::Tools if ctx.max_steps().is_some_and(|max| steps >= max) => {
                                warn!("Stopping after {} agent steps with tool calls pending", steps);
                                let marker = Message::system(format!(
                                    "{}: stopped after {} agent steps",
                                    MAX_STEPS_MARKER, steps
                                ));
                                state.push(marker.clone());
                                yield StepUpdate::new(Node::Agent, vec![marker]);
                                Position::End
                            }
                            Route::Tools => Position::Tools,
                            Route::Done => Position::End,
                        };
                        debug!(route = next.as_str(), "Graph transition: agent -> {:?}", position);
                    }
                    Position::Tools => {
                        ctx.ensure_not_cancelled()?;
                        let requests = state.pending_tool_calls().to_vec();
                        let results = self.executor.execute(&requests, &ctx).await;
                        let failed = results.iter().filter(|r| r.failed).count();
                        info!("Executed {} tool call(s), {} failed", results.len(), failed);

                        let messages: Vec<Message> = results.into_iter().map(Message::from).collect();
                        state.extend(messages.iter().cloned());
                        yield StepUpdate::new(Node::Tools, messages);

                        debug!("Graph transition: tools -> agent");
                        position = Position::Agent;
                    }
                    Position::End => {}
                }
            }

            debug!("Graph reached END after {} agent step(s), {} messages", steps, state.len());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentOpsError;
    use crate::message::{Role, ToolCallRequest};
    use crate::model::testing::ScriptedModel;
    use crate::tools::testing::EchoTool;
    use crate::tools::ToolRegistry;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn graph(model: Arc<ScriptedModel>) -> AgentGraph {
        let registry = Arc::new(
            ToolRegistry::new()
                .with_tool(Arc::new(EchoTool::new("summarize")))
                .unwrap(),
        );
        let invoker = ModelInvoker::new(model, &registry).with_max_retries(2);
        AgentGraph::new(invoker, ToolExecutor::new(registry))
    }

    fn tool_request(id: &str) -> Message {
        Message::assistant("").with_tool_call(ToolCallRequest::new(
            id,
            "summarize",
            json!({"text": "short"}),
        ))
    }

    fn question() -> ConversationState {
        ConversationState::from_messages(vec![Message::user("summarize this")]).unwrap()
    }

    async fn collect(
        graph: &AgentGraph,
        ctx: InvocationContext,
    ) -> Vec<Result<StepUpdate>> {
        graph.stream(question(), ctx).collect().await
    }

    #[tokio::test]
    async fn test_final_reply_ends_after_one_agent_step() {
        let model = Arc::new(ScriptedModel::replying(vec![Message::assistant("done")]));
        let updates = collect(&graph(model.clone()), InvocationContext::default()).await;

        assert_eq!(updates.len(), 1);
        let update = updates[0].as_ref().unwrap();
        assert_eq!(update.node, Node::Agent);
        assert_eq!(update.new_messages[0].content, "done");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_tool_round_trip_feeds_results_back() {
        let model = Arc::new(ScriptedModel::replying(vec![
            tool_request("c1"),
            Message::assistant("Summary: short"),
        ]));
        let updates: Vec<StepUpdate> = collect(&graph(model.clone()), InvocationContext::default())
            .await
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        let nodes: Vec<Node> = updates.iter().map(|u| u.node).collect();
        assert_eq!(nodes, vec![Node::Agent, Node::Tools, Node::Agent]);

        let tool_message = &updates[1].new_messages[0];
        assert_eq!(tool_message.role, Role::Tool);
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(tool_message.content, "short");

        // Second model call sees the tool call and its result
        let (second_input, _) = model.request(1);
        assert_eq!(second_input.len(), 4);
        assert_eq!(second_input[0].role, Role::System);
        assert_eq!(second_input[3].role, Role::Tool);
    }

    #[tokio::test]
    async fn test_step_limit_appends_marker() {
        let model = Arc::new(ScriptedModel::replying(vec![
            tool_request("c1"),
            tool_request("c2"),
            tool_request("c3"),
        ]));
        let ctx = InvocationContext::default().with_max_steps(Some(2));
        let updates: Vec<StepUpdate> = collect(&graph(model.clone()), ctx)
            .await
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        let nodes: Vec<Node> = updates.iter().map(|u| u.node).collect();
        assert_eq!(nodes, vec![Node::Agent, Node::Tools, Node::Agent, Node::Agent]);
        let marker = &updates[3].new_messages[0];
        assert_eq!(marker.role, Role::System);
        assert!(marker.content.starts_with(MAX_STEPS_MARKER));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_final_reply_at_step_limit_ends_normally() {
        let model = Arc::new(ScriptedModel::replying(vec![
            tool_request("c1"),
            Message::assistant("Summary: short"),
        ]));
        let ctx = InvocationContext::default().with_max_steps(Some(2));
        let updates: Vec<StepUpdate> = collect(&graph(model.clone()), ctx)
            .await
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        let nodes: Vec<Node> = updates.iter().map(|u| u.node).collect();
        assert_eq!(nodes, vec![Node::Agent, Node::Tools, Node::Agent]);
        assert_eq!(updates[2].new_messages.len(), 1);
        assert_eq!(updates[2].new_messages[0].content, "Summary: short");
        assert!(updates
            .iter()
            .flat_map(|u| &u.new_messages)
            .all(|m| !m.content.starts_with(MAX_STEPS_MARKER)));
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_terminates_stream() {
        let model = Arc::new(ScriptedModel::failing_then(3, None));
        let updates = collect(&graph(model.clone()), InvocationContext::default()).await;

        assert_eq!(updates.len(), 1);
        assert!(matches!(
            updates[0],
            Err(AgentOpsError::ModelUnavailable { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_yields_no_updates() {
        let model = Arc::new(ScriptedModel::replying(vec![Message::assistant("done")]));
        let token = CancellationToken::new();
        token.cancel();
        let ctx = InvocationContext::default().with_cancellation(token);

        let updates = collect(&graph(model.clone()), ctx).await;
        assert_eq!(updates.len(), 1);
        assert!(matches!(updates[0], Err(AgentOpsError::Cancelled)));
        assert_eq!(model.calls(), 0);
    }
}
