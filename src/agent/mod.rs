//! Chat agent facade.
//!
//! [`ChatAgent`] turns caller messages into a conversation, runs the agent
//! graph and renders its step updates either as one buffered response
//! (`predict`) or as a stream of per-message chunks (`predict_stream`).
//! Both modes consume the same update stream, so the buffered response is
//! always the concatenation of the streamed chunks.

mod types;

pub use types::{
    ChatAgentChunk, ChatAgentFunction, ChatAgentMessage, ChatAgentRequest, ChatAgentResponse,
    ChatAgentToolCall, ChatContext,
};

use crate::error::{AgentOpsError, Result};
use crate::graph::{AgentGraph, InvocationContext};
use crate::message::{ConversationState, Message};
use crate::tools::ToolSpec;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Entry point for answering conversations.
#[derive(Debug, Clone)]
pub struct ChatAgent {
    graph: AgentGraph,
    max_steps: Option<usize>,
    deadline: Option<Duration>,
}

impl ChatAgent {
    pub fn new(graph: AgentGraph) -> Self {
        Self {
            graph,
            max_steps: None,
            deadline: None,
        }
    }

    /// Default cap on agent steps, overridable with `custom_inputs.max_steps`.
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Overall time budget for one invocation.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn graph(&self) -> &AgentGraph {
        &self.graph
    }

    /// Schemas of the tools the model can call.
    pub fn tools(&self) -> Vec<ToolSpec> {
        self.graph.executor().registry().specs()
    }

    /// Answer `messages` and return every produced message at once.
    pub async fn predict(
        &self,
        messages: Vec<ChatAgentMessage>,
        context: Option<ChatContext>,
        custom_inputs: Option<Map<String, Value>>,
    ) -> Result<ChatAgentResponse> {
        let request = ChatAgentRequest {
            messages,
            context,
            custom_inputs,
        };
        self.predict_with(request, CancellationToken::new()).await
    }

    /// Answer `messages`, yielding each produced message as soon as its step ends.
    pub fn predict_stream(
        &self,
        messages: Vec<ChatAgentMessage>,
        context: Option<ChatContext>,
        custom_inputs: Option<Map<String, Value>>,
    ) -> BoxStream<'_, Result<ChatAgentChunk>> {
        let request = ChatAgentRequest {
            messages,
            context,
            custom_inputs,
        };
        self.predict_stream_with(request, CancellationToken::new())
    }

    /// Buffered prediction that stops when `cancel` fires.
    #[instrument(skip_all, fields(messages = request.messages.len()))]
    pub async fn predict_with(
        &self,
        request: ChatAgentRequest,
        cancel: CancellationToken,
    ) -> Result<ChatAgentResponse> {
        let mut chunks = self.predict_stream_with(request, cancel);
        let mut messages = Vec::new();
        while let Some(chunk) = chunks.next().await {
            messages.push(chunk?.delta);
        }
        info!("Prediction finished with {} message(s)", messages.len());
        Ok(ChatAgentResponse { messages })
    }

    /// Streaming prediction that stops when `cancel` fires.
    ///
    /// Malformed input fails before the first chunk. A failed run yields an
    /// `Err` as its last item.
    pub fn predict_stream_with(
        &self,
        request: ChatAgentRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'_, Result<ChatAgentChunk>> {
        Box::pin(try_stream! {
            let (state, ctx) = self.prepare(request, cancel)?;
            let mut updates = self.graph.stream(state, ctx);
            while let Some(update) = updates.next().await {
                let update = update?;
                debug!("Step {} produced {} message(s)", update.node, update.new_messages.len());
                for message in update.new_messages {
                    yield ChatAgentChunk { delta: message.into() };
                }
            }
        })
    }

    /// Convert the request into a seeded conversation and its limits.
    fn prepare(
        &self,
        request: ChatAgentRequest,
        cancel: CancellationToken,
    ) -> Result<(ConversationState, InvocationContext)> {
        let context = request.context.unwrap_or_default();
        info!(
            conversation_id = context.conversation_id.as_deref().unwrap_or("-"),
            user_id = context.user_id.as_deref().unwrap_or("-"),
            "Starting invocation with {} message(s)",
            request.messages.len()
        );

        let messages = request
            .messages
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>>>()?;
        let state = ConversationState::from_messages(messages)?;

        let max_steps = match request.custom_inputs.as_ref() {
            Some(inputs) => max_steps_override(inputs)?.unwrap_or(self.max_steps),
            None => self.max_steps,
        };

        let mut ctx = InvocationContext::new()
            .with_max_steps(max_steps)
            .with_cancellation(cancel);
        if let Some(deadline) = self.deadline {
            ctx = ctx.with_timeout(deadline);
        }
        Ok((state, ctx))
    }
}

/// Check that `request` would be accepted by `predict` without running it.
///
/// Rejects messages that do not convert, histories that do not validate and
/// a `custom_inputs.max_steps` that is not a non-negative integer.
pub fn validate_request(request: &ChatAgentRequest) -> Result<()> {
    let messages = request
        .messages
        .iter()
        .cloned()
        .map(Message::try_from)
        .collect::<Result<Vec<_>>>()?;
    ConversationState::from_messages(messages)?;
    if let Some(inputs) = &request.custom_inputs {
        max_steps_override(inputs)?;
    }
    Ok(())
}

/// Read `custom_inputs.max_steps`. Zero removes the limit.
fn max_steps_override(inputs: &Map<String, Value>) -> Result<Option<Option<usize>>> {
    match inputs.get("max_steps") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let steps = value.as_u64().ok_or_else(|| {
                AgentOpsError::InvalidInput(format!(
                    "custom_inputs.max_steps must be a non-negative integer, got {}",
                    value
                ))
            })?;
            Ok(Some((steps > 0).then_some(steps as usize)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MAX_STEPS_MARKER;
    use crate::message::ToolCallRequest;
    use crate::model::testing::ScriptedModel;
    use crate::model::ModelInvoker;
    use crate::tools::testing::FixedTool;
    use crate::tools::{ToolExecutor, ToolRegistry};
    use serde_json::json;
    use std::sync::Arc;

    fn agent(model: Arc<ScriptedModel>) -> ChatAgent {
        let registry = Arc::new(
            ToolRegistry::new()
                .with_tool(Arc::new(FixedTool::new("execute_python_code", "4")))
                .unwrap(),
        );
        let invoker = ModelInvoker::new(model, &registry)
            .with_preamble("You are a Databricks expert. ");
        ChatAgent::new(AgentGraph::new(invoker, ToolExecutor::new(registry)))
    }

    fn python_call() -> Message {
        Message::assistant("").with_tool_call(ToolCallRequest::new(
            "c1",
            "execute_python_code",
            json!({"code": "2+2"}),
        ))
    }

    fn question() -> Vec<ChatAgentMessage> {
        vec![ChatAgentMessage::user("2+2?")]
    }

    async fn stream_all(agent: &ChatAgent) -> Vec<Result<ChatAgentChunk>> {
        agent.predict_stream(question(), None, None).collect().await
    }

    #[tokio::test]
    async fn test_simple_question() {
        let model = Arc::new(ScriptedModel::replying(vec![Message::assistant("4")]));
        let response = agent(model.clone()).predict(question(), None, None).await.unwrap();

        assert_eq!(response.messages.len(), 1);
        assert_eq!(response.messages[0].role, "assistant");
        assert_eq!(response.messages[0].content, "4");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_one_tool_round_trip() {
        let model = Arc::new(ScriptedModel::replying(vec![
            python_call(),
            Message::assistant("The result is 4"),
        ]));
        let response = agent(model).predict(question(), None, None).await.unwrap();

        let roles: Vec<&str> = response.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["assistant", "tool", "assistant"]);

        let calls = response.messages[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "execute_python_code");
        assert_eq!(response.messages[1].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(response.messages[1].content, "4");
        assert_eq!(response.messages[2].content, "The result is 4");
    }

    #[tokio::test]
    async fn test_previous_response_replays_as_history() {
        let garbled = Message::assistant("").with_tool_call(ToolCallRequest::new(
            "c1",
            "execute_python_code",
            Value::String("{not json".to_string()),
        ));
        let model = Arc::new(ScriptedModel::replying(vec![
            garbled,
            Message::assistant("The result is 4"),
            Message::assistant("Still 4"),
        ]));
        let agent = agent(model.clone());

        let first = agent.predict(question(), None, None).await.unwrap();
        let mut history = question();
        history.extend(first.messages);
        history.push(ChatAgentMessage::user("Are you sure?"));

        let second = agent.predict(history, None, None).await.unwrap();
        assert_eq!(second.messages.len(), 1);
        assert_eq!(second.messages[0].content, "Still 4");

        let (replayed, _) = model.request(2);
        assert_eq!(
            replayed[2].tool_calls[0].arguments,
            Value::String("{not json".to_string())
        );
    }

    #[test]
    fn test_validate_request_matches_predict_rules() {
        assert!(validate_request(&ChatAgentRequest::new(question())).is_ok());

        let mut request = ChatAgentRequest::new(question());
        request.custom_inputs = Some(Map::from_iter([("max_steps".to_string(), json!("ten"))]));
        assert!(matches!(
            validate_request(&request),
            Err(AgentOpsError::InvalidInput(_))
        ));

        request.custom_inputs = Some(Map::from_iter([("max_steps".to_string(), json!(0))]));
        assert!(validate_request(&request).is_ok());

        let orphan = ChatAgentRequest::new(vec![ChatAgentMessage {
            tool_call_id: Some("c9".to_string()),
            ..ChatAgentMessage::new("tool", "4")
        }]);
        assert!(validate_request(&orphan).is_err());
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_without_chunks() {
        let model = Arc::new(ScriptedModel::failing_then(11, None));
        let err = agent(model.clone())
            .predict(question(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentOpsError::ModelUnavailable { attempts: 11, .. }));
        assert_eq!(model.calls(), 11);

        let items = stream_all(&agent(Arc::new(ScriptedModel::failing_then(11, None)))).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn test_buffered_equals_streamed() {
        let script = || {
            Arc::new(ScriptedModel::replying(vec![
                python_call().with_id("a1"),
                Message::assistant("The result is 4").with_id("a2"),
            ]))
        };

        let buffered = agent(script()).predict(question(), None, None).await.unwrap();
        let streamed: Vec<ChatAgentMessage> = stream_all(&agent(script()))
            .await
            .into_iter()
            .map(|chunk| chunk.map(|c| c.delta))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(buffered.messages.len(), streamed.len());
        for (b, s) in buffered.messages.iter().zip(&streamed) {
            assert_eq!(b.role, s.role);
            assert_eq!(b.content, s.content);
            assert_eq!(b.tool_calls, s.tool_calls);
            assert_eq!(b.tool_call_id, s.tool_call_id);
        }
        assert_eq!(buffered.messages[0].id.as_deref(), Some("a1"));
        assert_eq!(streamed[2].id.as_deref(), Some("a2"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let model = Arc::new(ScriptedModel::replying(vec![
            Message::assistant("").with_tool_call(ToolCallRequest::new(
                "c1",
                "ask_ai",
                json!({"question": "?"}),
            )),
            Message::assistant("Sorry, that tool is unavailable"),
        ]));
        let response = agent(model.clone()).predict(question(), None, None).await.unwrap();

        assert_eq!(response.messages.len(), 3);
        assert!(response.messages[1].content.contains("Unknown tool: ask_ai"));
        let (second_input, _) = model.request(1);
        assert!(second_input.last().unwrap().content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn test_malformed_input_fails_fast() {
        let model = Arc::new(ScriptedModel::replying(vec![Message::assistant("4")]));
        let agent = agent(model.clone());

        let err = agent
            .predict(vec![ChatAgentMessage::new("narrator", "hi")], None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentOpsError::MalformedMessage(_)));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_custom_inputs_cap_steps() {
        let model = Arc::new(ScriptedModel::replying(vec![
            python_call(),
            Message::assistant("unreachable"),
        ]));
        let mut inputs = Map::new();
        inputs.insert("max_steps".to_string(), json!(1));

        let response = agent(model.clone())
            .predict(question(), None, Some(inputs))
            .await
            .unwrap();

        assert_eq!(response.messages.len(), 2);
        assert_eq!(response.messages[1].role, "system");
        assert!(response.messages[1].content.starts_with(MAX_STEPS_MARKER));
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn test_max_steps_override_parsing() {
        let mut inputs = Map::new();
        assert_eq!(max_steps_override(&inputs).unwrap(), None);

        inputs.insert("max_steps".to_string(), json!(0));
        assert_eq!(max_steps_override(&inputs).unwrap(), Some(None));

        inputs.insert("max_steps".to_string(), json!("ten"));
        assert!(max_steps_override(&inputs).is_err());
    }

    #[tokio::test]
    async fn test_cancelled_prediction() {
        let model = Arc::new(ScriptedModel::replying(vec![Message::assistant("4")]));
        let token = CancellationToken::new();
        token.cancel();

        let err = agent(model)
            .predict_with(ChatAgentRequest::new(question()), token)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentOpsError::Cancelled));
    }
}
