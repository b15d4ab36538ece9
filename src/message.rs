//! Conversation data model.
//!
//! These are the values threaded through the agent loop: messages, the tool
//! calls a model asks for, and the results handed back to it. Wire formats
//! (chat-agent requests, chat completion payloads) are converted into these
//! types at the edges and never leak into the loop itself.

use crate::error::{AgentOpsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A model's request to run one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier echoed back by the matching tool message.
    pub id: String,
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new<S: Into<String>, T: Into<String>>(id: S, tool_name: T, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// What a tool produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Json(Value),
}

impl ToolOutput {
    /// Render the output as message content.
    pub fn to_content(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Json(value) => value.to_string(),
        }
    }
}

impl std::fmt::Display for ToolOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_content())
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        ToolOutput::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        ToolOutput::Text(text.to_string())
    }
}

/// Outcome of one tool call, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: ToolOutput,
    pub failed: bool,
}

impl ToolCallResult {
    pub fn success(request: &ToolCallRequest, output: ToolOutput) -> Self {
        Self {
            tool_call_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            output,
            failed: false,
        }
    }

    pub fn failure(request: &ToolCallRequest, reason: impl std::fmt::Display) -> Self {
        Self {
            tool_call_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            output: ToolOutput::Text(format!("Error: {}", reason)),
            failed: true,
        }
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Only ever non-empty on assistant messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Only set on tool messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name, on tool messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Create a message with a fresh id.
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool message answering the call `tool_call_id`.
    pub fn tool<S: Into<String>, N: Into<String>, C: Into<String>>(
        tool_call_id: S,
        name: N,
        content: C,
    ) -> Self {
        let mut message = Self::new(Role::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message.name = Some(name.into());
        message
    }

    /// Replace the generated id.
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// Add a tool call request to an assistant message.
    pub fn with_tool_call(mut self, request: ToolCallRequest) -> Self {
        self.tool_calls.push(request);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

impl From<ToolCallResult> for Message {
    fn from(result: ToolCallResult) -> Self {
        Message::tool(result.tool_call_id, result.tool_name, result.output.to_content())
    }
}

/// The history of one invocation. Append-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a conversation from existing messages.
    ///
    /// Every tool message must answer a tool call issued by an earlier
    /// assistant message, and only assistant messages may carry tool calls.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self> {
        validate_history(&messages)?;
        Ok(Self { messages })
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend<I: IntoIterator<Item = Message>>(&mut self, messages: I) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Tool calls of the most recent assistant message.
    pub fn pending_tool_calls(&self) -> &[ToolCallRequest] {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.tool_calls.as_slice())
            .unwrap_or(&[])
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// Check the tool-call pairing rules of a message history.
fn validate_history(messages: &[Message]) -> Result<()> {
    let mut issued: HashSet<&str> = HashSet::new();
    for (index, message) in messages.iter().enumerate() {
        if message.has_tool_calls() && message.role != Role::Assistant {
            return Err(AgentOpsError::MalformedMessage(format!(
                "message {} has role '{}' but carries tool calls",
                index, message.role
            )));
        }
        issued.extend(message.tool_calls.iter().map(|c| c.id.as_str()));

        if message.role == Role::Tool {
            let call_id = message.tool_call_id.as_deref().ok_or_else(|| {
                AgentOpsError::MalformedMessage(format!(
                    "tool message {} has no tool_call_id",
                    index
                ))
            })?;
            if !issued.contains(call_id) {
                return Err(AgentOpsError::MalformedMessage(format!(
                    "tool message {} answers unknown tool call '{}'",
                    index, call_id
                )));
            }
        }
    }
    Ok(())
}

/// A labelled node of the orchestration graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    Agent,
    Tools,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Agent => "agent",
            Node::Tools => "tools",
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages produced by one node execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepUpdate {
    #[serde(rename = "node_name")]
    pub node: Node,
    pub new_messages: Vec<Message>,
}

impl StepUpdate {
    pub fn new(node: Node, new_messages: Vec<Message>) -> Self {
        Self { node, new_messages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_parsing() {
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!("TOOL".parse::<Role>().unwrap(), Role::Tool);
        assert!("narrator".parse::<Role>().is_err());
        assert_eq!(Role::System.to_string(), "system");
    }

    #[test]
    fn test_message_serialization_omits_empty_fields() {
        let message = Message::assistant("4").with_id("m1");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({"id": "m1", "role": "assistant", "content": "4"}));
    }

    #[test]
    fn test_tool_result_becomes_tool_message() {
        let request = ToolCallRequest::new("c1", "execute_python_code", json!({"code": "2+2"}));
        let message: Message = ToolCallResult::success(&request, "4".into()).into();
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(message.name.as_deref(), Some("execute_python_code"));
        assert_eq!(message.content, "4");
    }

    #[test]
    fn test_failed_result_content() {
        let request = ToolCallRequest::new("c2", "translate", json!({}));
        let result = ToolCallResult::failure(&request, "warehouse stopped");
        assert!(result.failed);
        assert_eq!(result.output.to_content(), "Error: warehouse stopped");
    }

    #[test]
    fn test_json_output_renders_compact() {
        let output = ToolOutput::Json(json!({"rows": [1, 2]}));
        assert_eq!(output.to_content(), r#"{"rows":[1,2]}"#);
    }

    #[test]
    fn test_state_accepts_answered_tool_calls() {
        let messages = vec![
            Message::user("2+2?"),
            Message::assistant("").with_tool_call(ToolCallRequest::new(
                "c1",
                "execute_python_code",
                json!({"code": "2+2"}),
            )),
            Message::tool("c1", "execute_python_code", "4"),
        ];
        let state = ConversationState::from_messages(messages).unwrap();
        assert_eq!(state.len(), 3);
        assert_eq!(state.pending_tool_calls().len(), 1);
    }

    #[test]
    fn test_state_rejects_orphan_tool_message() {
        let messages = vec![Message::user("hi"), Message::tool("c9", "summarize", "text")];
        let err = ConversationState::from_messages(messages).unwrap_err();
        assert!(matches!(err, AgentOpsError::MalformedMessage(_)));
    }

    #[test]
    fn test_state_rejects_tool_calls_on_user_message() {
        let message =
            Message::user("hi").with_tool_call(ToolCallRequest::new("c1", "summarize", json!({})));
        assert!(ConversationState::from_messages(vec![message]).is_err());
    }

    #[test]
    fn test_pending_tool_calls_uses_latest_assistant() {
        let mut state = ConversationState::new();
        state.push(Message::user("q"));
        assert!(state.pending_tool_calls().is_empty());

        state.push(
            Message::assistant("")
                .with_tool_call(ToolCallRequest::new("a", "summarize", json!({}))),
        );
        state.push(Message::tool("a", "summarize", "ok"));
        state.push(Message::assistant("done"));
        assert!(state.pending_tool_calls().is_empty());
    }

    #[test]
    fn test_step_update_wire_name() {
        let update = StepUpdate::new(Node::Tools, Vec::new());
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["node_name"], "tools");
    }
}
