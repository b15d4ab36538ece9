//! Chat-agent wire format.
//!
//! These are the request/response shapes exchanged with callers over HTTP
//! and the CLI. They are converted to and from [`Message`] at the boundary.

use crate::error::{AgentOpsError, Result};
use crate::message::{Message, Role, ToolCallRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One message as callers send and receive it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAgentMessage {
    pub role: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatAgentToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChatAgentMessage {
    pub fn new<R: Into<String>, C: Into<String>>(role: R, content: C) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            name: None,
            id: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user<C: Into<String>>(content: C) -> Self {
        Self::new("user", content)
    }
}

/// A function call in the wire format. `arguments` is a JSON-encoded string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAgentToolCall {
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub kind: String,
    pub function: ChatAgentFunction,
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAgentFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// Caller identity, used for logging only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Body of a `predict` or `predict_stream` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatAgentRequest {
    pub messages: Vec<ChatAgentMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ChatContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_inputs: Option<Map<String, Value>>,
}

impl ChatAgentRequest {
    pub fn new(messages: Vec<ChatAgentMessage>) -> Self {
        Self {
            messages,
            context: None,
            custom_inputs: None,
        }
    }
}

/// Buffered response: every message produced by the run, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatAgentResponse {
    pub messages: Vec<ChatAgentMessage>,
}

/// One streamed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAgentChunk {
    pub delta: ChatAgentMessage,
}

impl TryFrom<ChatAgentMessage> for Message {
    type Error = AgentOpsError;

    fn try_from(wire: ChatAgentMessage) -> Result<Self> {
        let role: Role = wire.role.parse().map_err(AgentOpsError::MalformedMessage)?;

        let tool_calls = wire
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| -> Result<ToolCallRequest> {
                let arguments = if call.function.arguments.trim().is_empty() {
                    Value::Object(Map::new())
                } else {
                    serde_json::from_str(&call.function.arguments).map_err(|e| {
                        AgentOpsError::MalformedMessage(format!(
                            "tool call '{}' has invalid arguments: {}",
                            call.id, e
                        ))
                    })?
                };
                Ok(ToolCallRequest::new(call.id, call.function.name, arguments))
            })
            .collect::<Result<Vec<_>>>()?;

        if role == Role::Tool && wire.tool_call_id.is_none() {
            return Err(AgentOpsError::MalformedMessage(
                "tool message without tool_call_id".to_string(),
            ));
        }

        Ok(Message {
            id: wire.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            role,
            content: wire.content,
            tool_calls,
            tool_call_id: wire.tool_call_id,
            name: wire.name,
        })
    }
}

impl From<Message> for ChatAgentMessage {
    fn from(message: Message) -> Self {
        let tool_calls = (!message.tool_calls.is_empty()).then(|| {
            message
                .tool_calls
                .into_iter()
                .map(|call| ChatAgentToolCall {
                    id: call.id,
                    kind: default_call_type(),
                    // Always JSON text, so the message converts back unchanged
                    function: ChatAgentFunction {
                        name: call.tool_name,
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect()
        });

        Self {
            role: message.role.as_str().to_string(),
            content: message.content,
            name: message.name,
            id: Some(message.id),
            tool_calls,
            tool_call_id: message.tool_call_id,
        }
    }
}
