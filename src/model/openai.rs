//! OpenAI-compatible chat completions client.
//!
//! Databricks model serving exposes the chat completions API under
//! `<host>/serving-endpoints`, with the endpoint name as the model.

use super::ChatModel;
use crate::config::ModelSettings;
use crate::error::{AgentOpsError, Result};
use crate::message::{Message, Role, ToolCallRequest};
use crate::tools::ToolSpec;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Create a client for the configured endpoint.
///
/// Requests are bounded by `settings.timeout()`; a zero timeout leaves them
/// unbounded.
pub fn create_client(settings: &ModelSettings) -> Result<Client<OpenAIConfig>> {
    let api_base = match &settings.api_base {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => {
            let host = std::env::var(&settings.host_env).map_err(|_| {
                AgentOpsError::Config(format!(
                    "Set model.api_base or the {} environment variable",
                    settings.host_env
                ))
            })?;
            serving_endpoints_base(&host)
        }
    };
    let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
        AgentOpsError::Config(format!("{} is not set", settings.api_key_env))
    })?;

    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = settings.timeout() {
        builder = builder.timeout(timeout);
    }
    let http_client = builder.build()?;
    let config = OpenAIConfig::new()
        .with_api_base(api_base)
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client))
}

/// `<host>/serving-endpoints`, adding a scheme if the host has none.
fn serving_endpoints_base(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}/serving-endpoints", host)
    } else {
        format!("https://{}/serving-endpoints", host)
    }
}

/// Chat model backed by an OpenAI-compatible endpoint.
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAIChatModel {
    pub fn new(client: Client<OpenAIConfig>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature: None,
        }
    }

    /// Create a model from settings, reading credentials from the environment.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        let mut model = Self::new(create_client(settings)?, &settings.endpoint);
        model.temperature = settings.temperature;
        Ok(model)
    }
}

fn build_err(e: impl std::fmt::Display) -> AgentOpsError {
    AgentOpsError::Model(format!("Failed to build request: {}", e))
}

/// Convert internal messages to chat completion request messages.
fn to_request_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>> {
    messages
        .iter()
        .map(|message| {
            let converted: ChatCompletionRequestMessage = match message.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(build_err)?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(build_err)?
                    .into(),
                Role::Assistant => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    if !message.content.is_empty() || !message.has_tool_calls() {
                        args.content(message.content.clone());
                    }
                    if message.has_tool_calls() {
                        args.tool_calls(
                            message
                                .tool_calls
                                .iter()
                                .map(to_openai_tool_call)
                                .collect::<Vec<_>>(),
                        );
                    }
                    args.build().map_err(build_err)?.into()
                }
                Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(message.tool_call_id.clone().unwrap_or_default())
                    .content(message.content.clone())
                    .build()
                    .map_err(build_err)?
                    .into(),
            };
            Ok(converted)
        })
        .collect()
}

fn to_openai_tool_call(request: &ToolCallRequest) -> ChatCompletionMessageToolCall {
    let arguments = match &request.arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    ChatCompletionMessageToolCall {
        id: request.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: request.tool_name.clone(),
            arguments,
        },
    }
}

/// Get function tool definitions for the bound tools.
fn tool_definitions(tools: &[ToolSpec]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|tool| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.parameters.clone()),
                strict: None,
            },
        })
        .collect()
}

/// Parse a tool call from the response format.
///
/// Arguments that are not valid JSON are passed through as a JSON string so
/// the tool reports the problem back to the model.
fn parse_tool_call(call: &ChatCompletionMessageToolCall) -> ToolCallRequest {
    let arguments = if call.function.arguments.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(&call.function.arguments)
            .unwrap_or_else(|_| Value::String(call.function.arguments.clone()))
    };
    let id = if call.id.is_empty() {
        format!("call_{}", Uuid::new_v4().simple())
    } else {
        call.id.clone()
    };
    ToolCallRequest::new(id, call.function.name.clone(), arguments)
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    #[instrument(skip_all, fields(model = %self.model, messages = messages.len()))]
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(to_request_messages(messages)?);
        if !tools.is_empty() {
            args.tools(tool_definitions(tools));
        }
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        let request = args.build().map_err(build_err)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AgentOpsError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AgentOpsError::Model("No response from model".to_string()))?;

        let mut reply = Message::assistant(choice.message.content.clone().unwrap_or_default());
        if let Some(tool_calls) = &choice.message.tool_calls {
            reply.tool_calls = tool_calls.iter().map(parse_tool_call).collect();
        }

        debug!(
            "Model replied with {} chars and {} tool call(s)",
            reply.content.len(),
            reply.tool_calls.len()
        );
        Ok(reply)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model_for(server: &MockServer) -> OpenAIChatModel {
        let config = OpenAIConfig::new()
            .with_api_base(format!("{}/serving-endpoints", server.uri()))
            .with_api_key("test_token");
        OpenAIChatModel::new(Client::with_config(config), "my-endpoint")
    }

    fn python_tool() -> ToolSpec {
        ToolSpec {
            name: "execute_python_code".to_string(),
            description: "Runs Python".to_string(),
            parameters: json!({"type": "object", "properties": {"code": {"type": "string"}}}),
        }
    }

    #[test]
    fn test_serving_endpoints_base() {
        assert_eq!(
            serving_endpoints_base("adb-1.azuredatabricks.net/"),
            "https://adb-1.azuredatabricks.net/serving-endpoints"
        );
        assert_eq!(
            serving_endpoints_base("http://localhost:8080"),
            "http://localhost:8080/serving-endpoints"
        );
    }

    #[test]
    fn test_parse_tool_call_arguments() {
        let call = ChatCompletionMessageToolCall {
            id: "c1".to_string(),
            r#type: ChatCompletionToolType::Function,
            function: FunctionCall {
                name: "execute_python_code".to_string(),
                arguments: r#"{"code": "2+2"}"#.to_string(),
            },
        };
        let request = parse_tool_call(&call);
        assert_eq!(request.id, "c1");
        assert_eq!(request.arguments, json!({"code": "2+2"}));
    }

    #[test]
    fn test_parse_tool_call_keeps_invalid_json_as_string() {
        let call = ChatCompletionMessageToolCall {
            id: String::new(),
            r#type: ChatCompletionToolType::Function,
            function: FunctionCall {
                name: "summarize".to_string(),
                arguments: "{not json".to_string(),
            },
        };
        let request = parse_tool_call(&call);
        assert!(request.id.starts_with("call_"));
        assert_eq!(request.arguments, Value::String("{not json".to_string()));
    }

    #[test]
    fn test_history_conversion_covers_all_roles() {
        let messages = vec![
            Message::system("You are a Databricks expert. "),
            Message::user("2+2?"),
            Message::assistant("").with_tool_call(ToolCallRequest::new(
                "c1",
                "execute_python_code",
                json!({"code": "2+2"}),
            )),
            Message::tool("c1", "execute_python_code", "4"),
            Message::assistant("The result is 4"),
        ];
        let converted = to_request_messages(&messages).unwrap();
        assert_eq!(converted.len(), 5);
        assert!(matches!(converted[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(converted[1], ChatCompletionRequestMessage::User(_)));
        match &converted[2] {
            ChatCompletionRequestMessage::Assistant(assistant) => {
                let calls = assistant.tool_calls.as_ref().unwrap();
                assert_eq!(calls[0].function.arguments, r#"{"code":"2+2"}"#);
            }
            other => panic!("Expected assistant message, got {:?}", other),
        }
        assert!(matches!(converted[3], ChatCompletionRequestMessage::Tool(_)));
    }

    #[tokio::test]
    async fn test_completion_with_tool_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/serving-endpoints/chat/completions"))
            .and(header("Authorization", "Bearer test_token"))
            .and(body_partial_json(json!({
                "model": "my-endpoint",
                "tools": [{"type": "function", "function": {"name": "execute_python_code"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "my-endpoint",
                "choices": [{
                    "index": 0,
                    "finish_reason": "tool_calls",
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "c1",
                            "type": "function",
                            "function": {"name": "execute_python_code", "arguments": "{\"code\": \"2+2\"}"}
                        }]
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = model_for(&server)
            .complete(&[Message::user("2+2?")], &[python_tool()])
            .await
            .unwrap();

        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].tool_name, "execute_python_code");
        assert_eq!(reply.tool_calls[0].arguments, json!({"code": "2+2"}));
    }

    #[tokio::test]
    async fn test_completion_without_tools_omits_tool_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/serving-endpoints/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-2",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "my-endpoint",
                "choices": [{
                    "index": 0,
                    "finish_reason": "stop",
                    "message": {"role": "assistant", "content": "4"}
                }]
            })))
            .mount(&server)
            .await;

        let model = model_for(&server);
        let reply = model.complete(&[Message::user("2+2?")], &[]).await.unwrap();
        assert_eq!(reply.content, "4");
        assert!(!reply.has_tool_calls());

        let received = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(body.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_server_error_surfaces_as_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "bad request", "type": "invalid_request_error", "param": null, "code": null}
            })))
            .mount(&server)
            .await;

        let err = model_for(&server)
            .complete(&[Message::user("hi")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentOpsError::OpenAI(_)));
    }

    #[tokio::test]
    async fn test_client_from_settings_without_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/serving-endpoints/chat/completions"))
            .and(header("Authorization", "Bearer settings_token"))
            .and(body_partial_json(json!({"model": "my-endpoint", "temperature": 0.5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-3",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "my-endpoint",
                "choices": [{
                    "index": 0,
                    "finish_reason": "stop",
                    "message": {"role": "assistant", "content": "4"}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        std::env::set_var("AGENTOPS_TEST_MODEL_TOKEN", "settings_token");
        let settings = ModelSettings {
            endpoint: "my-endpoint".to_string(),
            api_base: Some(format!("{}/serving-endpoints/", server.uri())),
            api_key_env: "AGENTOPS_TEST_MODEL_TOKEN".to_string(),
            timeout_secs: 0,
            temperature: Some(0.5),
            ..ModelSettings::default()
        };

        let reply = OpenAIChatModel::from_settings(&settings)
            .unwrap()
            .complete(&[Message::user("2+2?")], &[])
            .await
            .unwrap();
        assert_eq!(reply.content, "4");
    }
}

