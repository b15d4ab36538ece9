//! Databricks-backed tools: Unity Catalog functions and Vector Search.
//!
//! Unity Catalog functions run through the SQL statement execution API on a
//! configured warehouse. The retriever queries a Vector Search index and
//! returns the best hit.

use super::Tool;
use crate::config::{FunctionSettings, RetrieverSettings};
use crate::error::{AgentOpsError, Result};
use crate::message::ToolOutput;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Default timeout for Databricks REST calls.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// How long the statement API may block before giving up on a function call.
const STATEMENT_WAIT_TIMEOUT: &str = "50s";

/// Authenticated client for the Databricks workspace REST API.
#[derive(Debug, Clone)]
pub struct DatabricksClient {
    http: Client,
    host: Url,
    token: String,
}

impl DatabricksClient {
    /// Create a client for `host` using a personal access token.
    pub fn new(host: &str, token: &str) -> Result<Self> {
        Self::with_timeout(host, token, Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
    }

    /// Create a client with a custom request timeout, or none.
    pub fn with_timeout(host: &str, token: &str, timeout: Option<Duration>) -> Result<Self> {
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            Url::parse(host)?
        } else {
            Url::parse(&format!("https://{}", host))?
        };
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            host,
            token: token.to_string(),
        })
    }

    /// Create a client from the named environment variables.
    pub fn from_env(host_env: &str, token_env: &str, timeout: Option<Duration>) -> Result<Self> {
        let host = std::env::var(host_env)
            .map_err(|_| AgentOpsError::Config(format!("{} is not set", host_env)))?;
        let token = std::env::var(token_env)
            .map_err(|_| AgentOpsError::Config(format!("{} is not set", token_env)))?;
        Self::with_timeout(&host, &token, timeout)
    }

    pub fn host(&self) -> &Url {
        &self.host
    }

    /// POST a JSON body and return the JSON response.
    ///
    /// Non-2xx responses are reported as a failure of `tool`.
    async fn post(&self, tool: &str, path: &str, body: &Value) -> Result<Value> {
        let url = self.host.join(path)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            let err_text = response.text().await.unwrap_or_default();
            Err(AgentOpsError::ToolInvocationFailed {
                tool: tool.to_string(),
                reason: format!("Request failed: {}: {}", status, err_text),
            })
        }
    }
}

/// Whether `s` is safe to splice into a SQL identifier.
fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Render a JSON argument as a SQL parameter value.
fn parameter_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A Unity Catalog SQL function exposed as a tool.
pub struct UcFunctionTool {
    client: Arc<DatabricksClient>,
    warehouse_id: String,
    full_name: String,
    function: FunctionSettings,
}

impl UcFunctionTool {
    pub fn new(
        client: Arc<DatabricksClient>,
        catalog: &str,
        schema: &str,
        warehouse_id: &str,
        function: FunctionSettings,
    ) -> Result<Self> {
        for part in [catalog, schema, function.name.as_str()] {
            if !is_identifier(part) {
                return Err(AgentOpsError::Config(format!(
                    "Invalid Unity Catalog identifier: '{}'",
                    part
                )));
            }
        }
        if warehouse_id.is_empty() {
            return Err(AgentOpsError::Config(
                "tools.warehouse_id is required for Unity Catalog functions".to_string(),
            ));
        }

        Ok(Self {
            client,
            warehouse_id: warehouse_id.to_string(),
            full_name: format!("`{}`.`{}`.`{}`", catalog, schema, function.name),
            function,
        })
    }

    /// The SQL statement that calls the function with named parameters.
    fn statement(&self) -> String {
        let placeholders = self
            .function
            .parameters
            .iter()
            .map(|p| format!(":{}", p.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {}({}) AS result", self.full_name, placeholders)
    }

    fn failure(&self, reason: impl Into<String>) -> AgentOpsError {
        AgentOpsError::ToolInvocationFailed {
            tool: self.function.name.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for UcFunctionTool {
    fn name(&self) -> &str {
        &self.function.name
    }

    fn description(&self) -> &str {
        &self.function.description
    }

    fn parameters(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .function
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({"type": p.kind, "description": p.description}),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .function
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    #[instrument(skip(self, arguments), fields(function = %self.function.name))]
    async fn invoke(&self, arguments: Value) -> Result<ToolOutput> {
        let mut parameters = Vec::with_capacity(self.function.parameters.len());
        for param in &self.function.parameters {
            let value = arguments.get(&param.name).filter(|v| !v.is_null()).ok_or_else(|| {
                AgentOpsError::InvalidInput(format!("Missing '{}' argument", param.name))
            })?;
            parameters.push(json!({"name": param.name, "value": parameter_value(value)}));
        }

        let body = json!({
            "warehouse_id": self.warehouse_id,
            "statement": self.statement(),
            "parameters": parameters,
            "wait_timeout": STATEMENT_WAIT_TIMEOUT,
            "on_wait_timeout": "CANCEL",
            "disposition": "INLINE",
            "format": "JSON_ARRAY",
        });

        debug!("Executing {}", self.full_name);
        let response = self
            .client
            .post(&self.function.name, "/api/2.0/sql/statements", &body)
            .await?;

        let state = response["status"]["state"].as_str().unwrap_or("UNKNOWN");
        if state != "SUCCEEDED" {
            let detail = response["status"]["error"]["message"]
                .as_str()
                .unwrap_or("no error message");
            return Err(self.failure(format!("Statement {}: {}", state, detail)));
        }

        match &response["result"]["data_array"][0][0] {
            Value::Null => Ok(ToolOutput::Text(String::new())),
            Value::String(s) => Ok(ToolOutput::Text(s.clone())),
            other => Ok(ToolOutput::Json(other.clone())),
        }
    }
}

/// Retrieves the best matching document from a Vector Search index.
pub struct VectorSearchTool {
    client: Arc<DatabricksClient>,
    index_name: String,
    settings: RetrieverSettings,
}

impl VectorSearchTool {
    pub const NAME: &'static str = "retrieve_function";

    pub fn new(
        client: Arc<DatabricksClient>,
        catalog: &str,
        schema: &str,
        index: &str,
        settings: RetrieverSettings,
    ) -> Result<Self> {
        if settings.columns.is_empty() {
            return Err(AgentOpsError::Config(
                "tools.retriever.columns must name at least one column".to_string(),
            ));
        }
        Ok(Self {
            client,
            index_name: format!("{}.{}.{}", catalog, schema, index),
            settings,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }
}

#[async_trait]
impl Tool for VectorSearchTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Retrieve from Databricks Vector Search using the query."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    #[instrument(skip(self, arguments), fields(index = %self.index_name))]
    async fn invoke(&self, arguments: Value) -> Result<ToolOutput> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| AgentOpsError::InvalidInput("Missing 'query' argument".to_string()))?;

        let body = json!({
            "query_text": query,
            "columns": self.settings.columns,
            "num_results": self.settings.num_results,
            "query_type": self.settings.query_type,
        });
        let path = format!("/api/2.0/vector-search/indexes/{}/query", self.index_name);
        let response = self.client.post(Self::NAME, &path, &body).await?;

        // Map requested columns to their position in the result rows
        let names: Vec<&str> = response["manifest"]["columns"]
            .as_array()
            .map(|cols| cols.iter().filter_map(|c| c["name"].as_str()).collect())
            .unwrap_or_default();

        let top = response["result"]["data_array"]
            .as_array()
            .and_then(|rows| rows.first())
            .and_then(|row| row.as_array())
            .ok_or_else(|| AgentOpsError::ToolInvocationFailed {
                tool: Self::NAME.to_string(),
                reason: format!("No results for query '{}'", query),
            })?;

        let fields: Vec<String> = self
            .settings
            .columns
            .iter()
            .map(|column| {
                names
                    .iter()
                    .position(|n| *n == column.as_str())
                    .and_then(|i| top.get(i))
                    .map(parameter_value)
                    .unwrap_or_default()
            })
            .collect();

        Ok(ToolOutput::Text(fields.join("  \n")))
    }
}
