//! Tool capabilities the model may call.
//!
//! A [`Tool`] is anything with a name, a description, a JSON schema for its
//! arguments and an async `invoke`. The [`ToolRegistry`] is built once at
//! startup and shared read-only by every invocation.

pub mod databricks;
mod executor;

pub use databricks::{DatabricksClient, UcFunctionTool, VectorSearchTool};
pub use executor::ToolExecutor;

use crate::error::{AgentOpsError, Result};
use crate::message::ToolOutput;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A capability the model can request by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the argument object.
    fn parameters(&self) -> Value;

    /// Run the tool. Errors are reported back to the model, never raised.
    async fn invoke(&self, arguments: Value) -> Result<ToolOutput>;
}

/// The schema-only view of a tool that is bound to a model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters(),
        }
    }
}

/// Name-indexed set of tools, in registration order.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(AgentOpsError::Config(format!(
                "Tool '{}' is registered twice",
                name
            )));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Schemas of every registered tool.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| ToolSpec::of(t.as_ref())).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::EchoTool;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_lookup_and_order() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(EchoTool::new("summarize")))
            .unwrap()
            .with_tool(Arc::new(EchoTool::new("translate")))
            .unwrap();

        assert_eq!(registry.names(), vec!["summarize", "translate"]);
        assert!(registry.get("translate").is_some());
        assert!(registry.get("ask_ai").is_none());

        let specs = registry.specs();
        assert_eq!(specs[0].name, "summarize");
        assert_eq!(specs[0].parameters["required"], json!(["text"]));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool::new("summarize"))).unwrap();
        let err = registry
            .register(Arc::new(EchoTool::new("summarize")))
            .unwrap_err();
        assert!(matches!(err, AgentOpsError::Config(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registered_tool_is_invocable() {
        let registry = ToolRegistry::new()
            .with_tool(Arc::new(EchoTool::new("echo")))
            .unwrap();
        let tool = registry.get("echo").unwrap();
        let output = tokio_test::block_on(tool.invoke(json!({"text": "hi"}))).unwrap();
        assert_eq!(output, ToolOutput::Text("hi".to_string()));
    }
}
