//! Wiring for agentops.
//!
//! Builds the tool registry, the model and the agent graph from settings.

use crate::agent::ChatAgent;
use crate::config::{Prompts, Settings};
use crate::error::Result;
use crate::graph::AgentGraph;
use crate::model::{ChatModel, ModelInvoker, OpenAIChatModel};
use crate::tools::{DatabricksClient, ToolExecutor, ToolRegistry, UcFunctionTool, VectorSearchTool};
use std::sync::Arc;
use tracing::info;

/// Owns the configured agent and everything it depends on.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    registry: Arc<ToolRegistry>,
    agent: ChatAgent,
}

impl Orchestrator {
    /// Create an orchestrator talking to the configured serving endpoint.
    pub fn new(settings: Settings) -> Result<Self> {
        let model = Arc::new(OpenAIChatModel::from_settings(&settings.model)?);
        info!("Using model endpoint {}", settings.model.endpoint);
        let registry = Self::build_registry(&settings)?;
        Ok(Self::with_components(settings, model, registry))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        model: Arc<dyn ChatModel>,
        registry: ToolRegistry,
    ) -> Self {
        let prompts = Prompts::from_settings(&settings);
        let registry = Arc::new(registry);

        let invoker = ModelInvoker::new(model, &registry)
            .with_preamble(prompts.system_preamble())
            .with_max_retries(settings.model.max_retries);
        let mut executor = ToolExecutor::new(Arc::clone(&registry));
        if let Some(timeout) = settings.tools.timeout() {
            executor = executor.with_timeout(timeout);
        }
        let agent = ChatAgent::new(AgentGraph::new(invoker, executor))
            .with_max_steps(settings.agent.max_steps())
            .with_deadline(settings.agent.deadline());

        Self {
            settings,
            prompts,
            registry,
            agent,
        }
    }

    /// Register every enabled Unity Catalog function and the retriever.
    ///
    /// Credentials are only required when at least one tool is enabled.
    pub fn build_registry(settings: &Settings) -> Result<ToolRegistry> {
        let any_enabled =
            settings.enabled_functions().next().is_some() || settings.tools.retriever.enabled;
        if !any_enabled {
            info!("No tools enabled");
            return Ok(ToolRegistry::new());
        }

        let client = Arc::new(DatabricksClient::from_env(
            &settings.tools.host_env,
            &settings.tools.token_env,
            settings.tools.timeout(),
        )?);
        Self::build_registry_with_client(settings, client)
    }

    /// Like [`build_registry`](Self::build_registry) with an existing client.
    pub fn build_registry_with_client(
        settings: &Settings,
        client: Arc<DatabricksClient>,
    ) -> Result<ToolRegistry> {
        let tools = &settings.tools;
        let mut registry = ToolRegistry::new();

        for function in settings.enabled_functions() {
            registry.register(Arc::new(UcFunctionTool::new(
                Arc::clone(&client),
                &tools.uc_catalog,
                &tools.schema,
                &tools.warehouse_id,
                function.clone(),
            )?))?;
        }

        if tools.retriever.enabled {
            let retriever = VectorSearchTool::new(
                Arc::clone(&client),
                &tools.uc_catalog,
                &tools.schema,
                &tools.vector_search_index,
                tools.retriever.clone(),
            )?;
            info!("Retriever bound to index {}", retriever.index_name());
            registry.register(Arc::new(retriever))?;
        }

        info!("Registered {} tool(s): {:?}", registry.len(), registry.names());
        Ok(registry)
    }

    pub fn agent(&self) -> &ChatAgent {
        &self.agent
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }
}
