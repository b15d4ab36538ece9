//! Configuration module for agentops.
//!
//! Handles loading application settings and rendering the system prompt.

mod prompts;
mod settings;

pub use prompts::Prompts;
pub use settings::{
    AgentSettings, FunctionSettings, GeneralSettings, ModelSettings, ParameterSettings,
    PromptSettings, RetrieverSettings, ServerSettings, Settings, ToolSettings,
};
