//! Configuration settings for agentops.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub model: ModelSettings,
    pub agent: AgentSettings,
    pub tools: ToolSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Language model endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Serving endpoint (model) name.
    pub endpoint: String,
    /// Base URL of the OpenAI-compatible API. Defaults to `$host_env/serving-endpoints`.
    pub api_base: Option<String>,
    /// Environment variable holding the workspace host.
    pub host_env: String,
    /// Environment variable holding the API token.
    pub api_key_env: String,
    /// Additional attempts after a failed model call.
    pub max_retries: u32,
    /// Per-request timeout in seconds. 0 disables it.
    pub timeout_secs: u64,
    /// Sampling temperature (endpoint default if unset).
    pub temperature: Option<f32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            endpoint: "databricks-meta-llama-3-3-70b-instruct".to_string(),
            api_base: None,
            host_env: "DATABRICKS_HOST".to_string(),
            api_key_env: "DATABRICKS_TOKEN".to_string(),
            max_retries: 10,
            timeout_secs: 300,
            temperature: None,
        }
    }
}

/// Orchestration loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// System preamble prepended to every model call. Supports `{{variables}}`.
    pub system_prompt: String,
    /// Maximum number of model calls per invocation. 0 disables the limit.
    pub max_steps: usize,
    /// Overall deadline for one invocation in seconds. 0 disables it.
    pub deadline_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: "You are a Databricks expert. ".to_string(),
            max_steps: 25,
            deadline_secs: 0,
        }
    }
}

impl ModelSettings {
    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }
}

impl AgentSettings {
    pub fn max_steps(&self) -> Option<usize> {
        (self.max_steps > 0).then_some(self.max_steps)
    }

    pub fn deadline(&self) -> Option<std::time::Duration> {
        (self.deadline_secs > 0).then(|| std::time::Duration::from_secs(self.deadline_secs))
    }
}

/// One declared parameter of a Unity Catalog function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSettings {
    pub name: String,
    /// JSON schema type (string, number, integer, boolean).
    #[serde(rename = "type", default = "default_parameter_type")]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

fn default_parameter_type() -> String {
    "string".to_string()
}

impl ParameterSettings {
    fn string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: default_parameter_type(),
            description: description.to_string(),
        }
    }
}

/// A Unity Catalog function exposed to the model as a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSettings {
    /// Function name inside `uc_catalog.schema`.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSettings>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Vector Search retriever settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverSettings {
    pub enabled: bool,
    /// Number of hits requested from the index. Only the best is returned.
    pub num_results: u32,
    /// Columns returned for each hit, rendered one per line.
    pub columns: Vec<String>,
    /// ANN or HYBRID.
    pub query_type: String,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            num_results: 1,
            columns: vec!["url".to_string(), "content".to_string()],
            query_type: "ANN".to_string(),
        }
    }
}

/// Tool backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Unity Catalog catalog holding the functions and the index.
    pub uc_catalog: String,
    pub schema: String,
    /// Vector Search index name inside `uc_catalog.schema`.
    pub vector_search_index: String,
    /// SQL warehouse used to execute functions.
    pub warehouse_id: String,
    /// Environment variable holding the workspace host.
    pub host_env: String,
    /// Environment variable holding the API token.
    pub token_env: String,
    /// Per-call timeout in seconds. 0 disables it.
    pub timeout_secs: u64,
    pub functions: Vec<FunctionSettings>,
    pub retriever: RetrieverSettings,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            uc_catalog: "main".to_string(),
            schema: "agents".to_string(),
            vector_search_index: "docs_index".to_string(),
            warehouse_id: String::new(),
            host_env: "DATABRICKS_HOST".to_string(),
            token_env: "DATABRICKS_TOKEN".to_string(),
            timeout_secs: 120,
            functions: default_functions(),
            retriever: RetrieverSettings::default(),
        }
    }
}

impl ToolSettings {
    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }
}

fn default_functions() -> Vec<FunctionSettings> {
    vec![
        FunctionSettings {
            name: "execute_python_code".to_string(),
            description: "Executes Python code in a sandboxed environment and returns its stdout."
                .to_string(),
            parameters: vec![ParameterSettings::string(
                "code",
                "Python code to execute. Print the values you want returned.",
            )],
            enabled: true,
        },
        FunctionSettings {
            name: "ask_ai".to_string(),
            description: "Asks a general purpose language model a question.".to_string(),
            parameters: vec![ParameterSettings::string("question", "The question to ask")],
            enabled: false,
        },
        FunctionSettings {
            name: "summarize".to_string(),
            description: "Summarizes a piece of text.".to_string(),
            parameters: vec![ParameterSettings::string("text", "The text to summarize")],
            enabled: true,
        },
        FunctionSettings {
            name: "translate".to_string(),
            description: "Translates text into the target language.".to_string(),
            parameters: vec![
                ParameterSettings::string("content", "The text to translate"),
                ParameterSettings::string("language", "Target language code, e.g. 'fr'"),
            ],
            enabled: true,
        },
    ]
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Custom variables available in the system prompt as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AgentOpsError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agentops")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Functions that should be registered as tools.
    pub fn enabled_functions(&self) -> impl Iterator<Item = &FunctionSettings> {
        self.tools.functions.iter().filter(|f| f.enabled)
    }
}
