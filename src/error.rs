//! Error types for agentops.

use thiserror::Error;

/// Library-level error type for agent operations.
#[derive(Error, Debug)]
pub enum AgentOpsError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single model call failed. Retried by the model invoker.
    #[error("Model call failed: {0}")]
    Model(String),

    #[error("Model unavailable after {attempts} attempts: {source}")]
    ModelUnavailable {
        attempts: u32,
        #[source]
        source: Box<AgentOpsError>,
    },

    #[error("Tool '{tool}' failed: {reason}")]
    ToolInvocationFailed { tool: String, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invocation cancelled")]
    Cancelled,

    #[error("Invocation deadline exceeded")]
    DeadlineExceeded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AgentOpsError {
    /// Whether the error ends the invocation no matter how many retries remain.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Result type alias for agentops operations.
pub type Result<T> = std::result::Result<T, AgentOpsError>;
