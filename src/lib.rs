//! agentops - a tool-calling conversational agent for Databricks
//!
//! Answers questions by alternating between a language model and external
//! tools until the model produces a final reply.
//!
//! # Overview
//!
//! agentops allows you to:
//! - Ask questions that the model answers with Unity Catalog functions
//!   (Python execution, summarization, translation) and vector search
//! - Receive the answer at once or as a stream of per-step messages
//! - Serve the agent over HTTP
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `message` - Conversation data model
//! - `tools` - Tool trait, registry, executor and Databricks-backed tools
//! - `model` - Chat model trait, OpenAI-compatible client, retrying invoker
//! - `graph` - The agent/tools state machine
//! - `agent` - Buffered and streaming response adapter
//! - `config` - Configuration management
//! - `orchestrator` - Wiring from settings
//!
//! # Example
//!
//! ```rust,no_run
//! use agentops::agent::ChatAgentMessage;
//! use agentops::config::Settings;
//! use agentops::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let response = orchestrator
//!         .agent()
//!         .predict(vec![ChatAgentMessage::user("What is 2+2?")], None, None)
//!         .await?;
//!     for message in response.messages {
//!         println!("{}: {}", message.role, message.content);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod message;
pub mod model;
pub mod orchestrator;
pub mod tools;

pub use error::{AgentOpsError, Result};
