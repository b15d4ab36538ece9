//! CLI module for agentops.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{content_preview, Output};

use clap::{Parser, Subcommand};

/// agentops - a tool-calling Databricks assistant
///
/// Answers questions by alternating between a model serving endpoint and
/// Unity Catalog tools, from the terminal or over HTTP.
#[derive(Parser, Debug)]
#[command(name = "agentops")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "AGENTOPS_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file and check the environment
    Init,

    /// Check credentials and configuration
    Doctor,

    /// Ask a single question
    Ask {
        /// The question to ask
        question: String,

        /// Print each message as soon as its step finishes
        #[arg(short, long)]
        stream: bool,

        /// Maximum number of model calls (0 for no limit)
        #[arg(long)]
        max_steps: Option<usize>,
    },

    /// Start an interactive chat session
    Chat {
        /// Maximum number of model calls per turn (0 for no limit)
        #[arg(long)]
        max_steps: Option<usize>,
    },

    /// List the tools available to the model
    Tools,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
