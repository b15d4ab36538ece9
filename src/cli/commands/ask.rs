//! Ask command implementation.

use super::{cancel_on_ctrl_c, step_inputs};
use crate::agent::{ChatAgentMessage, ChatAgentRequest};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use futures::StreamExt;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    stream: bool,
    max_steps: Option<usize>,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'agentops doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let request = ChatAgentRequest {
        messages: vec![ChatAgentMessage::user(question)],
        context: None,
        custom_inputs: step_inputs(max_steps),
    };
    let cancel = cancel_on_ctrl_c();

    if stream {
        let mut chunks = orchestrator.agent().predict_stream_with(request, cancel);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => Output::message(&chunk.delta),
                Err(e) => {
                    Output::error(&format!("Failed to generate answer: {}", e));
                    return Err(e.into());
                }
            }
        }
        return Ok(());
    }

    let spinner = Output::spinner("Thinking...");
    match orchestrator.agent().predict_with(request, cancel).await {
        Ok(response) => {
            spinner.finish_and_clear();
            for message in &response.messages {
                Output::message(message);
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
