//! Interactive chat command.

use super::step_inputs;
use crate::agent::{ChatAgent, ChatAgentMessage, ChatContext};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use console::style;
use futures::StreamExt;
use serde_json::{Map, Value};
use std::io::{self, BufRead, Write};
use tracing::debug;
use uuid::Uuid;

/// Run the interactive chat command.
pub async fn run_chat(max_steps: Option<usize>, settings: Settings) -> anyhow::Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'agentops doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let mut chat = ChatSession::new(orchestrator.agent(), step_inputs(max_steps));

    println!("\n{}", style("agentops chat").bold().cyan());
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            chat.clear_history();
            Output::info("Conversation history cleared.");
            continue;
        }

        if let Err(e) = chat.send_message(input).await {
            Output::error(&format!("Error: {}", e));
        }
    }

    Ok(())
}

/// Conversation kept by the caller; every turn replays the full history.
struct ChatSession<'a> {
    agent: &'a ChatAgent,
    context: ChatContext,
    custom_inputs: Option<Map<String, Value>>,
    history: Vec<ChatAgentMessage>,
}

impl<'a> ChatSession<'a> {
    fn new(agent: &'a ChatAgent, custom_inputs: Option<Map<String, Value>>) -> Self {
        Self {
            agent,
            context: ChatContext {
                conversation_id: Some(Uuid::new_v4().to_string()),
                user_id: None,
            },
            custom_inputs,
            history: Vec::new(),
        }
    }

    fn clear_history(&mut self) {
        self.history.clear();
        self.context.conversation_id = Some(Uuid::new_v4().to_string());
    }

    /// Send a message and print the agent's messages as they arrive.
    ///
    /// History only grows when the turn completes, so a failed turn can be retried.
    async fn send_message(&mut self, user_input: &str) -> Result<()> {
        let mut messages = self.history.clone();
        messages.push(ChatAgentMessage::user(user_input));

        let mut chunks = self.agent.predict_stream(
            messages.clone(),
            Some(self.context.clone()),
            self.custom_inputs.clone(),
        );
        while let Some(chunk) = chunks.next().await {
            let delta = chunk?.delta;
            Output::message(&delta);
            messages.push(delta);
        }

        debug!("Conversation now has {} messages", messages.len());
        self.history = messages;
        Ok(())
    }
}
