//! Bounded-retry wrapper around one model call.

use super::ChatModel;
use crate::error::{AgentOpsError, Result};
use crate::graph::InvocationContext;
use crate::message::{ConversationState, Message};
use crate::tools::{ToolRegistry, ToolSpec};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Additional attempts after the first failed model call.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Calls the model with the system preamble and every registered tool bound.
///
/// A failed call is repeated immediately with the same input until it
/// succeeds or the retry budget runs out, in which case the invocation fails
/// with [`AgentOpsError::ModelUnavailable`] carrying the last cause.
/// Cancellation and a passed deadline are never retried.
#[derive(Clone)]
pub struct ModelInvoker {
    model: Arc<dyn ChatModel>,
    tools: Vec<ToolSpec>,
    preamble: String,
    max_retries: u32,
}

impl ModelInvoker {
    pub fn new(model: Arc<dyn ChatModel>, registry: &ToolRegistry) -> Self {
        Self {
            model,
            tools: registry.specs(),
            preamble: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set the system preamble prepended to every call.
    pub fn with_preamble<S: Into<String>>(mut self, preamble: S) -> Self {
        self.preamble = preamble.into();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// The messages the model sees: the preamble as a system message, then
    /// the history. The system message is sent even when the preamble is empty.
    fn model_input(&self, state: &ConversationState) -> Vec<Message> {
        let mut input = Vec::with_capacity(state.len() + 1);
        input.push(Message::system(self.preamble.clone()));
        input.extend_from_slice(state.messages());
        input
    }

    /// Produce the next assistant message. Does not modify `state`.
    #[instrument(skip_all, fields(model = %self.model.name(), history = state.len()))]
    pub async fn invoke(
        &self,
        state: &ConversationState,
        ctx: &InvocationContext,
    ) -> Result<Message> {
        let input = self.model_input(state);
        let mut remaining = self.max_retries;

        loop {
            let outcome = ctx
                .guard(self.model.complete(&input, &self.tools))
                .await
                .and_then(|reply| reply);

            match outcome {
                Ok(reply) => {
                    debug!("Model call succeeded with {} retries left", remaining);
                    return Ok(reply);
                }
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) if remaining == 0 => {
                    warn!("Model call failed, no retries left: {}", e);
                    return Err(AgentOpsError::ModelUnavailable {
                        attempts: self.max_retries + 1,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    remaining -= 1;
                    warn!("Model call failed ({} retries left): {}", remaining, e);
                }
            }
        }
    }
}

impl std::fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("model", &self.model.name())
            .field("tools", &self.tools.len())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
