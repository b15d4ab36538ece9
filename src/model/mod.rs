//! Language model access.
//!
//! [`ChatModel`] is the seam to the inference service: one call in, one
//! assistant message out. [`ModelInvoker`] adds the system preamble, binds
//! the tool registry and retries failed calls.

mod invoker;
mod openai;

pub use invoker::{ModelInvoker, DEFAULT_MAX_RETRIES};
pub use openai::{create_client, OpenAIChatModel};

use crate::error::Result;
use crate::message::Message;
use crate::tools::ToolSpec;
use async_trait::async_trait;

/// A chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate the next assistant message for `messages`, with `tools` bound.
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message>;

    /// Model or endpoint name, for logging.
    fn name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted model used across the crate's tests.

    use super::*;
    use crate::error::AgentOpsError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of replies and failures, recording every request.
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<Result<Message>>>,
        requests: Mutex<Vec<(Vec<Message>, Vec<ToolSpec>)>>,
    }

    impl ScriptedModel {
        pub fn new(replies: Vec<Result<Message>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// A model that only ever succeeds, with these replies in order.
        pub fn replying(replies: Vec<Message>) -> Self {
            Self::new(replies.into_iter().map(Ok).collect())
        }

        /// A model whose first `count` calls fail, then replies with `reply`.
        pub fn failing_then(count: usize, reply: Option<Message>) -> Self {
            let mut replies: Vec<Result<Message>> = (0..count)
                .map(|i| Err(AgentOpsError::Model(format!("503 attempt {}", i + 1))))
                .collect();
            replies.extend(reply.map(Ok));
            Self::new(replies)
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn request(&self, index: usize) -> (Vec<Message>, Vec<ToolSpec>) {
            self.requests.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Message> {
            self.requests
                .lock()
                .unwrap()
                .push((messages.to_vec(), tools.to_vec()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AgentOpsError::Model("script exhausted".to_string())))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }
}
