//! Decides where the graph goes after an `agent` step.

use crate::message::Message;

/// Outcome of routing the latest model reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The reply requests tool calls.
    Tools,
    /// The reply is final.
    Done,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Tools => "tools",
            Route::Done => "done",
        }
    }
}

/// Route on the presence of tool calls in `last`.
pub fn route(last: &Message) -> Route {
    if last.has_tool_calls() {
        Route::Tools
    } else {
        Route::Done
    }
}
