//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod init;
mod serve;
mod tools;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use init::run_init;
pub use serve::{router, run_serve, AppState};
pub use tools::run_tools;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// `custom_inputs` carrying a step limit from the command line.
fn step_inputs(max_steps: Option<usize>) -> Option<Map<String, Value>> {
    max_steps.map(|steps| {
        let mut inputs = Map::new();
        inputs.insert("max_steps".to_string(), Value::from(steps));
        inputs
    })
}

/// A token that is cancelled when the user presses Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_inputs() {
        assert!(step_inputs(None).is_none());
        let inputs = step_inputs(Some(4)).unwrap();
        assert_eq!(inputs["max_steps"], 4);
    }
}
