//! Pre-flight checks before talking to the workspace.
//!
//! Validates that credentials and required settings are present before
//! starting operations that would otherwise fail on the first request.

use crate::config::Settings;
use crate::error::{AgentOpsError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering questions needs the model and every enabled tool.
    Ask,
    /// Listing tools needs tool credentials only.
    ListTools,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_tool_settings(settings)?;
    if tools_enabled(settings) {
        check_env(&settings.tools.host_env)?;
        check_env(&settings.tools.token_env)?;
    }
    if let Operation::Ask = operation {
        if settings.model.api_base.is_none() {
            check_env(&settings.model.host_env)?;
        }
        check_env(&settings.model.api_key_env)?;
    }
    Ok(())
}

fn tools_enabled(settings: &Settings) -> bool {
    settings.enabled_functions().next().is_some() || settings.tools.retriever.enabled
}

/// Settings that must be filled in before tools can be registered.
fn check_tool_settings(settings: &Settings) -> Result<()> {
    if settings.enabled_functions().next().is_some() && settings.tools.warehouse_id.is_empty() {
        return Err(AgentOpsError::Config(
            "tools.warehouse_id is not set. Set it with: agentops config edit".to_string(),
        ));
    }
    Ok(())
}

/// Check that an environment variable is set and non-empty.
fn check_env(name: &str) -> Result<()> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(()),
        Ok(_) => Err(AgentOpsError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            name, name
        ))),
        Err(_) => Err(AgentOpsError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            name, name
        ))),
    }
}
