//! Tools command - list what the model can call.

use crate::cli::preflight::{self, Operation};
use crate::cli::{content_preview, Output};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::tools::ToolSpec;
use anyhow::Result;

/// Run the tools command.
pub fn run_tools(settings: &Settings) -> Result<()> {
    preflight::check(Operation::ListTools, settings)?;
    let registry = Orchestrator::build_registry(settings)?;

    Output::header("Tools");
    if registry.is_empty() {
        Output::warning("No tools enabled. The model will answer without tools.");
        return Ok(());
    }

    for spec in registry.specs() {
        Output::list_item(&describe(&spec));
    }
    println!();
    Output::kv("Catalog", &format!("{}.{}", settings.tools.uc_catalog, settings.tools.schema));
    Ok(())
}

/// One-line summary: `name(arg, ...) - description`.
fn describe(spec: &ToolSpec) -> String {
    let arguments = spec.parameters["properties"]
        .as_object()
        .map(|properties| properties.keys().cloned().collect::<Vec<_>>().join(", "))
        .unwrap_or_default();
    format!(
        "{}({}) - {}",
        spec.name,
        arguments,
        content_preview(&spec.description, 80)
    )
}
