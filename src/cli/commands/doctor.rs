//! Doctor command - verify credentials and configuration.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("agentops doctor");
    println!();
    println!("Checking credentials and configuration...\n");

    let mut checks = Vec::new();

    println!("{}", style("Model Endpoint").bold());
    let mut model_checks = Vec::new();
    match &settings.model.api_base {
        Some(base) => model_checks.push(CheckResult::ok("API base", base)),
        None => model_checks.push(check_host(&settings.model.host_env)),
    }
    model_checks.push(check_token(&settings.model.api_key_env));
    model_checks.push(CheckResult::ok("Endpoint", &settings.model.endpoint));
    for check in &model_checks {
        check.print();
    }
    checks.extend(model_checks);

    println!();

    println!("{}", style("Tools").bold());
    let tool_checks = check_tools(settings);
    for check in &tool_checks {
        check.print();
    }
    checks.extend(tool_checks);

    println!();

    println!("{}", style("Configuration").bold());
    let config_check = check_config_file(config_path);
    config_check.print();
    checks.push(config_check);

    println!();

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using agentops.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! agentops is ready to use.");
    }

    Ok(())
}

/// Check a workspace host variable.
fn check_host(name: &str) -> CheckResult {
    match std::env::var(name) {
        Ok(host) if !host.is_empty() => CheckResult::ok(name, &host),
        _ => CheckResult::error(
            name,
            "not set",
            &format!("Set with: export {}='https://<workspace>.cloud.databricks.com'", name),
        ),
    }
}

/// Check a token variable without printing it.
fn check_token(name: &str) -> CheckResult {
    match std::env::var(name) {
        Ok(token) => token_result(name, &token),
        Err(_) => CheckResult::error(name, "not set", &format!("Set with: export {}='dapi...'", name)),
    }
}

fn token_result(name: &str, token: &str) -> CheckResult {
    if token.is_empty() {
        CheckResult::error(name, "empty", &format!("Set with: export {}='dapi...'", name))
    } else if token.chars().count() > 12 {
        let head: String = token.chars().take(4).collect();
        let tail: String = token.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        let masked = format!("{}...{}", head, tail);
        CheckResult::ok(name, &format!("configured ({})", masked))
    } else {
        CheckResult::warning(
            name,
            "set but looks too short",
            "Expected a personal access token",
        )
    }
}

/// Check tool settings and credentials.
fn check_tools(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let functions: Vec<&str> = settings.enabled_functions().map(|f| f.name.as_str()).collect();

    if functions.is_empty() && !settings.tools.retriever.enabled {
        results.push(CheckResult::warning(
            "Tools",
            "none enabled",
            "The model will answer without tools",
        ));
        return results;
    }

    results.push(check_host(&settings.tools.host_env));
    results.push(check_token(&settings.tools.token_env));

    if !functions.is_empty() {
        if settings.tools.warehouse_id.is_empty() {
            results.push(CheckResult::error(
                "Warehouse",
                "tools.warehouse_id is not set",
                "Set it with: agentops config edit",
            ));
        } else {
            results.push(CheckResult::ok("Warehouse", &settings.tools.warehouse_id));
        }
        results.push(CheckResult::ok(
            "Functions",
            &format!(
                "{}.{}: {}",
                settings.tools.uc_catalog,
                settings.tools.schema,
                functions.join(", ")
            ),
        ));
    }

    if settings.tools.retriever.enabled {
        results.push(CheckResult::ok(
            "Retriever",
            &format!(
                "{}.{}.{}",
                settings.tools.uc_catalog, settings.tools.schema, settings.tools.vector_search_index
            ),
        ));
    }

    // Registry construction catches invalid identifiers and duplicate names
    if results.iter().all(|r| r.status != CheckStatus::Error) {
        if let Err(e) = Orchestrator::build_registry(settings) {
            results.push(CheckResult::error(
                "Registry",
                &e.to_string(),
                "Check the [tools] section of the config",
            ));
        }
    }

    results
}

/// Check if config file exists.
fn check_config_file(config_path: &Path) -> CheckResult {
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: agentops init (or agentops config edit)",
        )
    }
}
