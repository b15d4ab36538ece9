//! Init command - interactive first-run setup.

use crate::cli::Output;
use crate::config::Settings;
use console::style;
use std::io::{self, Write};
use std::path::Path;

/// Run the init command for first-time setup.
pub fn run_init(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("agentops setup");
    println!();
    println!("Let's make sure everything is configured correctly.\n");

    // Step 1: Credentials
    println!("{}", style("Step 1: Checking credentials").bold().cyan());
    println!();

    let missing = missing_variables(settings);
    if missing.is_empty() {
        Output::success("Workspace host and token are configured!");
    } else {
        for name in &missing {
            Output::warning(&format!("{} environment variable is not set.", name));
        }
        println!();
        println!("  Set them in your shell configuration (~/.bashrc, ~/.zshrc, etc.):");
        println!(
            "  {}",
            style("export DATABRICKS_HOST='https://<workspace>.cloud.databricks.com'").green()
        );
        println!("  {}", style("export DATABRICKS_TOKEN='dapi...'").green());
        println!();

        if !prompt_continue("Continue without credentials?")? {
            println!();
            Output::info("Setup cancelled. Set your credentials and run 'agentops init' again.");
            return Ok(());
        }
    }

    println!();

    // Step 2: Config file
    println!("{}", style("Step 2: Configuration file").bold().cyan());
    println!();

    if config_path.exists() {
        Output::info(&format!("Config file exists: {}", config_path.display()));
    } else if prompt_continue("Create default configuration file?")? {
        settings.save_to(&config_path.to_path_buf())?;
        Output::success(&format!("Created config file: {}", config_path.display()));
        println!();
        println!("  Set tools.warehouse_id with: {}", style("agentops config edit").green());
    } else {
        Output::info("Skipped config file creation. Using defaults.");
    }

    println!();

    // Summary
    println!("{}", style("Setup Complete!").bold().green());
    println!();
    println!("Next steps:");
    println!("  {} Check credentials and settings", style("agentops doctor").cyan());
    println!("  {} See the tools the model can call", style("agentops tools").cyan());
    println!("  {} Ask your first question", style("agentops ask \"<question>\"").cyan());
    println!();
    println!("For more help: {}", style("agentops --help").cyan());

    Ok(())
}

/// Environment variables the configuration refers to that are not set.
fn missing_variables(settings: &Settings) -> Vec<String> {
    let mut names = vec![
        settings.model.api_key_env.clone(),
        settings.tools.host_env.clone(),
        settings.tools.token_env.clone(),
    ];
    if settings.model.api_base.is_none() {
        names.push(settings.model.host_env.clone());
    }
    names.sort();
    names.dedup();
    names.retain(|name| std::env::var(name).map(|v| v.is_empty()).unwrap_or(true));
    names
}

/// Prompt user for yes/no confirmation.
fn prompt_continue(message: &str) -> io::Result<bool> {
    print!("{} {} ", style("?").cyan(), message);
    print!("{} ", style("[y/N]").dim());
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let answer = input.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
