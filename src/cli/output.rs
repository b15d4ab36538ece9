//! CLI output formatting utilities.

use crate::agent::ChatAgentMessage;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print one message produced by the agent.
    ///
    /// Tool traffic is shown dimmed; the assistant's text is printed in full.
    pub fn message(message: &ChatAgentMessage) {
        match message.role.as_str() {
            "assistant" => {
                for call in message.tool_calls.iter().flatten() {
                    println!(
                        "  {} {}",
                        style(format!("[{}]", call.function.name)).dim(),
                        style(content_preview(&call.function.arguments, 120)).dim()
                    );
                }
                if !message.content.is_empty() {
                    println!("\n{} {}\n", style("Agent:").cyan().bold(), message.content);
                }
            }
            "tool" => {
                let name = message.name.as_deref().unwrap_or("tool");
                let icon = if message.content.starts_with("Error:") {
                    style("✗").red()
                } else {
                    style("✓").green()
                };
                println!(
                    "  {} {} {}",
                    icon,
                    style(name).dim(),
                    style(content_preview(&message.content, 120)).dim()
                );
            }
            _ => Self::warning(&message.content),
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Flatten newlines and truncate with an ellipsis.
pub fn content_preview(content: &str, max_len: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_len {
        content
    } else {
        let truncated: String = content.chars().take(max_len).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("short", 10), "short");
        assert_eq!(content_preview("line one\nline two", 8), "line one...");
        assert_eq!(content_preview("ééééé", 3), "ééé...");
    }
}
