//! System prompt rendering.
//!
//! The system preamble may reference `{{variable}}` placeholders. Custom
//! variables come from `[prompts.variables]`; `uc_catalog` and `schema` are
//! always available.

use super::Settings;
use std::collections::HashMap;

/// Prompt templates with their substitution variables.
#[derive(Debug, Clone, Default)]
pub struct Prompts {
    /// System preamble template.
    pub system: String,
    /// Variables available in all prompts.
    pub variables: HashMap<String, String>,
}

impl Prompts {
    /// Build prompts from settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut variables = HashMap::new();
        variables.insert("uc_catalog".to_string(), settings.tools.uc_catalog.clone());
        variables.insert("schema".to_string(), settings.tools.schema.clone());
        // Custom variables override the built-ins
        for (key, value) in &settings.prompts.variables {
            variables.insert(key.clone(), value.clone());
        }

        Self {
            system: settings.agent.system_prompt.clone(),
            variables,
        }
    }

    /// Render a template by replacing `{{key}}` with values.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// The system preamble with every variable substituted.
    pub fn system_preamble(&self) -> String {
        Self::render(&self.system, &self.variables)
    }
}
