//! Recovery strategies per error kind.
//!
//! Strategy computation is pure: it reads only the kind and the context and
//! never touches the error ledger.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kind::ErrorKind;

/// How the caller should react to a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStrategy {
    /// Retry with a simplified prompt instead of the full template
    pub use_simple_prompt: bool,

    /// Template to use instead of the failing one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_template: Option<String>,

    /// Human-readable description of the failure
    pub error_message: String,
}

impl RecoveryStrategy {
    /// A strategy that only reports the failure.
    pub fn report(message: impl Into<String>) -> Self {
        Self {
            use_simple_prompt: false,
            fallback_template: None,
            error_message: message.into(),
        }
    }

    /// Whether the strategy asks for any degraded retry.
    pub fn has_fallback(&self) -> bool {
        self.use_simple_prompt || self.fallback_template.is_some()
    }
}

/// Compute the recovery strategy for `kind`.
///
/// Context fields used when present:
/// - `template_id` (template-parse-error)
/// - `variable` (variable-substitution-error)
/// - `details` string or `errors` list (validation-error)
/// - `setting` (configuration-error)
/// - `prompt_id`, `available_prompts` (prompt-not-found)
///
/// Any other shape, including a non-object context, is tolerated.
pub fn handle_error(kind: ErrorKind, context: &Value) -> RecoveryStrategy {
    let message = match kind {
        ErrorKind::TemplateParse => match str_field(context, "template_id") {
            Some(id) => format!(
                "Failed to parse prompt template '{}'. Please check the template format.",
                id
            ),
            None => "Failed to parse prompt template. Please check the template format."
                .to_string(),
        },
        ErrorKind::VariableSubstitution => match str_field(context, "variable") {
            Some(variable) => format!(
                "Failed to substitute variable '{}' in prompt template.",
                variable
            ),
            None => "Failed to substitute variables in prompt template.".to_string(),
        },
        ErrorKind::Validation => match validation_details(context) {
            Some(details) => format!("Validation failed: {}", details),
            None => "Validation failed.".to_string(),
        },
        ErrorKind::Configuration => match str_field(context, "setting") {
            Some(setting) => format!(
                "Invalid configuration value for '{}'. Please check your settings.",
                setting
            ),
            None => "Invalid configuration. Please check your settings.".to_string(),
        },
        ErrorKind::PromptNotFound => {
            let id = str_field(context, "prompt_id").unwrap_or("unknown");
            match string_list(context, "available_prompts") {
                Some(available) if !available.is_empty() => format!(
                    "Prompt '{}' not found. Available prompts: {}",
                    id,
                    available.join(", ")
                ),
                _ => format!("Prompt '{}' not found.", id),
            }
        }
        ErrorKind::Unknown => "An unknown error occurred. Please try again.".to_string(),
    };

    RecoveryStrategy::report(message)
}

fn str_field<'a>(context: &'a Value, key: &str) -> Option<&'a str> {
    context.get(key).and_then(Value::as_str)
}

fn string_list<'a>(context: &'a Value, key: &str) -> Option<Vec<&'a str>> {
    context
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
}

fn validation_details(context: &Value) -> Option<String> {
    if let Some(details) = str_field(context, "details") {
        return Some(details.to_string());
    }
    string_list(context, "errors")
        .filter(|errors| !errors.is_empty())
        .map(|errors| errors.join("; "))
}
