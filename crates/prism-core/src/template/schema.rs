//! JSON Schema validation for prompt templates.
//!
//! The schema checks field types before deserialization. Structural
//! completeness (non-empty task, context object, ...) is left to
//! [`validate_template`](crate::resolver::validate_template) so that its
//! messages stay stable.

use std::sync::OnceLock;

/// Embedded template schema (loaded at compile time).
const TEMPLATE_SCHEMA_JSON: &str = include_str!("../../../../schema/prompt-template.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(TEMPLATE_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(|e| e.clone())
}

/// Validate a raw template value against the schema.
///
/// Returns every violation, each suffixed with its location.
pub fn validate_template_schema(template_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(template_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
