//! Template validation and variable substitution.
//!
//! Resolution never mutates the source template: the body is cloned and every
//! string reachable in the clone is rewritten in place.
//!
//! Substitution policy for a `${path}` token:
//! - path resolves: replaced by the value's text ([`Variable::render`](crate::variables::Variable::render))
//! - path does not resolve: token kept verbatim
//! - value contains a reference cycle: replaced by [`CYCLE_MARKER`](crate::variables::CYCLE_MARKER)

use regex::Captures;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::patterns::{placeholder_paths, PLACEHOLDER_PATTERN};
use crate::template::{
    PromptTemplate, TemplateBody, TemplateCategory, TemplateError, TemplateMetadata,
};
use crate::variables::VariableSet;

pub const ERR_MISSING_BODY: &str = "Template body is missing";
pub const ERR_MISSING_TASK: &str = "Template must have a non-empty task";
pub const ERR_MISSING_INSTRUCTIONS: &str = "Template must have non-empty instructions";
pub const ERR_MISSING_CONTEXT: &str = "Template must have a context object";
pub const ERR_MISSING_OUTPUT_FORMAT: &str = "Template must have an output_format object";
pub const WARN_MISSING_VARIABLES: &str = "Template does not declare its variables";

/// Outcome of structural template validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TemplateValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Check that a template body has everything resolution needs.
///
/// Each field is checked independently, so one failure never hides another.
/// A missing `variables` declaration is only a warning.
pub fn validate_template(body: Option<&TemplateBody>) -> TemplateValidation {
    let Some(body) = body else {
        return TemplateValidation {
            is_valid: false,
            errors: vec![ERR_MISSING_BODY.to_string()],
            warnings: Vec::new(),
        };
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if body.task.is_empty() {
        errors.push(ERR_MISSING_TASK.to_string());
    }
    if body.instructions.is_empty() {
        errors.push(ERR_MISSING_INSTRUCTIONS.to_string());
    }
    if !matches!(body.context, Some(Value::Object(_))) {
        errors.push(ERR_MISSING_CONTEXT.to_string());
    }
    if !matches!(body.output_format, Some(Value::Object(_))) {
        errors.push(ERR_MISSING_OUTPUT_FORMAT.to_string());
    }
    if body.variables.is_none() {
        warnings.push(WARN_MISSING_VARIABLES.to_string());
    }

    TemplateValidation {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// A template body with its placeholders resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedPayload {
    pub template_id: String,
    pub category: TemplateCategory,
    pub body: TemplateBody,

    /// Every path referenced by a token, resolved or not, in first-seen order
    pub variables_used: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,
}

impl ResolvedPayload {
    /// Paths of placeholders still present in the body.
    pub fn unresolved_placeholders(&self) -> Vec<String> {
        let mut seen = PathTracker::default();
        let mut collect = |text: &str| {
            for path in placeholder_paths(text) {
                seen.record(path);
            }
        };

        collect(&self.body.task);
        if let Some(context) = &self.body.context {
            visit_strings(context, &mut collect);
        }
        collect(&self.body.instructions);
        if let Some(format) = &self.body.output_format {
            visit_strings(format, &mut collect);
        }
        seen.into_paths()
    }
}

/// Replace every `${path}` token in `text` in a single pass.
pub fn substitute_variables(text: &str, variables: &VariableSet) -> String {
    substitute_tracked(text, variables, &mut PathTracker::default())
}

/// Resolve `template` against `variables`.
///
/// Fails with [`TemplateError::InvalidTemplate`] when structural validation
/// reports errors; nothing is substituted in that case.
pub fn process_template(
    template: &PromptTemplate,
    variables: &VariableSet,
) -> Result<ResolvedPayload, TemplateError> {
    let validation = validate_template(template.template.as_ref());
    if !validation.is_valid {
        tracing::warn!(
            template_id = %template.id,
            errors = ?validation.errors,
            "Rejecting structurally invalid template"
        );
        return Err(TemplateError::InvalidTemplate {
            template_id: template.id.clone(),
            errors: validation.errors,
        });
    }
    for warning in &validation.warnings {
        tracing::debug!(template_id = %template.id, warning = %warning, "Template warning");
    }

    let mut body = template
        .template
        .clone()
        .ok_or_else(|| TemplateError::InvalidTemplate {
            template_id: template.id.clone(),
            errors: vec![ERR_MISSING_BODY.to_string()],
        })?;

    let mut used = PathTracker::default();
    body.task = substitute_tracked(&body.task, variables, &mut used);
    if let Some(context) = body.context.as_mut() {
        substitute_value(context, variables, &mut used);
    }
    body.instructions = substitute_tracked(&body.instructions, variables, &mut used);
    if let Some(format) = body.output_format.as_mut() {
        substitute_value(format, variables, &mut used);
    }

    let variables_used = used.into_paths();
    tracing::debug!(
        template_id = %template.id,
        variables_used = variables_used.len(),
        "Template resolved"
    );

    Ok(ResolvedPayload {
        template_id: template.id.clone(),
        category: template.category,
        body,
        variables_used,
        metadata: template.metadata.clone(),
    })
}

fn substitute_tracked(text: &str, variables: &VariableSet, used: &mut PathTracker) -> String {
    PLACEHOLDER_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            let path = &caps[1];
            used.record(path);
            match variables.lookup(path) {
                Some(value) => value.render(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn substitute_value(value: &mut Value, variables: &VariableSet, used: &mut PathTracker) {
    match value {
        Value::String(text) => *text = substitute_tracked(text, variables, used),
        Value::Array(items) => {
            for item in items {
                substitute_value(item, variables, used);
            }
        }
        Value::Object(object) => {
            for child in object.values_mut() {
                substitute_value(child, variables, used);
            }
        }
        _ => {}
    }
}

fn visit_strings<F: FnMut(&str)>(value: &Value, visit: &mut F) {
    match value {
        Value::String(text) => visit(text),
        Value::Array(items) => {
            for item in items {
                visit_strings(item, visit);
            }
        }
        Value::Object(object) => {
            for child in object.values() {
                visit_strings(child, visit);
            }
        }
        _ => {}
    }
}

/// Deduplicating, order-preserving path list.
#[derive(Default)]
struct PathTracker {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl PathTracker {
    fn record(&mut self, path: &str) {
        if self.seen.insert(path.to_string()) {
            self.order.push(path.to_string());
        }
    }

    fn into_paths(self) -> Vec<String> {
        self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{VarMap, Variable, CYCLE_MARKER};
    use proptest::prelude::*;
    use serde_json::json;

    fn review_body() -> TemplateBody {
        TemplateBody {
            task: "Review the ${language} code".to_string(),
            context: Some(json!({
                "file": "${file.path}",
                "lines": ["${range.start}", "${range.end}"],
                "static": 3
            })),
            instructions: "Explain for a ${user.experience} developer.".to_string(),
            output_format: Some(json!({ "summary": "string", "tone": "${tone}" })),
            variables: Some(vec![
                "language".to_string(),
                "file.path".to_string(),
                "range.start".to_string(),
                "range.end".to_string(),
                "user.experience".to_string(),
                "tone".to_string(),
            ]),
        }
    }

    fn review_template() -> PromptTemplate {
        PromptTemplate::new("code-review", "Code Review", review_body())
            .with_category(TemplateCategory::CodeReview)
    }

    fn full_variables() -> VariableSet {
        VariableSet::from_json(json!({
            "language": "TypeScript",
            "file": { "path": "src/app.ts" },
            "range": { "start": 10, "end": 24 },
            "user": { "experience": "junior" },
            "tone": "friendly"
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_template() {
        let result = validate_template(Some(&review_body()));
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_body() {
        let result = validate_template(None);
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec![ERR_MISSING_BODY]);
    }

    #[test]
    fn test_each_missing_field_reported_independently() {
        fn clear_task(b: &mut TemplateBody) {
            b.task.clear();
        }
        fn clear_instructions(b: &mut TemplateBody) {
            b.instructions.clear();
        }
        fn drop_context(b: &mut TemplateBody) {
            b.context = None;
        }
        fn drop_output_format(b: &mut TemplateBody) {
            b.output_format = None;
        }

        let cases: [(fn(&mut TemplateBody), &str); 4] = [
            (clear_task, ERR_MISSING_TASK),
            (clear_instructions, ERR_MISSING_INSTRUCTIONS),
            (drop_context, ERR_MISSING_CONTEXT),
            (drop_output_format, ERR_MISSING_OUTPUT_FORMAT),
        ];

        for (break_field, expected) in cases {
            let mut body = review_body();
            break_field(&mut body);
            let result = validate_template(Some(&body));
            assert!(!result.is_valid);
            assert_eq!(result.errors, vec![expected]);
        }
    }

    #[test]
    fn test_all_errors_collected() {
        let result = validate_template(Some(&TemplateBody::default()));
        assert_eq!(result.errors.len(), 4);
        assert_eq!(result.warnings, vec![WARN_MISSING_VARIABLES]);
    }

    #[test]
    fn test_non_object_context_is_error() {
        let mut body = review_body();
        body.context = Some(json!("not a map"));
        body.output_format = Some(json!(["list"]));
        let result = validate_template(Some(&body));
        assert_eq!(result.errors, vec![ERR_MISSING_CONTEXT, ERR_MISSING_OUTPUT_FORMAT]);
    }

    #[test]
    fn test_missing_variables_is_only_a_warning() {
        let mut body = review_body();
        body.variables = None;
        let result = validate_template(Some(&body));
        assert!(result.is_valid);
        assert_eq!(result.warnings, vec![WARN_MISSING_VARIABLES]);
    }

    #[test]
    fn test_substitute_example() {
        let vars = VariableSet::new().with("language", "TypeScript");
        assert_eq!(
            substitute_variables("Review the ${language} code", &vars),
            "Review the TypeScript code"
        );
    }

    #[test]
    fn test_missing_variable_preserved() {
        let vars = VariableSet::new();
        assert_eq!(
            substitute_variables("Review the ${language} code", &vars),
            "Review the ${language} code"
        );
        // Partially resolvable path is also preserved
        let vars = VariableSet::new().with("user", VarMap::new());
        assert_eq!(
            substitute_variables("${user.experience}", &vars),
            "${user.experience}"
        );
    }

    #[test]
    fn test_null_and_undefined_leaves_are_stringified() {
        let vars = VariableSet::new()
            .with("a", Variable::Null)
            .with("b", Variable::Undefined);
        assert_eq!(substitute_variables("${a}/${b}/${c}", &vars), "null/undefined/${c}");
    }

    #[test]
    fn test_scalars_and_repeats() {
        let vars = VariableSet::new().with("n", 7i64).with("ok", false);
        assert_eq!(
            substitute_variables("${n} ${ok} ${n}", &vars),
            "7 false 7"
        );
    }

    #[test]
    fn test_stray_dollars_and_braces_untouched() {
        let vars = VariableSet::new().with("x", "X");
        assert_eq!(
            substitute_variables("cost: $5 {not} ${} $${x} ${x}}", &vars),
            "cost: $5 {not} ${} $X X}"
        );
    }

    #[test]
    fn test_cycle_substitutes_marker() {
        let vars = VariableSet::new();
        let node = VarMap::new();
        node.insert("self", node.clone());
        vars.insert("node", node);

        assert_eq!(substitute_variables("${node}", &vars), CYCLE_MARKER);
        // Descending through the cycle reaches the same map
        assert_eq!(substitute_variables("${node.self.self}", &vars), CYCLE_MARKER);
    }

    #[test]
    fn test_process_full_coverage() {
        let template = review_template();
        let payload = process_template(&template, &full_variables()).unwrap();

        assert_eq!(payload.body.task, "Review the TypeScript code");
        assert_eq!(payload.body.instructions, "Explain for a junior developer.");
        assert_eq!(payload.body.context.as_ref().unwrap()["lines"], json!(["10", "24"]));
        assert_eq!(payload.body.context.as_ref().unwrap()["static"], json!(3));
        assert_eq!(payload.body.output_format.as_ref().unwrap()["tone"], json!("friendly"));
        assert!(payload.unresolved_placeholders().is_empty());

        let mut used = payload.variables_used.clone();
        let mut declared = template.declared_variables().to_vec();
        used.sort();
        declared.sort();
        assert_eq!(used, declared);
    }

    #[test]
    fn test_process_partial_coverage_reports_referenced() {
        let template = review_template();
        let vars = VariableSet::new().with("language", "Rust");
        let payload = process_template(&template, &vars).unwrap();

        assert_eq!(payload.body.task, "Review the Rust code");
        assert_eq!(payload.body.context.as_ref().unwrap()["file"], json!("${file.path}"));
        assert_eq!(payload.variables_used.len(), 6);
        assert_eq!(payload.variables_used[0], "language");
        assert_eq!(payload.unresolved_placeholders().len(), 5);
    }

    #[test]
    fn test_process_lists_repeated_paths_once() {
        let body = TemplateBody {
            task: "${a} then ${a} and ${b.c}".to_string(),
            context: Some(json!({ "first": "${a}", "nested": ["${b.c}"] })),
            instructions: "Use ${a} with ${b.c}.".to_string(),
            output_format: Some(json!({ "echo": "${b.c}" })),
            variables: Some(vec!["a".to_string(), "b.c".to_string()]),
        };
        let template = PromptTemplate::new("repeats", "Repeats", body);
        let vars = VariableSet::from_json(json!({ "a": "x", "b": { "c": "y" } })).unwrap();

        let payload = process_template(&template, &vars).unwrap();
        assert_eq!(payload.body.task, "x then x and y");
        assert_eq!(payload.variables_used, vec!["a", "b.c"]);

        // Unresolved repeats are listed once too
        let payload = process_template(&template, &VariableSet::new()).unwrap();
        assert_eq!(payload.variables_used, vec!["a", "b.c"]);
        assert_eq!(payload.unresolved_placeholders(), vec!["a", "b.c"]);
    }

    #[test]
    fn test_process_example_from_empty_variables() {
        let body = TemplateBody {
            task: "Review the ${language} code".to_string(),
            context: Some(json!({})),
            instructions: "Review it.".to_string(),
            output_format: Some(json!({})),
            variables: Some(vec!["language".to_string()]),
        };
        let template = PromptTemplate::new("t", "T", body);
        let payload = process_template(&template, &VariableSet::new()).unwrap();
        assert_eq!(payload.body.task, "Review the ${language} code");
        assert_eq!(payload.variables_used, vec!["language"]);
    }

    #[test]
    fn test_process_does_not_mutate_template() {
        let template = review_template();
        let snapshot = template.clone();

        process_template(&template, &full_variables()).unwrap();
        process_template(&template, &VariableSet::new().with("language", "Go")).unwrap();

        assert_eq!(template, snapshot);
    }

    #[test]
    fn test_process_rejects_invalid_template() {
        let mut body = review_body();
        body.task.clear();
        body.context = None;
        let template = PromptTemplate::new("broken", "Broken", body);

        match process_template(&template, &full_variables()) {
            Err(TemplateError::InvalidTemplate { template_id, errors }) => {
                assert_eq!(template_id, "broken");
                assert_eq!(errors, vec![ERR_MISSING_TASK, ERR_MISSING_CONTEXT]);
            }
            other => panic!("expected InvalidTemplate, got {:?}", other),
        }
    }

    #[test]
    fn test_process_rejects_missing_body() {
        let mut template = review_template();
        template.template = None;
        let err = process_template(&template, &VariableSet::new()).unwrap_err();
        assert!(err.to_string().contains(ERR_MISSING_BODY));
    }

    #[test]
    fn test_process_carries_metadata() {
        let metadata = TemplateMetadata {
            supported_languages: vec!["rust".to_string()],
            required_context: vec!["code".to_string()],
            performance_notes: Some("Large files are truncated".to_string()),
        };
        let template = review_template().with_metadata(metadata.clone());
        let payload = process_template(&template, &full_variables()).unwrap();
        assert_eq!(payload.metadata, Some(metadata));
        assert_eq!(payload.category, TemplateCategory::CodeReview);
    }

    #[test]
    fn test_process_with_cyclic_variable() {
        let vars = full_variables();
        let me = VarMap::new();
        me.insert("me", me.clone());
        vars.insert("tone", me);

        let payload = process_template(&review_template(), &vars).unwrap();
        assert_eq!(payload.body.output_format.unwrap()["tone"], json!(CYCLE_MARKER));
    }

    proptest! {
        #[test]
        fn prop_text_without_tokens_is_unchanged(text in "[^$]*") {
            let vars = VariableSet::new().with("x", "y");
            prop_assert_eq!(substitute_variables(&text, &vars), text);
        }

        #[test]
        fn prop_missing_variables_preserve_text(name in "[a-z][a-z0-9_]{0,8}") {
            let text = format!("before ${{{}}} after", name);
            prop_assert_eq!(substitute_variables(&text, &VariableSet::new()), text);
        }

        #[test]
        fn prop_string_values_substitute_verbatim(value in "[a-zA-Z0-9 ]{0,20}") {
            let vars = VariableSet::new().with("v", value.as_str());
            prop_assert_eq!(substitute_variables("<${v}>", &vars), format!("<{}>", value));
        }

        #[test]
        fn prop_variables_used_has_no_duplicates(
            paths in proptest::collection::vec("[a-c](\\.[a-c])?", 1..12)
        ) {
            let task = paths.iter().map(|p| format!("${{{}}}", p)).collect::<Vec<_>>().join(" ");
            let body = TemplateBody {
                task,
                context: Some(json!({})),
                instructions: "go".to_string(),
                output_format: Some(json!({})),
                variables: None,
            };
            let template = PromptTemplate::new("p", "P", body);
            let used = process_template(&template, &VariableSet::new()).unwrap().variables_used;

            let unique: HashSet<&String> = used.iter().collect();
            prop_assert_eq!(unique.len(), used.len());
            let mut expected: Vec<&String> = Vec::new();
            for path in &paths {
                if !expected.contains(&path) {
                    expected.push(path);
                }
            }
            prop_assert_eq!(used.iter().collect::<Vec<_>>(), expected);
        }

        #[test]
        fn prop_non_empty_fields_validate(task in ".+", instructions in ".+") {
            let body = TemplateBody {
                task,
                context: Some(json!({})),
                instructions,
                output_format: Some(json!({})),
                variables: Some(vec![]),
            };
            prop_assert!(validate_template(Some(&body)).is_valid);
        }
    }
}
