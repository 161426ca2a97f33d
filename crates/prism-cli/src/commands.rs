//! Command implementations.
//!
//! Every failure is routed through the shared [`ErrorHandler`]; its callback
//! prints the recovery message, so commands only decide the exit code.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::process::ExitCode;

use prism_core::{
    process_template, validate_template, PromptLibrary, TemplateError, VarMap, Variable,
    VariableSet,
};
use prism_runtime::{handle_error, ErrorHandler, ErrorKind, ResilienceConfig};

use crate::cli::{Cli, Command, HealthArgs, RenderArgs, ValidateArgs};

pub fn dispatch(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => ResilienceConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ResilienceConfig::default(),
    };
    let handler = ErrorHandler::new(config);
    handler.on_error(|event| {
        let strategy = handle_error(event.kind, &event.context);
        eprintln!("{}", strategy.error_message);
    });

    match cli.command {
        Command::Validate(args) => validate(&handler, args),
        Command::Render(args) => render(&handler, args),
        Command::Health(args) => health(&handler, args),
    }
}

fn validate(handler: &ErrorHandler, args: ValidateArgs) -> Result<ExitCode> {
    let Some(library) = load_library(handler, &args.library) else {
        return Ok(ExitCode::FAILURE);
    };

    let mut invalid = 0;
    for template in library.iter() {
        let result = validate_template(template.template.as_ref());
        let mark = if result.is_valid { "ok" } else { "FAIL" };
        println!("{:<4} {} ({})", mark, template.id, template.category);
        for error in &result.errors {
            println!("       error: {}", error);
        }
        for warning in &result.warnings {
            println!("       warning: {}", warning);
        }
        if !result.is_valid {
            invalid += 1;
        }
    }

    println!("{} template(s), {} invalid", library.len(), invalid);
    Ok(if invalid == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn render(handler: &ErrorHandler, args: RenderArgs) -> Result<ExitCode> {
    let Some(library) = load_library(handler, &args.library) else {
        return Ok(ExitCode::FAILURE);
    };

    let variables = match &args.vars {
        Some(path) => {
            let vars = handler.with_error_handling(
                ErrorKind::Validation,
                &json!({ "details": format!("unreadable variables file {}", path.display()) }),
                || read_variables(path),
            );
            match vars {
                Some(vars) => vars,
                None => return Ok(ExitCode::FAILURE),
            }
        }
        None => VariableSet::new(),
    };
    for assignment in &args.var {
        apply_assignment(&variables, assignment)?;
    }

    match library.resolve(&args.id, &variables) {
        Ok(payload) => {
            let unresolved = payload.unresolved_placeholders();
            if !unresolved.is_empty() {
                tracing::warn!(template_id = %payload.template_id, ?unresolved, "Unresolved placeholders");
            }
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report(handler, &err);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn health(handler: &ErrorHandler, args: HealthArgs) -> Result<ExitCode> {
    let Some(library) = load_library(handler, &args.library) else {
        return Ok(ExitCode::FAILURE);
    };

    let empty = VariableSet::new();
    for template in library.iter() {
        if let Err(err) = process_template(template, &empty) {
            report(handler, &err);
        }
    }

    let assessment = handler.validate_recovery_capabilities();
    let stats: Vec<Value> = handler
        .get_error_stats()
        .iter()
        .filter(|(_, stats)| stats.count > 0)
        .map(|(kind, stats)| {
            json!({
                "kind": kind,
                "count": stats.count,
                "frequent": handler.is_error_frequent(kind),
                "last_occurred": stats.last_occurred,
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "templates": library.len(),
            "errors": stats,
            "recovery": assessment,
        }))?
    );
    Ok(if assessment.can_recover {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_library(handler: &ErrorHandler, path: &Path) -> Option<PromptLibrary> {
    match PromptLibrary::from_file(path) {
        Ok(library) => Some(library),
        Err(err) => {
            report(handler, &err);
            None
        }
    }
}

fn read_variables(path: &Path) -> Result<VariableSet> {
    let contents = fs::read_to_string(path)?;
    Ok(VariableSet::from_json_str(&contents)?)
}

/// Route a template failure through the handler.
fn report(handler: &ErrorHandler, err: &TemplateError) {
    let (kind, context) = classify(err);
    handler.log_error(kind, err.to_string(), &context);
}

/// Map a template failure to an error kind plus the context its recovery
/// message reads.
fn classify(err: &TemplateError) -> (ErrorKind, Value) {
    match err {
        TemplateError::InvalidTemplate {
            template_id,
            errors,
        } => (
            ErrorKind::TemplateParse,
            json!({ "template_id": template_id, "errors": errors }),
        ),
        TemplateError::SchemaError(errors) => {
            (ErrorKind::TemplateParse, json!({ "errors": errors }))
        }
        TemplateError::YamlError(_) | TemplateError::JsonError(_) => (
            ErrorKind::TemplateParse,
            json!({ "details": err.to_string() }),
        ),
        TemplateError::NotFound { id, available } => (
            ErrorKind::PromptNotFound,
            json!({ "prompt_id": id, "available_prompts": available }),
        ),
        TemplateError::InvalidVariables(details) => {
            (ErrorKind::Validation, json!({ "details": details }))
        }
        TemplateError::DuplicateId(id) => (
            ErrorKind::Validation,
            json!({ "details": format!("duplicate template id '{}'", id) }),
        ),
        TemplateError::IoError(_) => (ErrorKind::Unknown, json!({ "details": err.to_string() })),
    }
}

/// Apply `path=value`, creating intermediate maps for dotted paths.
fn apply_assignment(variables: &VariableSet, assignment: &str) -> Result<()> {
    let Some((path, value)) = assignment.split_once('=') else {
        bail!("expected PATH=VALUE, got '{}'", assignment);
    };
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        bail!("invalid variable path '{}'", path);
    }

    let (leaf, parents) = match segments.split_last() {
        Some(split) => split,
        None => bail!("invalid variable path '{}'", path),
    };
    let mut current = variables.root().clone();
    for segment in parents {
        current = match current.get(segment) {
            Some(Variable::Map(map)) => map,
            _ => {
                let map = VarMap::new();
                current.insert(*segment, map.clone());
                map
            }
        };
    }
    current.insert(*leaf, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::substitute_variables;

    #[test]
    fn test_classify_not_found() {
        let err = TemplateError::NotFound {
            id: "refactor".to_string(),
            available: vec!["code-review".to_string()],
        };
        let (kind, context) = classify(&err);
        assert_eq!(kind, ErrorKind::PromptNotFound);
        assert_eq!(
            handle_error(kind, &context).error_message,
            "Prompt 'refactor' not found. Available prompts: code-review"
        );
    }

    #[test]
    fn test_classify_invalid_template() {
        let err = TemplateError::InvalidTemplate {
            template_id: "broken".to_string(),
            errors: vec!["Template must have a non-empty task".to_string()],
        };
        let (kind, context) = classify(&err);
        assert_eq!(kind, ErrorKind::TemplateParse);
        assert!(handle_error(kind, &context).error_message.contains("'broken'"));
    }

    #[test]
    fn test_apply_dotted_assignment() {
        let vars = VariableSet::new();
        apply_assignment(&vars, "user.experience=senior").unwrap();
        apply_assignment(&vars, "user.name=Ada").unwrap();
        apply_assignment(&vars, "language=rust").unwrap();

        assert_eq!(
            substitute_variables("${user.name} (${user.experience}) ${language}", &vars),
            "Ada (senior) rust"
        );
    }

    #[test]
    fn test_apply_assignment_rejects_bad_input() {
        let vars = VariableSet::new();
        assert!(apply_assignment(&vars, "no-equals").is_err());
        assert!(apply_assignment(&vars, "a..b=1").is_err());
    }

    #[test]
    fn test_report_records_event() {
        let handler = ErrorHandler::default();
        report(&handler, &TemplateError::DuplicateId("x".to_string()));
        assert_eq!(handler.error_count(ErrorKind::Validation), 1);
    }
}
