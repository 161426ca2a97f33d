//! # prism-core
//!
//! Prompt template resolution.
//!
//! This crate turns a declarative prompt template plus a runtime variable set
//! into a concrete request payload:
//! - Validate the template's structure before use
//! - Substitute `${dotted.path}` placeholders from nested variables
//! - Report which variable paths the template referenced
//!
//! ## Key Guarantees
//!
//! 1. **Non-mutating**: The source template is never modified
//! 2. **Total**: Resolution always returns or fails; cyclic variables render
//!    as `[Object]` instead of recursing
//! 3. **Fail-fast**: Structurally invalid templates are rejected, never
//!    resolved partially
//! 4. **No I/O**: Resolution is a pure data transformation
//!
//! ## Example
//!
//! ```rust
//! use prism_core::{process_template, PromptTemplate, TemplateBody, VariableSet};
//! use serde_json::json;
//!
//! let body = TemplateBody {
//!     task: "Review the ${language} code".to_string(),
//!     context: Some(json!({ "file": "${file.path}" })),
//!     instructions: "Point out bugs first.".to_string(),
//!     output_format: Some(json!({ "issues": "list" })),
//!     variables: Some(vec!["language".into(), "file.path".into()]),
//! };
//! let template = PromptTemplate::new("code-review", "Code Review", body);
//! let variables = VariableSet::new().with("language", "TypeScript");
//!
//! let payload = process_template(&template, &variables).unwrap();
//! assert_eq!(payload.body.task, "Review the TypeScript code");
//! assert_eq!(payload.variables_used, vec!["language", "file.path"]);
//! ```

pub mod patterns;
pub mod resolver;
pub mod template;
pub mod variables;

// Re-export main types at crate root
pub use resolver::{
    process_template, substitute_variables, validate_template, ResolvedPayload,
    TemplateValidation,
};
pub use template::{
    PromptLibrary, PromptTemplate, TemplateBody, TemplateCategory, TemplateError,
    TemplateMetadata,
};
pub use variables::{VarMap, Variable, VariableSet, CYCLE_MARKER};
