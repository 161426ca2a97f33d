//! Prompt template definitions and loading.
//!
//! Templates are structured data validated against a JSON Schema on load.
//! This module handles parsing YAML/JSON templates and collecting them into
//! a keyed library.

mod library;
mod parser;
mod schema;

pub use library::PromptLibrary;
pub use parser::{PromptTemplate, TemplateBody, TemplateCategory, TemplateError, TemplateMetadata};
pub use schema::validate_template_schema;
