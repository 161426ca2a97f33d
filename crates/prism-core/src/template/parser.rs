//! Prompt template parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_template_schema;

/// Errors that can occur when loading or resolving templates.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read template file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Template schema validation failed: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Template '{template_id}' failed validation: {}", .errors.join("; "))]
    InvalidTemplate {
        template_id: String,
        errors: Vec<String>,
    },

    #[error("Prompt '{id}' not found")]
    NotFound { id: String, available: Vec<String> },

    #[error("Duplicate template id: {0}")]
    DuplicateId(String),

    #[error("Invalid variables: {0}")]
    InvalidVariables(String),
}

/// What kind of task a template serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateCategory {
    CodeReview,
    DebugAnalysis,
    Refactoring,
    Documentation,
    #[default]
    General,
}

impl TemplateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::CodeReview => "code-review",
            TemplateCategory::DebugAnalysis => "debug-analysis",
            TemplateCategory::Refactoring => "refactoring",
            TemplateCategory::Documentation => "documentation",
            TemplateCategory::General => "general",
        }
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structural body of a template.
///
/// Fields are lenient on load: a missing task or context deserializes to an
/// empty/absent value and is reported by
/// [`validate_template`](crate::resolver::validate_template) instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TemplateBody {
    /// What the model is asked to do
    #[serde(default)]
    pub task: String,

    /// Named context values; strings may contain `${path}` placeholders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// How the model should approach the task
    #[serde(default)]
    pub instructions: String,

    /// Desired shape of the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<Value>,

    /// Variable paths the template expects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<String>>,
}

/// Where a template applies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TemplateMetadata {
    #[serde(default)]
    pub supported_languages: Vec<String>,

    #[serde(default)]
    pub required_context: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_notes: Option<String>,
}

impl TemplateMetadata {
    /// Whether the template applies to `language`. An empty list means any.
    pub fn supports_language(&self, language: &str) -> bool {
        self.supported_languages.is_empty()
            || self
                .supported_languages
                .iter()
                .any(|l| l.eq_ignore_ascii_case(language))
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// A named, versioned prompt definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptTemplate {
    /// Identifying key used for lookups
    pub id: String,

    /// Human-readable name
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub category: TemplateCategory,

    /// Template body; absence is a validation failure, not a parse failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateBody>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TemplateMetadata>,
}

impl PromptTemplate {
    /// Create a template with the given body.
    pub fn new(id: impl Into<String>, name: impl Into<String>, body: TemplateBody) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: default_version(),
            description: None,
            category: TemplateCategory::General,
            template: Some(body),
            metadata: None,
        }
    }

    pub fn with_category(mut self, category: TemplateCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_metadata(mut self, metadata: TemplateMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Parse a template from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, TemplateError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a template from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a template from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a template from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Check a raw value against the template schema, then deserialize it.
    pub fn from_value(value: Value) -> Result<Self, TemplateError> {
        validate_template_schema(&value).map_err(TemplateError::SchemaError)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Variable paths declared by the body, if any.
    pub fn declared_variables(&self) -> &[String] {
        self.template
            .as_ref()
            .and_then(|body| body.variables.as_deref())
            .unwrap_or(&[])
    }
}
