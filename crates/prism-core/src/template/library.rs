//! A keyed collection of prompt templates.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::parser::{PromptTemplate, TemplateError};
use crate::resolver::{process_template, ResolvedPayload};
use crate::variables::VariableSet;

/// Templates indexed by id.
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    templates: BTreeMap<String, PromptTemplate>,
}

impl PromptLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a library from templates, rejecting duplicate ids.
    pub fn from_templates(
        templates: impl IntoIterator<Item = PromptTemplate>,
    ) -> Result<Self, TemplateError> {
        let mut library = Self::new();
        for template in templates {
            library.insert(template)?;
        }
        Ok(library)
    }

    /// Parse a library from YAML.
    ///
    /// Accepts a list of templates, a mapping with a `prompts` list, or a
    /// single template.
    pub fn from_yaml(yaml: &str) -> Result<Self, TemplateError> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a library from JSON. Accepts the same shapes as [`Self::from_yaml`].
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Load a library file, choosing the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            _ => Self::from_json(&contents),
        }
    }

    fn from_value(value: Value) -> Result<Self, TemplateError> {
        let entries = match value {
            Value::Array(items) => items,
            Value::Object(mut object) => match object.remove("prompts") {
                Some(Value::Array(items)) => items,
                Some(other) => {
                    return Err(TemplateError::SchemaError(vec![format!(
                        "'prompts' must be a list, found {}",
                        other
                    )]))
                }
                None => vec![Value::Object(object)],
            },
            other => {
                return Err(TemplateError::SchemaError(vec![format!(
                    "expected a template or a list of templates, found {}",
                    other
                )]))
            }
        };

        let templates = entries
            .into_iter()
            .map(PromptTemplate::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count = templates.len(), "Loaded prompt templates");
        Self::from_templates(templates)
    }

    /// Add a template. Ids must be unique.
    pub fn insert(&mut self, template: PromptTemplate) -> Result<(), TemplateError> {
        if self.templates.contains_key(&template.id) {
            return Err(TemplateError::DuplicateId(template.id));
        }
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    /// Look up a template by id.
    pub fn get(&self, id: &str) -> Result<&PromptTemplate, TemplateError> {
        self.templates.get(id).ok_or_else(|| TemplateError::NotFound {
            id: id.to_string(),
            available: self.ids(),
        })
    }

    /// All ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PromptTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Look up a template and resolve it against `variables`.
    pub fn resolve(
        &self,
        id: &str,
        variables: &VariableSet,
    ) -> Result<ResolvedPayload, TemplateError> {
        process_template(self.get(id)?, variables)
    }
}
