//! The closed error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a failure.
///
/// Anything that does not fit one of the named kinds is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A template body failed structural validation or could not be parsed
    #[serde(rename = "template-parse-error")]
    TemplateParse,

    /// A caller flagged a specific variable path as unresolvable
    #[serde(rename = "variable-substitution-error")]
    VariableSubstitution,

    /// Caller-level input failed its own rules
    #[serde(rename = "validation-error")]
    Validation,

    /// A named setting holds an invalid value
    #[serde(rename = "configuration-error")]
    Configuration,

    /// No template matches the requested identifier
    #[serde(rename = "prompt-not-found")]
    PromptNotFound,

    #[serde(rename = "unknown")]
    Unknown,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::TemplateParse,
        ErrorKind::VariableSubstitution,
        ErrorKind::Validation,
        ErrorKind::Configuration,
        ErrorKind::PromptNotFound,
        ErrorKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TemplateParse => "template-parse-error",
            ErrorKind::VariableSubstitution => "variable-substitution-error",
            ErrorKind::Validation => "validation-error",
            ErrorKind::Configuration => "configuration-error",
            ErrorKind::PromptNotFound => "prompt-not-found",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Map a kind code to a kind. Unrecognized codes map to `Unknown`.
    pub fn from_code(code: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == code)
            .unwrap_or(ErrorKind::Unknown)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_unrecognized_code_is_unknown() {
        assert_eq!(ErrorKind::from_code("disk-on-fire"), ErrorKind::Unknown);
        assert_eq!(ErrorKind::from_code(""), ErrorKind::Unknown);
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&ErrorKind::PromptNotFound).unwrap();
        assert_eq!(json, "\"prompt-not-found\"");
    }
}
