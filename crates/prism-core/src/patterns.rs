//! Placeholder token pattern.
//!
//! A placeholder is `${path}` where `path` is one or more identifier segments
//! joined by dots. Anything else containing `$` or braces is plain text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `${user.experience}`; whitespace inside the braces is tolerated.
    /// Capture group 1 is the dotted path.
    pub static ref PLACEHOLDER_PATTERN: Regex = Regex::new(
        r"\$\{\s*([A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]+)*)\s*\}"
    ).unwrap();
}

/// Dotted paths of every placeholder in `text`, in order of appearance.
pub fn placeholder_paths(text: &str) -> Vec<&str> {
    PLACEHOLDER_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Check if text contains any placeholder.
pub fn contains_placeholder(text: &str) -> bool {
    PLACEHOLDER_PATTERN.is_match(text)
}
