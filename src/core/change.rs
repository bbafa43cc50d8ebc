//! Change model and templatize configuration
//!
//! A `Change` is the canonical, format-agnostic description of a single
//! replacement: swap `original` for `replacement` at `span`. Strategies
//! emit them in document order; the caller (runner) applies them. Change
//! lists are produced fresh per conversion call and never persisted.

use std::ops::Range;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

/// One proposed replacement inside a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// Selector-relative locator (structured path, heading pattern,
    /// markup selector + attribute).
    pub path: String,

    /// Exact substring being replaced. Never empty.
    pub original: String,

    /// Exact substring replacing it. Always contains exactly one
    /// well-formed placeholder token.
    pub replacement: String,

    /// Byte range `original` occupies in the source content.
    /// Internal plumbing for application and conflict checks.
    #[serde(skip)]
    pub span: Range<usize>,

    /// 1-based line of the span start, when the strategy computed it.
    pub line: Option<usize>,

    /// 1-based column of the span start.
    pub column: Option<usize>,
}

impl Change {
    /// Build a change and fill line/column from the span start.
    pub fn at(path: String, original: String, replacement: String, span: Range<usize>, content: &str) -> Self {
        let (line, column) = line_col(content, span.start);
        Self {
            path,
            original,
            replacement,
            span,
            line: Some(line),
            column: Some(column),
        }
    }
}

/// Per-file conversion configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatizeConfig {
    /// Ordered selector strings; syntax is strategy-specific.
    pub selectors: Vec<String>,

    /// Declared placeholder name the matches map to.
    pub placeholder: String,

    /// Permit a selector to match more than one location.
    #[serde(default)]
    pub allow_multiple: bool,

    /// Markup/component only: target a named attribute value instead of
    /// element text content.
    #[serde(default)]
    pub attribute: Option<String>,
}

/// Placeholder name → concrete value, supplied at restoration time.
/// Insertion-ordered so reports stay deterministic.
pub type ValueMap = IndexMap<String, String>;

/// Wrap a placeholder name in token syntax: `NAME` → `{{NAME}}`.
pub fn token_for(name: &str) -> String {
    format!("{{{{{name}}}}}")
}

/// Validate a placeholder name: `[A-Z][A-Z0-9_]*`.
///
/// The grammar is deliberately narrow so the restoration sweep can tell
/// engine tokens apart from unrelated `{{...}}` content in user files.
pub fn is_valid_placeholder_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Reject configs that would emit malformed tokens.
pub fn validate_config(cfg: &TemplatizeConfig) -> Result<()> {
    if !is_valid_placeholder_name(&cfg.placeholder) {
        return Err(Error::InvalidSelector {
            selector: cfg.placeholder.clone(),
            reason: "placeholder names must match [A-Z][A-Z0-9_]*".to_string(),
        });
    }
    if cfg.selectors.is_empty() {
        return Err(Error::InvalidSelector {
            selector: String::new(),
            reason: "at least one selector is required".to_string(),
        });
    }
    Ok(())
}

/// Map a byte offset to (1-based line, 1-based column).
pub fn line_col(content: &str, offset: usize) -> (usize, usize) {
    let prefix = &content.as_bytes()[..offset.min(content.len())];
    let line = 1 + memchr::memchr_iter(b'\n', prefix).count();
    let col = offset - memchr::memrchr(b'\n', prefix).map_or(0, |p| p + 1) + 1;
    (line, col)
}

/// Apply an ordered change list to content.
///
/// Changes must be non-overlapping and sorted by span start; both are
/// enforced here so no strategy can slip a corrupting pair through.
pub fn apply_changes(content: &str, changes: &[Change]) -> Result<String> {
    let mut sorted: Vec<&Change> = changes.iter().collect();
    sorted.sort_by_key(|c| c.span.start);

    for pair in sorted.windows(2) {
        if pair[1].span.start < pair[0].span.end {
            return Err(Error::ConflictingChange {
                first: pair[0].path.clone(),
                second: pair[1].path.clone(),
            });
        }
    }

    let mut out = String::with_capacity(content.len());
    let mut cursor = 0usize;
    for change in sorted {
        debug_assert_eq!(&content[change.span.clone()], change.original);
        out.push_str(&content[cursor..change.span.start]);
        out.push_str(&change.replacement);
        cursor = change.span.end;
    }
    out.push_str(&content[cursor..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str, span: Range<usize>, content: &str, replacement: &str) -> Change {
        Change::at(
            path.to_string(),
            content[span.clone()].to_string(),
            replacement.to_string(),
            span,
            content,
        )
    }

    #[test]
    fn placeholder_name_grammar() {
        assert!(is_valid_placeholder_name("PROJECT_NAME"));
        assert!(is_valid_placeholder_name("P0RT"));
        assert!(!is_valid_placeholder_name("project_name"));
        assert!(!is_valid_placeholder_name("1PORT"));
        assert!(!is_valid_placeholder_name(""));
        assert!(!is_valid_placeholder_name("NAME-WITH-DASH"));
    }

    #[test]
    fn token_syntax() {
        assert_eq!(token_for("PROJECT_NAME"), "{{PROJECT_NAME}}");
    }

    #[test]
    fn apply_preserves_surrounding_content() {
        let content = "hello foo, bye bar";
        let changes = vec![
            change("a", 6..9, content, "{{A}}"),
            change("b", 15..18, content, "{{B}}"),
        ];
        assert_eq!(apply_changes(content, &changes).unwrap(), "hello {{A}}, bye {{B}}");
    }

    #[test]
    fn apply_rejects_overlap() {
        let content = "abcdef";
        let changes = vec![
            change("first", 0..4, content, "{{A}}"),
            change("second", 2..6, content, "{{B}}"),
        ];
        let err = apply_changes(content, &changes).unwrap_err();
        assert!(matches!(err, Error::ConflictingChange { .. }));
    }

    #[test]
    fn line_col_mapping() {
        let content = "one\ntwo\nthree";
        assert_eq!(line_col(content, 0), (1, 1));
        assert_eq!(line_col(content, 4), (2, 1));
        assert_eq!(line_col(content, 9), (3, 2));
    }
}
