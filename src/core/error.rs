//! Engine error taxonomy and non-fatal warnings
//!
//! Per-file failures are isolated: the runner collects them into a run
//! report and keeps going on sibling files. `MatchWarning` is the only
//! non-fatal condition and still surfaces in the report.

use thiserror::Error;

/// Fatal per-file engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// No strategy registered for this file type. The file is skipped.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Content could not be parsed into the structure the strategy needs.
    #[error("parse error: {0}")]
    Parse(String),

    /// Malformed selector syntax.
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Selector matched more than one location with allow_multiple unset.
    #[error("selector '{selector}' matched {count} locations (allow_multiple is off)")]
    AmbiguousMatch { selector: String, count: usize },

    /// Unterminated or nested skip markers.
    #[error("invalid skip directive: {0}")]
    InvalidSkipDirective(String),

    /// Restoration found a token with no value in the map.
    #[error("no value supplied for placeholder '{token}'")]
    PlaceholderMismatch { token: String },

    /// Two selectors addressed overlapping spans in the same file.
    #[error("selectors '{first}' and '{second}' address overlapping content")]
    ConflictingChange { first: String, second: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal condition recorded per file.
///
/// Zero matches for a selector is never an exception: a conversion run
/// must report it so operators notice dead selectors in their config.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MatchWarning {
    pub selector: String,
    pub reason: String,
}

impl MatchWarning {
    pub fn no_match(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            reason: "no match".to_string(),
        }
    }

    pub fn dynamic_content(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            reason: "matched node holds a dynamic expression".to_string(),
        }
    }
}

impl std::fmt::Display for MatchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.selector, self.reason)
    }
}
