//! Strategy dispatch
//!
//! Maps a file's format to its bound strategy. Pure lookup, no per-file
//! state; unknown formats surface as `UnsupportedFormat` so the runner can
//! skip the file and keep the run alive.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::strategy::{
    component::ComponentStrategy, markup::MarkupStrategy, prose::ProseStrategy,
    structured::StructuredStrategy, Strategy,
};

/// Format families the engine knows how to mutate safely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Structured data, JSON flavor
    Json,
    /// Structured data, TOML flavor
    Toml,
    /// Markdown prose with optional YAML frontmatter
    Prose,
    /// HTML/XML-like element markup
    Markup,
    /// Markup with embedded code (JSX/TSX), parsed to a syntax tree
    Component,
}

impl FileFormat {
    /// Detect format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            "md" | "markdown" => Ok(Self::Prose),
            "html" | "htm" | "xml" | "svg" => Ok(Self::Markup),
            "jsx" | "tsx" | "js" | "ts" => Ok(Self::Component),
            other => Err(Error::UnsupportedFormat(if other.is_empty() {
                path.display().to_string()
            } else {
                other.to_string()
            })),
        }
    }

    /// Parse an explicit `--format` override.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            "prose" | "markdown" | "md" => Ok(Self::Prose),
            "markup" | "html" => Ok(Self::Markup),
            "component" | "jsx" | "tsx" => Ok(Self::Component),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Prose => "prose",
            Self::Markup => "markup",
            Self::Component => "component",
        };
        write!(f, "{name}")
    }
}

/// Look up the strategy bound to a format.
pub fn strategy_for(format: FileFormat) -> Box<dyn Strategy> {
    match format {
        FileFormat::Json | FileFormat::Toml => Box::new(StructuredStrategy::new(format)),
        FileFormat::Prose => Box::new(ProseStrategy),
        FileFormat::Markup => Box::new(MarkupStrategy),
        FileFormat::Component => Box::new(ComponentStrategy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_detection() {
        assert_eq!(FileFormat::from_path(Path::new("package.json")).unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("Cargo.toml")).unwrap(), FileFormat::Toml);
        assert_eq!(FileFormat::from_path(Path::new("README.md")).unwrap(), FileFormat::Prose);
        assert_eq!(FileFormat::from_path(Path::new("index.html")).unwrap(), FileFormat::Markup);
        assert_eq!(FileFormat::from_path(Path::new("App.tsx")).unwrap(), FileFormat::Component);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = FileFormat::from_path(Path::new("binary.png")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(e) if e == "png"));
    }

    #[test]
    fn no_extension_reports_path() {
        let err = FileFormat::from_path(Path::new("Makefile")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(e) if e.contains("Makefile")));
    }
}
