//! Project configuration (routing layer)
//!
//! `stencil.toml` declares the placeholders and an ordered list of rules
//! mapping file globs to strategies and selectors. This module performs no
//! content transformation itself; it expands into per-file jobs the runner
//! hands to the format strategies.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::change::{is_valid_placeholder_name, TemplatizeConfig};
use crate::core::dispatch::FileFormat;
use crate::infra::walk::FileWalker;

/// One declarative rule: which files, which selectors, which placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Globs relative to the project root.
    pub files: Vec<String>,

    /// Optional format override; inferred from the extension otherwise.
    #[serde(default)]
    pub format: Option<String>,

    /// Strategy-specific selector strings, in declaration order.
    pub selectors: Vec<String>,

    /// Declared placeholder the matches map to.
    pub placeholder: String,

    /// Permit a selector to match several locations per file.
    #[serde(default)]
    pub allow_multiple: bool,

    /// Markup/component: target an attribute value instead of text.
    #[serde(default)]
    pub attribute: Option<String>,
}

impl Rule {
    fn templatize_config(&self) -> TemplatizeConfig {
        TemplatizeConfig {
            selectors: self.selectors.clone(),
            placeholder: self.placeholder.clone(),
            allow_multiple: self.allow_multiple,
            attribute: self.attribute.clone(),
        }
    }
}

/// The parsed `stencil.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Placeholder name → human description.
    #[serde(default)]
    pub placeholders: IndexMap<String, String>,

    /// Ordered rules.
    #[serde(default, rename = "rule")]
    pub rules: Vec<Rule>,
}

/// One unit of work the runner executes: a file bound to a format and a
/// per-file conversion config. The same file may appear in several jobs
/// when rules overlap; the runner merges them.
#[derive(Debug, Clone)]
pub struct Job {
    pub path: PathBuf,
    pub format: FileFormat,
    pub config: TemplatizeConfig,
}

/// Files no rule could be run against, with the reason.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read project config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parse project config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that make later failures operator errors rather
    /// than engine surprises: names well-formed, rules reference declared
    /// placeholders, globs compile.
    pub fn validate(&self) -> Result<()> {
        for name in self.placeholders.keys() {
            anyhow::ensure!(
                is_valid_placeholder_name(name),
                "placeholder '{name}' must match [A-Z][A-Z0-9_]*"
            );
        }
        for (i, rule) in self.rules.iter().enumerate() {
            anyhow::ensure!(
                self.placeholders.contains_key(&rule.placeholder),
                "rule #{} references undeclared placeholder '{}'",
                i + 1,
                rule.placeholder
            );
            anyhow::ensure!(!rule.files.is_empty(), "rule #{} has no file globs", i + 1);
            anyhow::ensure!(!rule.selectors.is_empty(), "rule #{} has no selectors", i + 1);
            if let Some(format) = &rule.format {
                FileFormat::from_name(format)
                    .map_err(|e| anyhow::anyhow!("rule #{}: {e}", i + 1))?;
            }
            for glob in &rule.files {
                Glob::new(glob).with_context(|| format!("rule #{}: bad glob '{glob}'", i + 1))?;
            }
        }
        Ok(())
    }

    /// Expand rules against the project tree into per-file jobs, in rule
    /// declaration order. Files whose format cannot be resolved are
    /// reported as skipped, never as failures.
    pub fn expand(&self, root: &Path) -> Result<(Vec<Job>, Vec<SkippedFile>)> {
        self.expand_with(root, None)
    }

    /// [`expand`](Self::expand) with an explicit format override, which
    /// takes precedence over rule formats and extension detection.
    pub fn expand_with(
        &self,
        root: &Path,
        format_override: Option<FileFormat>,
    ) -> Result<(Vec<Job>, Vec<SkippedFile>)> {
        let files = FileWalker::new(&[])?.walk(root)?;
        // Globs are root-relative; a single-file root matches by name.
        let base = if root.is_file() {
            root.parent().unwrap_or(Path::new(""))
        } else {
            root
        };

        let mut jobs = Vec::new();
        let mut skipped = Vec::new();
        let mut unmatched_format: Vec<PathBuf> = Vec::new();

        for rule in &self.rules {
            let globs = compile_globs(&rule.files)?;
            for path in &files {
                let rel = path.strip_prefix(base).unwrap_or(path);
                if !globs.is_match(rel) {
                    continue;
                }
                let format = match (format_override, &rule.format) {
                    (Some(forced), _) => forced,
                    (None, Some(name)) => FileFormat::from_name(name).expect("validated"),
                    (None, None) => match FileFormat::from_path(path) {
                        Ok(f) => f,
                        Err(e) => {
                            if !unmatched_format.contains(path) {
                                unmatched_format.push(path.clone());
                                skipped.push(SkippedFile {
                                    path: path.clone(),
                                    reason: e.to_string(),
                                });
                            }
                            continue;
                        }
                    },
                };
                debug!(path = %rel.display(), %format, placeholder = %rule.placeholder, "expanded job");
                jobs.push(Job {
                    path: path.clone(),
                    format,
                    config: rule.templatize_config(),
                });
            }
        }

        Ok((jobs, skipped))
    }
}

fn compile_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Write a starter `stencil.toml`.
pub fn init(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join("stencil.toml");
    if config_path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let starter = "\
# stencil project configuration

[placeholders]
PROJECT_NAME = \"Name of the generated project\"

[[rule]]
files = [\"package.json\"]
selectors = [\"name\"]
placeholder = \"PROJECT_NAME\"
";
    std::fs::write(&config_path, starter).context("write config file")?;
    Ok(config_path)
}

/// `stencil init` entry point.
pub fn init_run(args: crate::cli::InitArgs, ctx: &crate::cli::AppContext) -> Result<()> {
    if ctx.dry_run {
        if !ctx.quiet {
            println!(
                "Would write {}",
                args.path.join("stencil.toml").display()
            );
        }
        return Ok(());
    }
    let path = init(&args.path, args.force)?;
    if !ctx.quiet {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
