//! Multi-file runs
//!
//! Each file is processed independently with no shared mutable state, so a
//! run fans out over rayon with no ordering guarantee across files.
//! Per-file failures are terminal for that file only; they are collected
//! into the run report and never abort siblings. Writes go through
//! `write_atomic`, so each file on disk is either fully old or fully new;
//! there is no all-or-nothing guarantee across files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use owo_colors::OwoColorize;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::{AppContext, ConvertArgs, RestoreArgs, TestArgs, ValidateArgs};
use crate::core::change::{apply_changes, is_valid_placeholder_name, Change, TemplatizeConfig, ValueMap};
use crate::core::dispatch::FileFormat;
use crate::core::error::{Error, MatchWarning};
use crate::core::project::ProjectConfig;
use crate::core::restore::{restore, unescape_basic};
use crate::core::strategy;
use crate::infra::io::{read_file, write_atomic};
use crate::infra::walk::FileWalker;

/// Per-file pipeline stage reached. On error this records where the
/// pipeline stopped; the `Error` status marks the file as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Loaded,
    Matched,
    Filtered,
    ChangesEmitted,
    TokensLocated,
    ValuesResolved,
    Applied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Changed,
    Skipped,
    Error,
}

/// Outcome for one file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    pub stage: Stage,
    pub changes: usize,
    pub warnings: Vec<MatchWarning>,
    pub detail: Option<String>,
}

impl FileReport {
    fn failed(path: &Path, stage: Stage, detail: String) -> Self {
        Self {
            path: path.to_path_buf(),
            status: FileStatus::Error,
            stage,
            changes: 0,
            warnings: Vec::new(),
            detail: Some(detail),
        }
    }
}

/// Run-level report: one entry per file plus tallies.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub files: Vec<FileReport>,
    pub ok: usize,
    pub changed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunReport {
    fn from_files(mut files: Vec<FileReport>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let mut report = Self {
            files,
            ..Self::default()
        };
        for file in &report.files {
            match file.status {
                FileStatus::Ok => report.ok += 1,
                FileStatus::Changed => report.changed += 1,
                FileStatus::Skipped => report.skipped += 1,
                FileStatus::Error => report.errors += 1,
            }
        }
        report
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Convert a whole project (or a single file) into a template. A format
/// override wins over rule formats and extension detection.
pub fn run_convert(
    root: &Path,
    config: &ProjectConfig,
    format_override: Option<FileFormat>,
    dry_run: bool,
) -> Result<RunReport> {
    let (grouped, mut reports) = expand_grouped(root, config, format_override)?;

    info!(files = grouped.len(), dry_run, "starting convert run");
    reports.extend(
        grouped
            .par_iter()
            .map(|(path, (format, configs))| convert_one(path, *format, configs, dry_run))
            .collect::<Vec<_>>(),
    );

    Ok(RunReport::from_files(reports))
}

/// Validate: full matching pass, nothing written.
pub fn run_validate(root: &Path, config: &ProjectConfig) -> Result<RunReport> {
    run_convert(root, config, None, true)
}

/// Restore a template tree (or single file) with concrete values.
pub fn run_restore(
    root: &Path,
    values: &ValueMap,
    ignore: &[String],
    format_override: Option<FileFormat>,
    dry_run: bool,
) -> Result<RunReport> {
    let files = if root.is_file() {
        vec![root.to_path_buf()]
    } else {
        FileWalker::new(ignore)?.walk(root)?
    };

    info!(files = files.len(), dry_run, "starting restore run");
    let reports: Vec<FileReport> = files
        .par_iter()
        .map(|path| {
            let format = match format_override.map(Ok).unwrap_or_else(|| FileFormat::from_path(path)) {
                Ok(f) => f,
                Err(e) => {
                    return FileReport {
                        path: path.clone(),
                        status: FileStatus::Skipped,
                        stage: Stage::Loaded,
                        changes: 0,
                        warnings: Vec::new(),
                        detail: Some(e.to_string()),
                    };
                }
            };
            restore_one(path, format, values, dry_run)
        })
        .collect();

    Ok(RunReport::from_files(reports))
}

/// Round-trip verification: convert in memory, restore with the original
/// values, and require byte equality with the source file.
pub fn run_test(root: &Path, config: &ProjectConfig) -> Result<RunReport> {
    let (grouped, mut reports) = expand_grouped(root, config, None)?;

    reports.extend(
        grouped
            .par_iter()
            .map(|(path, (format, configs))| test_one(path, *format, configs))
            .collect::<Vec<_>>(),
    );

    Ok(RunReport::from_files(reports))
}

type Grouped = Vec<(PathBuf, (FileFormat, Vec<TemplatizeConfig>))>;

/// Expand the project config and group jobs per file, preserving rule
/// order. Files no strategy covers come back as skipped reports.
fn expand_grouped(
    root: &Path,
    config: &ProjectConfig,
    format_override: Option<FileFormat>,
) -> Result<(Grouped, Vec<FileReport>)> {
    let (jobs, skipped) = config
        .expand_with(root, format_override)
        .context("expand project configuration")?;

    let mut grouped: IndexMap<PathBuf, (FileFormat, Vec<TemplatizeConfig>)> = IndexMap::new();
    let mut reports = Vec::new();

    for job in jobs {
        match grouped.entry(job.path.clone()) {
            indexmap::map::Entry::Occupied(mut entry) => {
                if entry.get().0 != job.format {
                    reports.push(FileReport::failed(
                        &job.path,
                        Stage::Loaded,
                        format!(
                            "rules disagree on format: {} vs {}",
                            entry.get().0,
                            job.format
                        ),
                    ));
                    continue;
                }
                entry.get_mut().1.push(job.config);
            }
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert((job.format, vec![job.config]));
            }
        }
    }

    for skip in skipped {
        reports.push(FileReport {
            path: skip.path,
            status: FileStatus::Skipped,
            stage: Stage::Loaded,
            changes: 0,
            warnings: Vec::new(),
            detail: Some(skip.reason),
        });
    }

    Ok((grouped.into_iter().collect(), reports))
}

/// Propose changes for every config bound to one file, in rule order.
fn propose_all(
    content: &str,
    format: FileFormat,
    configs: &[TemplatizeConfig],
) -> crate::core::error::Result<(Vec<Change>, Vec<MatchWarning>, Vec<String>)> {
    let mut changes = Vec::new();
    let mut warnings = Vec::new();
    let mut placeholders = Vec::new();

    for cfg in configs {
        let proposal = strategy::propose(format, content, cfg)?;
        placeholders.extend(vec![cfg.placeholder.clone(); proposal.changes.len()]);
        changes.extend(proposal.changes);
        warnings.extend(proposal.warnings);
    }
    // Rules are independent; overlaps across them are still config bugs.
    strategy::check_overlaps(&changes)?;
    Ok((changes, warnings, placeholders))
}

/// Stage a proposal error maps back to.
fn propose_stage(error: &Error) -> Stage {
    match error {
        Error::Parse(_) | Error::InvalidSelector { .. } | Error::AmbiguousMatch { .. } => {
            Stage::Matched
        }
        Error::InvalidSkipDirective(_) => Stage::Filtered,
        _ => Stage::ChangesEmitted,
    }
}

fn convert_one(
    path: &Path,
    format: FileFormat,
    configs: &[TemplatizeConfig],
    dry_run: bool,
) -> FileReport {
    let content = match read_file(path) {
        Ok(c) => c,
        Err(e) => return FileReport::failed(path, Stage::Loaded, format!("{e:#}")),
    };

    let (changes, warnings, _) = match propose_all(&content, format, configs) {
        Ok(v) => v,
        Err(e) => return FileReport::failed(path, propose_stage(&e), e.to_string()),
    };
    debug!(path = %path.display(), changes = changes.len(), "changes emitted");

    if changes.is_empty() {
        return FileReport {
            path: path.to_path_buf(),
            status: FileStatus::Ok,
            stage: Stage::ChangesEmitted,
            changes: 0,
            warnings,
            detail: None,
        };
    }

    let output = match apply_changes(&content, &changes) {
        Ok(o) => o,
        Err(e) => return FileReport::failed(path, Stage::ChangesEmitted, e.to_string()),
    };

    if !dry_run {
        if let Err(e) = write_atomic(path, output.as_bytes()) {
            return FileReport::failed(path, Stage::Applied, format!("{e:#}"));
        }
    }

    FileReport {
        path: path.to_path_buf(),
        status: FileStatus::Changed,
        stage: Stage::Applied,
        changes: changes.len(),
        warnings,
        detail: None,
    }
}

fn restore_one(path: &Path, format: FileFormat, values: &ValueMap, dry_run: bool) -> FileReport {
    let content = match read_file(path) {
        Ok(c) => c,
        Err(e) => return FileReport::failed(path, Stage::Loaded, format!("{e:#}")),
    };

    let (output, replaced) = match restore(format, &content, values) {
        Ok(v) => v,
        Err(e) => return FileReport::failed(path, Stage::ValuesResolved, e.to_string()),
    };

    if replaced == 0 {
        return FileReport {
            path: path.to_path_buf(),
            status: FileStatus::Ok,
            stage: Stage::TokensLocated,
            changes: 0,
            warnings: Vec::new(),
            detail: None,
        };
    }

    if !dry_run {
        if let Err(e) = write_atomic(path, output.as_bytes()) {
            return FileReport::failed(path, Stage::Applied, format!("{e:#}"));
        }
    }

    FileReport {
        path: path.to_path_buf(),
        status: FileStatus::Changed,
        stage: Stage::Applied,
        changes: replaced,
        warnings: Vec::new(),
        detail: None,
    }
}

/// Concrete value behind one change. A span inside a double-quoted string
/// captures source-escaped text; the value is the unescaped form, so
/// restoration re-escapes it back to the same bytes. Literal strings and
/// bare scalars carry no escapes and are taken verbatim.
fn change_value(format: FileFormat, content: &str, change: &Change) -> String {
    let in_basic_string = matches!(format, FileFormat::Json | FileFormat::Toml)
        && change
            .span
            .start
            .checked_sub(1)
            .and_then(|i| content.as_bytes().get(i))
            == Some(&b'"');
    if in_basic_string {
        unescape_basic(&change.original)
    } else {
        change.original.clone()
    }
}

fn test_one(path: &Path, format: FileFormat, configs: &[TemplatizeConfig]) -> FileReport {
    let content = match read_file(path) {
        Ok(c) => c,
        Err(e) => return FileReport::failed(path, Stage::Loaded, format!("{e:#}")),
    };

    let (changes, warnings, placeholders) = match propose_all(&content, format, configs) {
        Ok(v) => v,
        Err(e) => return FileReport::failed(path, propose_stage(&e), e.to_string()),
    };

    // Every occurrence of a placeholder must carry one concrete value or
    // the template cannot restore deterministically.
    let mut values = ValueMap::new();
    for (change, placeholder) in changes.iter().zip(&placeholders) {
        let value = change_value(format, &content, change);
        if let Some(existing) = values.get(placeholder) {
            if existing != &value {
                return FileReport::failed(
                    path,
                    Stage::ChangesEmitted,
                    format!(
                        "placeholder '{placeholder}' maps to divergent values '{existing}' and '{value}'"
                    ),
                );
            }
        } else {
            values.insert(placeholder.clone(), value);
        }
    }

    let template = match apply_changes(&content, &changes) {
        Ok(t) => t,
        Err(e) => return FileReport::failed(path, Stage::ChangesEmitted, e.to_string()),
    };

    let restored = match restore(format, &template, &values) {
        Ok((r, _)) => r,
        Err(e) => return FileReport::failed(path, Stage::ValuesResolved, e.to_string()),
    };

    if restored != content {
        return FileReport::failed(
            path,
            Stage::Applied,
            "round-trip mismatch: restored content differs from original".to_string(),
        );
    }

    FileReport {
        path: path.to_path_buf(),
        status: FileStatus::Ok,
        stage: Stage::Applied,
        changes: changes.len(),
        warnings,
        detail: None,
    }
}

/// Human or JSON rendering of a run report.
pub fn print_report(report: &RunReport, json: bool, quiet: bool, color: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report).context("serialize report")?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }

    for file in &report.files {
        let label = match file.status {
            FileStatus::Ok => "ok",
            FileStatus::Changed => "changed",
            FileStatus::Skipped => "skipped",
            FileStatus::Error => "error",
        };
        let status = if color {
            match file.status {
                FileStatus::Ok => label.green().to_string(),
                FileStatus::Changed => label.cyan().to_string(),
                FileStatus::Skipped => label.dimmed().to_string(),
                FileStatus::Error => label.red().to_string(),
            }
        } else {
            label.to_string()
        };
        print!("{status:>10}  {}", file.path.display());
        if file.changes > 0 {
            print!(
                "  ({} change{})",
                file.changes,
                if file.changes == 1 { "" } else { "s" }
            );
        }
        if let Some(detail) = &file.detail {
            print!("  {detail}");
        }
        println!();
        for warning in &file.warnings {
            let tag = if color {
                "warn".yellow().to_string()
            } else {
                "warn".to_string()
            };
            println!("{tag:>10}  {warning}");
        }
    }
    println!(
        "\n{} ok, {} changed, {} skipped, {} error(s)",
        report.ok, report.changed, report.skipped, report.errors
    );
    Ok(())
}

fn load_project_config(root: &Path, config: &Path) -> Result<ProjectConfig> {
    // Relative --config paths resolve against the project root when they
    // do not exist relative to the working directory.
    let path = if !config.exists() && config.is_relative() {
        root.join(config)
    } else {
        config.to_path_buf()
    };
    let project = ProjectConfig::load(&path)?;
    project.validate()?;
    Ok(project)
}

fn finish(report: &RunReport, json: bool, ctx: &AppContext) -> Result<()> {
    print_report(report, json, ctx.quiet, !ctx.no_color)?;
    anyhow::ensure!(
        !report.has_errors(),
        "{} file(s) failed; see report above",
        report.errors
    );
    Ok(())
}

/// `stencil convert` entry point.
pub fn convert_run(args: ConvertArgs, ctx: &AppContext) -> Result<()> {
    let config = load_project_config(&args.path, &args.config)?;
    let format = match &args.format {
        Some(name) => Some(FileFormat::from_name(name)?),
        None => None,
    };
    let report = run_convert(&args.path, &config, format, ctx.dry_run)?;
    finish(&report, args.json, ctx)
}

/// `stencil validate` entry point.
pub fn validate_run(args: ValidateArgs, ctx: &AppContext) -> Result<()> {
    let config = load_project_config(&args.path, &args.config)?;
    let report = run_validate(&args.path, &config)?;
    finish(&report, args.json, ctx)
}

/// `stencil test` entry point.
pub fn test_run(args: TestArgs, ctx: &AppContext) -> Result<()> {
    let config = load_project_config(&args.path, &args.config)?;
    let report = run_test(&args.path, &config)?;
    finish(&report, args.json, ctx)
}

/// `stencil restore` entry point. Values come from `--values` (or the
/// configured default file), with `--set NAME=VALUE` taking precedence.
pub fn restore_run(args: RestoreArgs, ctx: &AppContext) -> Result<()> {
    let settings = crate::infra::config::load_settings()?;

    let mut values = ValueMap::new();
    let values_file = args
        .values
        .clone()
        .or_else(|| settings.values_file.as_ref().map(PathBuf::from));
    if let Some(file) = values_file {
        values = load_values_file(&file)?;
    }
    for pair in &args.set {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("--set expects NAME=VALUE, got '{pair}'"))?;
        anyhow::ensure!(
            is_valid_placeholder_name(name),
            "invalid placeholder name '{name}'"
        );
        values.insert(name.to_string(), value.to_string());
    }
    anyhow::ensure!(
        !values.is_empty(),
        "no values supplied; use --set or --values"
    );

    let format = match &args.format {
        Some(name) => Some(FileFormat::from_name(name)?),
        None => None,
    };

    let mut ignore = settings.ignore_patterns;
    ignore.extend(args.ignore.iter().cloned());

    let report = run_restore(&args.path, &values, &ignore, format, ctx.dry_run)?;
    finish(&report, args.json, ctx)
}

/// Parse a NAME → value mapping from a TOML or JSON file.
fn load_values_file(path: &Path) -> Result<ValueMap> {
    let raw = read_file(path)?;
    let values: ValueMap = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&raw)
            .with_context(|| format!("parse values file {}", path.display()))?,
        _ => toml::from_str(&raw)
            .with_context(|| format!("parse values file {}", path.display()))?,
    };
    for name in values.keys() {
        anyhow::ensure!(
            is_valid_placeholder_name(name),
            "invalid placeholder name '{name}' in {}",
            path.display()
        );
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn project_config(raw: &str) -> ProjectConfig {
        let config: ProjectConfig = toml::from_str(raw).unwrap();
        config.validate().unwrap();
        config
    }

    const CONFIG: &str = r#"
[placeholders]
PROJECT_NAME = "name"

[[rule]]
files = ["package.json"]
selectors = ["name", "author.name"]
placeholder = "PROJECT_NAME"
"#;

    #[test]
    fn convert_run_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("package.json");
        std::fs::write(&file, r#"{"name":"foo","author":{"name":"foo"}}"#).unwrap();

        let report = run_convert(dir.path(), &project_config(CONFIG), None, false).unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(report.errors, 0);

        let written = std::fs::read_to_string(&file).unwrap();
        assert_eq!(
            written,
            r#"{"name":"{{PROJECT_NAME}}","author":{"name":"{{PROJECT_NAME}}"}}"#
        );
    }

    #[test]
    fn dry_run_leaves_files_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("package.json");
        let original = r#"{"name":"foo","author":{"name":"foo"}}"#;
        std::fs::write(&file, original).unwrap();

        let report = run_convert(dir.path(), &project_config(CONFIG), None, true).unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), original);
    }

    #[test]
    fn failing_file_does_not_abort_siblings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{not valid json").unwrap();
        std::fs::write(dir.path().join("other.json"), r#"{"name":"x"}"#).unwrap();

        let config = project_config(
            r#"
[placeholders]
PROJECT_NAME = "name"

[[rule]]
files = ["*.json"]
selectors = ["name"]
placeholder = "PROJECT_NAME"
"#,
        );
        let report = run_convert(dir.path(), &config, None, false).unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.changed, 1);

        let other = std::fs::read_to_string(dir.path().join("other.json")).unwrap();
        assert_eq!(other, r#"{"name":"{{PROJECT_NAME}}"}"#);
    }

    #[test]
    fn restore_run_round_trips_convert() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("package.json");
        let original = r#"{"name":"foo","author":{"name":"foo"}}"#;
        std::fs::write(&file, original).unwrap();

        run_convert(dir.path(), &project_config(CONFIG), None, false).unwrap();

        let mut values = ValueMap::new();
        values.insert("PROJECT_NAME".to_string(), "foo".to_string());
        let report = run_restore(dir.path(), &values, &[], None, false).unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), original);
    }

    #[test]
    fn restore_missing_value_fails_only_that_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"x":"{{KNOWN}}"}"#).unwrap();
        std::fs::write(dir.path().join("b.json"), r#"{"x":"{{MISSING}}"}"#).unwrap();

        let mut values = ValueMap::new();
        values.insert("KNOWN".to_string(), "v".to_string());
        let report = run_restore(dir.path(), &values, &[], None, false).unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.changed, 1);
        // The failed file is untouched.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("b.json")).unwrap(),
            r#"{"x":"{{MISSING}}"}"#
        );
    }

    #[test]
    fn test_run_verifies_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name":"foo","author":{"name":"foo"}}"#,
        )
        .unwrap();

        let report = run_test(dir.path(), &project_config(CONFIG)).unwrap();
        assert_eq!(report.ok, 1);
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn test_run_handles_escaped_strings() {
        let dir = tempfile::tempdir().unwrap();
        // The located span carries the source escape; the derived value
        // must not be escaped a second time on restore.
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name":"say \"hi\"","author":{"name":"say \"hi\""}}"#,
        )
        .unwrap();

        let report = run_test(dir.path(), &project_config(CONFIG)).unwrap();
        assert_eq!(report.errors, 0);
        assert_eq!(report.ok, 1);
    }

    #[test]
    fn test_run_handles_toml_literal_strings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.toml"), "path = 'C:\\temp'\n").unwrap();

        let config = project_config(
            r#"
[placeholders]
INSTALL_PATH = "install path"

[[rule]]
files = ["app.toml"]
selectors = ["path"]
placeholder = "INSTALL_PATH"
"#,
        );
        let report = run_test(dir.path(), &config).unwrap();
        assert_eq!(report.errors, 0);
        assert_eq!(report.ok, 1);
    }

    #[test]
    fn convert_format_override_beats_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.conf");
        std::fs::write(&file, r#"{"name":"foo"}"#).unwrap();

        let config = project_config(
            r#"
[placeholders]
PROJECT_NAME = "name"

[[rule]]
files = ["app.conf"]
selectors = ["name"]
placeholder = "PROJECT_NAME"
"#,
        );
        let report = run_convert(dir.path(), &config, Some(FileFormat::Json), false).unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            r#"{"name":"{{PROJECT_NAME}}"}"#
        );
    }

    #[test]
    fn test_run_reports_divergent_values() {
        let dir = tempfile::tempdir().unwrap();
        // Same placeholder, two different concrete values.
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name":"foo","author":{"name":"bar"}}"#,
        )
        .unwrap();

        let report = run_test(dir.path(), &project_config(CONFIG)).unwrap();
        assert_eq!(report.errors, 1);
        assert!(report.files[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("divergent"));
    }
}
