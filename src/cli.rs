use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
}

#[derive(Parser)]
#[command(name = "stencil")]
#[command(
    about = "Turn a working project into a reusable template and back: replace concrete values with placeholders, then substitute them again"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without writing any files
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable debug-level diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replace configured values with placeholder tokens in place
    Convert(ConvertArgs),

    /// Substitute concrete values for placeholder tokens in place
    Restore(RestoreArgs),

    /// Run the full matching pass without writing anything
    Validate(ValidateArgs),

    /// Verify convert+restore round-trips byte-for-byte
    Test(TestArgs),

    /// Initialize a stencil.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser)]
pub struct ConvertArgs {
    /// Project root (or a single file covered by the config)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Project config file
    #[arg(short, long, default_value = "stencil.toml")]
    pub config: PathBuf,

    /// Force a format instead of detecting by extension (json, toml, prose, markup, component)
    #[arg(long)]
    pub format: Option<String>,

    /// Emit the run report as JSON (single line)
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct RestoreArgs {
    /// Template root or a single template file
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Placeholder value (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<String>,

    /// TOML or JSON file mapping placeholder names to values
    #[arg(long, value_name = "FILE")]
    pub values: Option<PathBuf>,

    /// Force a format instead of detecting by extension (json, toml, prose, markup, component)
    #[arg(long)]
    pub format: Option<String>,

    /// Additional glob patterns to ignore
    #[arg(short, long)]
    pub ignore: Vec<String>,

    /// Emit the run report as JSON (single line)
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Project config file
    #[arg(short, long, default_value = "stencil.toml")]
    pub config: PathBuf,

    /// Emit the run report as JSON (single line)
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct TestArgs {
    /// Project root
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Project config file
    #[arg(short, long, default_value = "stencil.toml")]
    pub config: PathBuf,

    /// Emit the run report as JSON (single line)
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
