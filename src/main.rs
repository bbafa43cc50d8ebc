use anyhow::Result;
use clap::Parser;
use stencil::cli::{AppContext, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG still wins; --verbose only lifts the default floor.
    let default_filter = if cli.verbose { "stencil=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Convert(args) => stencil::convert_run(args, &ctx),
        Commands::Restore(args) => stencil::restore_run(args, &ctx),
        Commands::Validate(args) => stencil::validate_run(args, &ctx),
        Commands::Test(args) => stencil::test_run(args, &ctx),
        Commands::Init(args) => stencil::core::project::init_run(args, &ctx),
        Commands::Completions(args) => stencil::completion::run(args),
    }
}
