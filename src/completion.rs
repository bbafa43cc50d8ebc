//! Shell completion generation using clap_complete.

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, generate_to};
use std::{fs, io};

use crate::cli::{Cli, CompletionsArgs};

/// Generate a completion script for the requested shell, either to stdout
/// or into `--out-dir` under the shell's conventional file name.
pub fn run(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();

    if args.stdout {
        generate(args.shell, &mut cmd, "stencil", &mut io::stdout());
        return Ok(());
    }

    let dir = args
        .out_dir
        .ok_or_else(|| anyhow::anyhow!("--out-dir is required unless --stdout is set"))?;

    fs::create_dir_all(&dir).context("create --out-dir")?;
    let path =
        generate_to(args.shell, &mut cmd, "stencil", &dir).context("generate completion file")?;

    eprintln!("Wrote completion to {}", path.display());
    Ok(())
}
