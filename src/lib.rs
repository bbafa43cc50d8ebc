//! **stencil** - Turn a working project into a reusable template and back
//!
//! Locates configured values inside structured data, prose, markup, and
//! component files, swaps them for `{{PLACEHOLDER}}` tokens, and substitutes
//! concrete values back in, preserving every byte it did not change.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Core engine - change model, strategies, restoration, and run orchestration
pub mod core {
    /// Change model, placeholder grammar, and ordered span application
    pub mod change;
    pub use change::{Change, TemplatizeConfig, ValueMap, apply_changes, token_for};

    /// Format detection and strategy dispatch
    pub mod dispatch;
    pub use dispatch::{FileFormat, strategy_for};

    /// Engine error taxonomy and non-fatal match warnings
    pub mod error;
    pub use error::{Error, MatchWarning};

    /// Project-level placeholder rules (stencil.toml)
    pub mod project;
    pub use project::{ProjectConfig, Rule};

    /// Placeholder-to-value substitution
    pub mod restore;
    pub use restore::restore;

    /// Multi-file runs, per-file isolation, and the run report
    pub mod runner;
    pub use runner::{
        FileReport, FileStatus, RunReport, Stage, convert_run, restore_run, run_convert,
        run_restore, run_test, run_validate, test_run, validate_run,
    };

    /// CSS-style selector chains for markup and component matching
    pub mod selector;
    pub use selector::SelectorChain;

    /// Skip directive scanning
    pub mod skip;
    pub use skip::SkipSpan;

    /// Format strategies - structured data, prose, markup, components
    pub mod strategy;
    pub use strategy::{Candidate, Proposal, Resolution, Strategy, convert, propose};
}

/// Infrastructure - Configuration, I/O, and directory walking
pub mod infra {
    /// Application settings layered from stencil.toml and environment
    pub mod config;
    pub use config::{Settings, load_settings};

    /// Atomic file writes
    pub mod io;
    pub use io::{read_file, write_atomic};

    /// Gitignore-aware directory walking
    pub mod walk;
    pub use walk::FileWalker;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::{convert_run, restore_run, test_run, validate_run};
pub use infra::{FileWalker, Settings};

// Core types for external consumers
pub use core::{
    Change, Error, FileFormat, FileReport, MatchWarning, ProjectConfig, RunReport,
    TemplatizeConfig, ValueMap,
};
