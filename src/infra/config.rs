//! Application settings
//!
//! Layered over the `[settings]` table of `stencil.toml` plus `STENCIL__`
//! environment variables. This is the ambient app config; the placeholder
//! rules live in `core::project`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Ignore patterns applied on top of .gitignore when walking
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Default values file consulted by `restore` when --values is absent
    #[serde(default)]
    pub values_file: Option<String>,
}

fn default_ignore_patterns() -> Vec<String> {
    ["target/**", "node_modules/**", "dist/**", "build/**"]
        .map(String::from)
        .to_vec()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ignore_patterns: default_ignore_patterns(),
            values_file: None,
        }
    }
}

pub fn load_settings() -> Result<Settings> {
    let mut builder = config::Config::builder();

    if Path::new("stencil.toml").exists() {
        builder = builder.add_source(config::File::with_name("stencil"));
    }

    // Double underscore keeps snake_case keys addressable, e.g.
    // STENCIL__SETTINGS__VALUES_FILE.
    builder = builder.add_source(config::Environment::with_prefix("STENCIL").separator("__"));

    let cfg = builder.build().context("Failed to load configuration")?;

    // A missing table falls back to defaults; a malformed one is an error
    // the user must see, never silently discarded.
    match cfg.get::<Settings>("settings") {
        Ok(settings) => Ok(settings),
        Err(config::ConfigError::NotFound(_)) => Ok(Settings::default()),
        Err(e) => Err(e).context("invalid [settings] table"),
    }
}
