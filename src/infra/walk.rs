//! Gitignore-aware file walker.
//! - Respects .gitignore, .git/info/exclude, and global gitignore
//! - Extra ignore globs on top
//! - Deterministic ordering for stable tests/CI
//!
//! Backed by ripgrep's `ignore` crate and `globset`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

/// Gitignore-aware walker with optional extra ignore globs.
pub struct FileWalker {
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,
}

impl FileWalker {
    /// Build a walker with additional ignore patterns (e.g., "target/**",
    /// "node_modules/**"). Patterns match on paths relative to the root.
    pub fn new(additional_ignores: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in additional_ignores {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            ignore_patterns: builder.build()?,
        })
    }

    /// Collect all files under `root`, sorted for determinism.
    pub fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkBuilder::new(root)
            .hidden(false)
            .follow_links(false)
            .build()
        {
            let entry = entry?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.into_path();
            let rel = path.strip_prefix(root).unwrap_or(&path);
            if rel.components().any(|c| c.as_os_str() == ".git") {
                continue;
            }
            if self.ignore_patterns.is_match(rel) {
                continue;
            }
            files.push(path);
        }

        files.sort();
        Ok(files)
    }
}
