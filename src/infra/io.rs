//! File I/O helpers
//!
//! The engine itself never touches the filesystem; the runner reads content
//! up front and publishes results through `write_atomic`, so a crash
//! mid-write never leaves a half-updated file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file {}", path.display()))
}

/// Atomic write: stage to a same-directory tempfile, fsync, then persist
/// over the destination. Staging in the destination directory keeps the
/// final rename on one filesystem; a non-atomic fallback would risk a
/// torn file, so failures here are hard errors.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    // Preserve original permissions
    #[cfg(unix)]
    let perms = fs::metadata(path)
        .map(|m| m.permissions())
        .unwrap_or_else(|_| std::os::unix::fs::PermissionsExt::from_mode(0o644));
    #[cfg(not(unix))]
    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;

    // Write the content fully
    use std::io::Write;
    let mut file = tmp.as_file();
    file.set_len(0)?;
    file.write_all(data)?;
    file.sync_all()?;

    // Apply permissions to the temp file (best effort)
    #[cfg(unix)]
    fs::set_permissions(tmp.path(), perms).context("set temp permissions")?;
    #[cfg(not(unix))]
    if let Some(perms) = perms {
        fs::set_permissions(tmp.path(), perms).context("set temp permissions")?;
    }

    // fsync parent dir to ensure durability on Unix
    #[cfg(unix)]
    {
        if let Ok(parent_file) = std::fs::File::open(dir) {
            let _ = parent_file.sync_all();
        }
    }

    // Atomically replace the destination
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("atomically replace {}", path.display()))?;

    Ok(())
}
