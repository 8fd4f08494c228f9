//! Implementation of `goforge clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::core::manifest::Manifest;
use crate::util::fs::remove_dir_all_if_exists;

/// Options for the clean command.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    /// Only drop cache entries, keep artifacts
    pub cache_only: bool,
}

/// Remove build outputs and cache entries. Returns the directories that
/// existed and were removed.
pub fn clean(manifest: &Manifest, opts: CleanOptions) -> Result<Vec<PathBuf>> {
    let mut dirs = vec![manifest.cache_dir()];
    if !opts.cache_only {
        dirs.push(manifest.output_dir());
    }

    let mut removed = Vec::new();
    for dir in dirs {
        if dir.exists() {
            remove_dir_all_if_exists(&dir)?;
            tracing::debug!("removed {}", dir.display());
            removed.push(dir);
        }
    }
    Ok(removed)
}
