//! Staged record listing

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Absolute, symlink-free form of `data_dir`.
///
/// Listing and shard URLs must both start from this path so that
/// `./data`, `data/` and `/abs/data` give the same relative names.
pub fn resolve_data_dir(data_dir: &Path) -> Result<PathBuf> {
    data_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve data directory {}", data_dir.display()))
}

/// All `*.xml` files under `data_dir` (recursive), ordered by their
/// `/`-separated path relative to `data_dir`.
///
/// Shard boundaries are defined by positions in this list, so the order must
/// be identical on every run over the same files. Returned paths are rooted
/// at [`resolve_data_dir`]. An unreadable entry fails the listing rather than
/// shifting every later index.
pub fn list_staged_files(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let root = resolve_data_dir(data_dir)?;
    let pattern = format!(
        "{}/**/*.xml",
        glob::Pattern::escape(&root.to_string_lossy())
    );

    let mut files = Vec::new();
    for entry in glob::glob(&pattern).context("invalid glob pattern")? {
        let path = entry.with_context(|| format!("Failed to list {}", root.display()))?;
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort_by_cached_key(|f| relative_url(f, &root));
    log::debug!("{} staged files under {}", files.len(), root.display());
    Ok(files)
}

/// Path of `file` relative to `data_dir`, always with `/` separators.
pub fn relative_url(file: &Path, data_dir: &Path) -> String {
    let rel = file.strip_prefix(data_dir).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
