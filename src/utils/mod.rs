//! Shared helpers.

pub mod html;
pub mod mime;

use std::path::{Path, PathBuf};

/// Absolute, symlink-resolved form of `path`.
///
/// Falls back to joining with the current directory when the path does not
/// exist yet.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}
