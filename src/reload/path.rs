//! URL to filesystem path resolution.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Resolve a URL path (already stripped of the mount path) under `serve_root`.
///
/// Directories resolve to their `index.html`. Anything that would escape the
/// root, including through symlinks, resolves to `None`.
pub fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);

    if clean.split('/').any(|segment| segment == "..") {
        return None;
    }

    let local = serve_root.join(&clean);

    let canonical = local.canonicalize().ok()?;
    let root_canonical = serve_root.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    if canonical.is_dir() {
        let index = canonical.join("index.html");
        if index.is_file() {
            return Some(index);
        }
    }

    None
}

/// Strip the query string, then percent-decode and trim slashes.
fn normalize_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();

    decoded.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "home").unwrap();
        fs::create_dir_all(dir.path().join("guide")).unwrap();
        fs::write(dir.path().join("guide/index.html"), "guide").unwrap();
        fs::write(dir.path().join("with space.txt"), "spaced").unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        dir
    }

    #[test]
    fn test_root_and_directory_index() {
        let dir = site();
        let root = resolve_path("/", dir.path()).unwrap();
        assert_eq!(fs::read_to_string(root).unwrap(), "home");

        let guide = resolve_path("/guide/", dir.path()).unwrap();
        assert_eq!(fs::read_to_string(guide).unwrap(), "guide");

        let no_slash = resolve_path("guide", dir.path()).unwrap();
        assert!(no_slash.ends_with("guide/index.html"));
    }

    #[test]
    fn test_query_and_percent_decoding() {
        let dir = site();
        assert!(resolve_path("/guide/?v=1", dir.path()).is_some());
        let spaced = resolve_path("/with%20space.txt", dir.path()).unwrap();
        assert_eq!(fs::read_to_string(spaced).unwrap(), "spaced");
    }

    #[test]
    fn test_missing_and_indexless() {
        let dir = site();
        assert!(resolve_path("/nope.html", dir.path()).is_none());
        assert!(resolve_path("/empty/", dir.path()).is_none());
    }

    #[test]
    fn test_rejects_traversal() {
        let dir = site();
        assert!(resolve_path("/../etc/passwd", dir.path()).is_none());
        assert!(resolve_path("/guide/%2e%2e/%2e%2e/secret", dir.path()).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        let dir = site();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(resolve_path("/link/secret.txt", dir.path()).is_none());
    }
}
