//! Source path to output path mapping.
//!
//! | Source (under `docs_dir`) | Output               | URL          |
//! |---------------------------|----------------------|--------------|
//! | `index.md`                | `index.html`         | ``           |
//! | `guide/index.md`          | `guide/index.html`   | `guide/`     |
//! | `404.md`                  | `404.html`           | `404.html`   |
//! | `guide/setup.md`          | `guide/setup/index.html` | `guide/setup/` |

use std::path::{Path, PathBuf};

/// Where a markdown page lands in the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRoute {
    /// Relative output file path
    pub output: PathBuf,
    /// URL path relative to the mount path, without a leading slash
    pub url: String,
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"))
}

/// Route for a markdown file, given its path relative to `docs_dir`.
pub fn page_route(relative: &Path) -> PageRoute {
    let parent = relative.parent().unwrap_or(Path::new(""));
    let stem = relative
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if stem == "404" && parent.as_os_str().is_empty() {
        return PageRoute {
            output: PathBuf::from("404.html"),
            url: "404.html".to_string(),
        };
    }

    let dir = if stem == "index" || stem.eq_ignore_ascii_case("readme") {
        parent.to_path_buf()
    } else {
        parent.join(&stem)
    };

    PageRoute {
        output: dir.join("index.html"),
        url: url_of(&dir),
    }
}

fn url_of(dir: &Path) -> String {
    let parts: Vec<_> = dir
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("{}/", parts.join("/"))
    }
}
