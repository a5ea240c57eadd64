//! Markdown site build.
//!
//! [`build`] turns `docs_dir` into a static site under `site_dir`:
//!
//! 1. markdown pages are rendered in parallel and wrapped in the page template
//! 2. every other file is copied as is, followed by theme assets
//! 3. a default `404.html` is written when the docs do not provide one
//!
//! Every call is a full build. Non-dirty builds write into a staging
//! directory next to the output and replace the output's contents only once
//! the whole site was produced, so a failed build leaves the previous output
//! in place. Dirty builds write in place and skip pages and files whose
//! output is already newer than the source.

mod markdown;
mod route;

use markdown::render;
use route::{is_markdown, page_route};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use jwalk::WalkDir;
use rayon::prelude::*;
use tempfile::TempDir;
use thiserror::Error;

use crate::config::SiteConfig;
use crate::debug;
use crate::embed::TemplateVars;
use crate::embed::build::{NOT_FOUND_HTML, PAGE_HTML, PageVars};
use crate::embed::serve::LIVERELOAD_JS_NAME;
use crate::utils::html::escape;

/// Name of the page template inside `theme.custom_dir`.
pub const THEME_TEMPLATE: &str = "main.html";

const IGNORED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];
const STAGING_PREFIX: &str = ".folio-staging-";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("docs directory `{0}` does not exist")]
    MissingDocs(PathBuf),

    #[error("failed to read `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to walk `{path}`: {message}")]
    Walk { path: PathBuf, message: String },
}

/// What a build produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub pages: usize,
    pub copied: usize,
    /// Pages and files left alone by a dirty build
    pub skipped: usize,
}

/// Populate `config.site_dir` from `config.docs_dir`.
///
/// With `live_reload_url`, every page loads `{url}livereload.js`; without it
/// the output is production-equivalent.
pub fn build(
    config: &SiteConfig,
    live_reload_url: Option<&str>,
    dirty: bool,
) -> Result<BuildReport, BuildError> {
    let docs = config.docs_dir.as_path();
    if !docs.is_dir() {
        return Err(BuildError::MissingDocs(docs.to_path_buf()));
    }

    let out = config.site_dir.as_path();
    if dirty {
        create_dir(out)?;
        return populate(config, live_reload_url, out, true);
    }

    let staging = staging_dir(out)?;
    let report = populate(config, live_reload_url, staging.path(), false)?;
    swap_in(staging.path(), out)?;
    Ok(report)
}

/// Write the whole site into `out`.
fn populate(
    config: &SiteConfig,
    live_reload_url: Option<&str>,
    out: &Path,
    dirty: bool,
) -> Result<BuildReport, BuildError> {
    let docs = config.docs_dir.as_path();
    let files = collect_files(docs)?;
    let (pages, assets): (Vec<_>, Vec<_>) = files.into_iter().partition(|p| is_markdown(p));

    let page_ctx = PageContext::new(config, live_reload_url)?;
    let rendered = pages
        .par_iter()
        .map(|rel| page_ctx.render_page(rel, docs, out, dirty))
        .collect::<Result<Vec<bool>, BuildError>>()?;

    let copied = assets
        .par_iter()
        .map(|rel| copy_file(&docs.join(rel), &out.join(rel), dirty))
        .collect::<Result<Vec<bool>, BuildError>>()?;

    let mut theme_copied = Vec::new();
    for dir in config.theme.dirs() {
        if !dir.is_dir() {
            continue;
        }
        for rel in collect_files(&dir)? {
            if rel == Path::new(THEME_TEMPLATE) {
                continue;
            }
            theme_copied.push(copy_file(&dir.join(&rel), &out.join(&rel), dirty)?);
        }
    }

    let has_404 = pages.iter().any(|rel| page_route(rel).output == Path::new("404.html"));
    if !has_404 {
        page_ctx.write_not_found(out)?;
    }

    let written = |v: &[bool]| v.iter().filter(|&&w| w).count();
    let report = BuildReport {
        pages: written(&rendered),
        copied: written(&copied) + written(&theme_copied),
        skipped: rendered.len() + copied.len() + theme_copied.len()
            - written(&rendered)
            - written(&copied)
            - written(&theme_copied),
    };
    debug!(
        "build";
        "{} pages, {} files copied, {} unchanged",
        report.pages,
        report.copied,
        report.skipped
    );
    Ok(report)
}

/// Shared per-build inputs of page rendering.
struct PageContext {
    site_name: String,
    /// Absolute or root-relative base URL ending in `/`
    base_url: String,
    /// Path component of `base_url`
    mount_path: String,
    livereload: String,
    template: PageTemplate,
}

enum PageTemplate {
    Builtin,
    Custom(String),
}

impl PageContext {
    fn new(config: &SiteConfig, live_reload_url: Option<&str>) -> Result<Self, BuildError> {
        let mount_path = config.mount_path();
        let base_url = match config.site_url.as_deref() {
            Some(url) if !url.is_empty() => format!("{}/", url.trim_end_matches('/')),
            _ => mount_path.clone(),
        };

        let livereload = live_reload_url
            .map(|url| {
                format!(
                    r#"<script src="{}/{}"></script>"#,
                    escape(url.trim_end_matches('/')),
                    LIVERELOAD_JS_NAME
                )
            })
            .unwrap_or_default();

        let template = match config.theme.custom_dir.as_deref() {
            Some(dir) if dir.join(THEME_TEMPLATE).is_file() => {
                let path = dir.join(THEME_TEMPLATE);
                let content =
                    fs::read_to_string(&path).map_err(|source| BuildError::Read { path, source })?;
                PageTemplate::Custom(content)
            }
            _ => PageTemplate::Builtin,
        };

        Ok(Self {
            site_name: config.site_name.clone(),
            base_url,
            mount_path,
            livereload,
            template,
        })
    }

    fn wrap(&self, title: &str, content: &str, url: &str) -> String {
        let canonical = format!("{}{}", self.base_url, url);
        let title = escape(title);
        let site_name = escape(&self.site_name);
        let vars = PageVars {
            title: &title,
            site_name: &site_name,
            content,
            canonical: &canonical,
            base: &self.mount_path,
            livereload: &self.livereload,
        };
        match &self.template {
            PageTemplate::Builtin => PAGE_HTML.render(&vars),
            PageTemplate::Custom(content) => vars.apply(content),
        }
    }

    /// Render one page; `Ok(false)` when a dirty build left it alone.
    fn render_page(&self, rel: &Path, docs: &Path, out: &Path, dirty: bool) -> Result<bool, BuildError> {
        let source = docs.join(rel);
        let route = page_route(rel);
        let target = out.join(&route.output);

        if dirty && is_up_to_date(&source, &target) {
            return Ok(false);
        }

        let markdown = fs::read_to_string(&source).map_err(|source_err| BuildError::Read {
            path: source.clone(),
            source: source_err,
        })?;
        let page = render(&markdown);
        let title = page.title.unwrap_or_else(|| default_title(rel, &self.site_name));

        write_file(&target, self.wrap(&title, &page.html, &route.url).as_bytes())?;
        Ok(true)
    }

    fn write_not_found(&self, out: &Path) -> Result<(), BuildError> {
        let site_name = escape(&self.site_name);
        let html = NOT_FOUND_HTML.render(&PageVars {
            title: "404",
            site_name: &site_name,
            content: "",
            canonical: "",
            base: &self.mount_path,
            livereload: &self.livereload,
        });
        write_file(&out.join("404.html"), html.as_bytes())
    }
}

/// File stem, or the site name for index pages.
fn default_title(rel: &Path, site_name: &str) -> String {
    match rel.file_stem().and_then(|s| s.to_str()) {
        Some("index") | None => site_name.to_string(),
        Some(stem) => stem.replace(['-', '_'], " "),
    }
}

/// Relative paths of all non-hidden files under `dir`, sorted.
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).skip_hidden(true).sort(true) {
        let entry = entry.map_err(|e| BuildError::Walk {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_str().unwrap_or_default();
        if IGNORED_FILES.contains(&name) {
            continue;
        }
        let path = entry.path();
        if let Ok(rel) = path.strip_prefix(dir) {
            files.push(rel.to_path_buf());
        }
    }
    Ok(files)
}

fn is_up_to_date(source: &Path, target: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(source), modified(target)) {
        (Some(src), Some(dst)) => dst >= src,
        _ => false,
    }
}

fn copy_file(source: &Path, target: &Path, dirty: bool) -> Result<bool, BuildError> {
    if dirty && is_up_to_date(source, target) {
        return Ok(false);
    }
    create_parent(target)?;
    fs::copy(source, target).map_err(|source_err| BuildError::Write {
        path: target.to_path_buf(),
        source: source_err,
    })?;
    Ok(true)
}

fn write_file(target: &Path, content: &[u8]) -> Result<(), BuildError> {
    create_parent(target)?;
    fs::write(target, content).map_err(|source| BuildError::Write {
        path: target.to_path_buf(),
        source,
    })
}

fn create_parent(path: &Path) -> Result<(), BuildError> {
    match path.parent() {
        Some(parent) => create_dir(parent),
        None => Ok(()),
    }
}

fn create_dir(dir: &Path) -> Result<(), BuildError> {
    fs::create_dir_all(dir).map_err(|source| BuildError::Write {
        path: dir.to_path_buf(),
        source,
    })
}

/// Fresh hidden directory beside `out`, removed again when dropped.
fn staging_dir(out: &Path) -> Result<TempDir, BuildError> {
    let parent = match out.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    create_dir(parent)?;
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)
        .map_err(|source| BuildError::Write {
            path: parent.to_path_buf(),
            source,
        })
}

/// Replace the contents of `out` with those of `staging`.
///
/// Both live in the same parent, so every entry moves by rename.
fn swap_in(staging: &Path, out: &Path) -> Result<(), BuildError> {
    clean_dir(out)?;
    let entries = fs::read_dir(staging).map_err(|source| BuildError::Read {
        path: staging.to_path_buf(),
        source,
    })?;
    for entry in entries.flatten() {
        let target = out.join(entry.file_name());
        fs::rename(entry.path(), &target)
            .map_err(|source| BuildError::Write { path: target, source })?;
    }
    Ok(())
}

/// Empty `dir`, keeping the directory itself.
fn clean_dir(dir: &Path) -> Result<(), BuildError> {
    create_dir(dir)?;
    let entries = fs::read_dir(dir).map_err(|source| BuildError::Read {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        let removed = if entry.file_type().is_ok_and(|t| t.is_dir()) {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|source| BuildError::Write { path, source })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThemeConfig;
    use tempfile::TempDir;

    struct Project {
        _temp: TempDir,
        config: SiteConfig,
    }

    fn project(files: &[(&str, &str)]) -> Project {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        for (rel, content) in files {
            let path = docs.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        fs::create_dir_all(&docs).unwrap();

        let config = SiteConfig {
            root: temp.path().to_path_buf(),
            site_name: "Manual".to_string(),
            docs_dir: docs,
            site_dir: temp.path().join("out"),
            ..SiteConfig::default()
        };
        Project {
            _temp: temp,
            config,
        }
    }

    fn read(config: &SiteConfig, rel: &str) -> String {
        fs::read_to_string(config.site_dir.join(rel)).unwrap()
    }

    #[test]
    fn test_build_pages_and_assets() {
        let p = project(&[
            ("index.md", "# Index File\n"),
            ("signature.md", "token-123\n"),
            ("img/logo.svg", "<svg/>"),
            (".hidden.md", "# secret"),
        ]);

        let report = build(&p.config, None, false).unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(report.copied, 1);

        let index = read(&p.config, "index.html");
        assert!(index.contains("<h1>Index File</h1>"));
        assert!(index.contains("<title>Index File - Manual</title>"));
        assert!(read(&p.config, "signature/index.html").contains("token-123"));
        assert_eq!(read(&p.config, "img/logo.svg"), "<svg/>");
        assert!(!p.config.site_dir.join(".hidden/index.html").exists());
    }

    #[test]
    fn test_live_reload_script_only_when_url_given() {
        let p = project(&[("index.md", "# Home\n")]);

        build(&p.config, Some("http://127.0.0.1:8000/"), false).unwrap();
        assert!(read(&p.config, "index.html")
            .contains(r#"<script src="http://127.0.0.1:8000/livereload.js"></script>"#));

        build(&p.config, None, false).unwrap();
        assert!(!read(&p.config, "index.html").contains("livereload.js"));
    }

    #[test]
    fn test_canonical_uses_site_url() {
        let mut p = project(&[("guide.md", "# Guide\n")]);
        p.config.site_url = Some("http://127.0.0.1:8000/docs/".to_string());

        build(&p.config, None, false).unwrap();
        let guide = read(&p.config, "guide/index.html");
        assert!(guide.contains(r#"href="http://127.0.0.1:8000/docs/guide/""#));
        assert!(guide.contains(r#"<a href="/docs/">Manual</a>"#));
    }

    #[test]
    fn test_default_404_unless_provided() {
        let p = project(&[("index.md", "# Home\n")]);
        build(&p.config, None, false).unwrap();
        assert!(read(&p.config, "404.html").contains("Page not found"));

        let p = project(&[("404.md", "# Lost\n")]);
        build(&p.config, None, false).unwrap();
        assert!(read(&p.config, "404.html").contains("<h1>Lost</h1>"));
    }

    #[test]
    fn test_clean_build_removes_stale_output() {
        let p = project(&[("index.md", "# Home\n")]);
        fs::create_dir_all(p.config.site_dir.join("old")).unwrap();
        fs::write(p.config.site_dir.join("old/index.html"), "stale").unwrap();
        fs::write(p.config.site_dir.join("stale.txt"), "stale").unwrap();

        build(&p.config, None, false).unwrap();
        assert!(p.config.site_dir.is_dir());
        assert!(!p.config.site_dir.join("old").exists());
        assert!(!p.config.site_dir.join("stale.txt").exists());
    }

    #[test]
    fn test_failed_build_keeps_previous_output() {
        let p = project(&[("index.md", "# Home\n"), ("img/logo.svg", "<svg/>")]);
        build(&p.config, None, false).unwrap();

        fs::write(p.config.docs_dir.join("bad.md"), b"# bad \xff\xfe").unwrap();
        assert!(matches!(
            build(&p.config, None, false),
            Err(BuildError::Read { .. })
        ));

        assert!(read(&p.config, "index.html").contains("<h1>Home</h1>"));
        assert!(read(&p.config, "404.html").contains("Page not found"));
        assert_eq!(read(&p.config, "img/logo.svg"), "<svg/>");
        assert!(!p.config.site_dir.join("bad/index.html").exists());

        let leftovers = fs::read_dir(&p.config.root)
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_dirty_build_skips_fresh_output() {
        let p = project(&[("index.md", "# Home\n"), ("a.txt", "a")]);
        build(&p.config, None, false).unwrap();
        fs::write(p.config.site_dir.join("extra.txt"), "kept").unwrap();

        let report = build(&p.config, None, true).unwrap();
        assert_eq!(report.pages, 0);
        assert_eq!(report.skipped, 2);
        assert!(p.config.site_dir.join("extra.txt").exists());
    }

    #[test]
    fn test_custom_theme_template_and_assets() {
        let mut p = project(&[("index.md", "# Home\n")]);
        let theme = p.config.root.join("overrides");
        fs::create_dir_all(theme.join("css")).unwrap();
        fs::write(
            theme.join(THEME_TEMPLATE),
            "<body data-site=\"{{ site_name }}\">{{ content }}{{ livereload }}</body>",
        )
        .unwrap();
        fs::write(theme.join("css/extra.css"), "body{}").unwrap();
        p.config.theme = ThemeConfig {
            custom_dir: Some(theme),
        };

        build(&p.config, Some("/"), false).unwrap();
        let index = read(&p.config, "index.html");
        assert!(index.starts_with("<body data-site=\"Manual\"><h1>Home</h1>"));
        assert!(index.contains("/livereload.js"));
        assert_eq!(read(&p.config, "css/extra.css"), "body{}");
        assert!(!p.config.site_dir.join(THEME_TEMPLATE).exists());
    }

    #[test]
    fn test_missing_docs_dir() {
        let p = project(&[]);
        fs::remove_dir_all(&p.config.docs_dir).unwrap();
        assert!(matches!(
            build(&p.config, None, false),
            Err(BuildError::MissingDocs(_))
        ));
    }

    #[test]
    fn test_default_title() {
        assert_eq!(default_title(Path::new("index.md"), "Manual"), "Manual");
        assert_eq!(default_title(Path::new("getting-started.md"), "Manual"), "getting started");
    }
}
