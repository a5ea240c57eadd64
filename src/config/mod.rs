//! Site configuration management for `folio.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── hooks      # [hooks]
//! │   ├── serve      # dev_addr
//! │   └── theme      # [theme]
//! ├── error          # ConfigError
//! ├── util           # URL/path helpers, config discovery
//! └── mod.rs         # SiteConfig, ConfigSource (this file)
//! ```
//!
//! # Example
//!
//! ```toml
//! site_name = "My Docs"
//! site_url = "https://example.com/docs/"
//! docs_dir = "docs"
//! dev_addr = "127.0.0.1:8000"
//! watch = ["snippets"]
//!
//! [theme]
//! custom_dir = "overrides"
//! ```

mod error;
pub mod section;
pub mod util;

pub use error::ConfigError;
pub use section::{DevAddr, HookConfig, HooksConfig, ThemeConfig};

use crate::log;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};
use util::{find_config_file, resolve_against};

/// Default config file name, searched upward from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "folio.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing folio.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Site title shown in every page.
    pub site_name: String,

    /// Canonical site URL. Its path component is the serve mount path.
    pub site_url: Option<String>,

    /// Markdown source directory.
    pub docs_dir: PathBuf,

    /// Output directory for `folio build`.
    pub site_dir: PathBuf,

    /// Development server address.
    pub dev_addr: DevAddr,

    /// Extra paths watched while serving.
    pub watch: Vec<PathBuf>,

    /// Theme settings
    pub theme: ThemeConfig,

    /// Lifecycle hook commands
    pub hooks: HooksConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            root: PathBuf::new(),
            site_name: String::new(),
            site_url: None,
            docs_dir: PathBuf::from("docs"),
            site_dir: PathBuf::from("site"),
            dev_addr: DevAddr::default(),
            watch: Vec::new(),
            theme: ThemeConfig::default(),
            hooks: HooksConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Parse configuration from TOML string
    #[cfg(test)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::from)?;
        Ok((config, ignored))
    }

    /// `(host, port)` the development server binds to.
    pub fn dev_addr(&self) -> (&str, u16) {
        (&self.dev_addr.host, self.dev_addr.port)
    }

    /// Path component of `site_url` as `/…/`; `/` when unset.
    pub fn mount_path(&self) -> String {
        let path = match self.site_url.as_deref() {
            Some(url) if url.starts_with('/') => url.trim_matches('/').to_string(),
            Some(url) => util::extract_url_path(url).unwrap_or_default(),
            None => String::new(),
        };
        if path.is_empty() {
            "/".to_string()
        } else {
            format!("/{path}/")
        }
    }

    /// Absolute path of the config file.
    pub fn config_file_path(&self) -> &Path {
        &self.config_path
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Resolve relative paths against the project root.
    fn normalize_paths(&mut self) {
        let root = self.root.clone();
        self.docs_dir = resolve_against(&root, &self.docs_dir);
        self.site_dir = resolve_against(&root, &self.site_dir);
        for path in &mut self.watch {
            *path = resolve_against(&root, path);
        }
        if let Some(dir) = self.theme.custom_dir.take() {
            self.theme.custom_dir = Some(resolve_against(&root, &dir));
        }
    }

    /// Validate field values after normalization.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.site_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "`site_name` must be set to a non-empty string".to_string(),
            ));
        }

        if let Some(url) = &self.site_url
            && !url.is_empty()
            && !url.starts_with('/')
            && url::Url::parse(url).is_err()
        {
            return Err(ConfigError::Validation(format!(
                "`site_url` is not a valid URL: {url}"
            )));
        }

        Ok(())
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }
}

// ============================================================================
// config source
// ============================================================================

/// Everything needed to derive a fresh [`SiteConfig`] snapshot.
///
/// The serve command re-derives configuration for every rebuild, so the
/// config file location and CLI overrides are captured once here.
#[derive(Debug, Default)]
pub struct ConfigSource {
    config_file: Option<PathBuf>,
    dev_addr: Option<DevAddr>,
    extra_watch: Vec<PathBuf>,
    warned: AtomicBool,
}

impl ConfigSource {
    pub fn new(
        config_file: Option<PathBuf>,
        dev_addr: Option<DevAddr>,
        extra_watch: Vec<PathBuf>,
    ) -> Self {
        // Extra watch paths come from the command line, so they are relative to cwd
        let cwd = std::env::current_dir().unwrap_or_default();
        let extra_watch = extra_watch
            .iter()
            .map(|p| resolve_against(&cwd, p))
            .collect();

        Self {
            config_file,
            dev_addr,
            extra_watch,
            warned: AtomicBool::new(false),
        }
    }

    /// Load a configuration snapshot.
    ///
    /// `site_dir`, when given, replaces the configured output directory.
    pub fn load(&self, site_dir: Option<&Path>) -> Result<SiteConfig> {
        let config_path = self.resolve_config_path()?;

        let content = fs::read_to_string(&config_path)
            .map_err(|err| ConfigError::Io(config_path.clone(), err))?;
        let (mut config, ignored) = SiteConfig::parse_with_ignored(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        if !ignored.is_empty() && !self.warned.swap(true, Ordering::Relaxed) {
            SiteConfig::print_unknown_fields_warning(&ignored, &config_path);
        }

        config.root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = config_path;
        config.normalize_paths();
        self.apply_overrides(&mut config, site_dir);
        config.validate()?;

        Ok(config)
    }

    fn resolve_config_path(&self) -> Result<PathBuf, ConfigError> {
        let name = self
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if self.config_file.is_some() {
            let cwd = std::env::current_dir().unwrap_or_default();
            let path = resolve_against(&cwd, &name);
            return if path.is_file() {
                Ok(path)
            } else {
                Err(ConfigError::NotFound(path))
            };
        }

        find_config_file(&name).ok_or(ConfigError::NotFound(name))
    }

    fn apply_overrides(&self, config: &mut SiteConfig, site_dir: Option<&Path>) {
        if let Some(addr) = &self.dev_addr {
            config.dev_addr = addr.clone();
        }
        config.watch.extend(self.extra_watch.iter().cloned());
        if let Some(dir) = site_dir {
            config.site_dir = dir.to_path_buf();
        }
    }
}

/// Parse a config snapshot for tests, rooted at `/site`.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> SiteConfig {
    let mut config = SiteConfig::from_str(content).unwrap();
    config.root = PathBuf::from("/site");
    config.config_path = config.root.join(DEFAULT_CONFIG_FILE);
    config.normalize_paths();
    config
}

// ============================================================================
// tests
// ============================================================================
