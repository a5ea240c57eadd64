//! `[hooks]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [[hooks.startup]]
//! command = ["./scripts/fetch-changelog.sh", "$FOLIO_ROOT"]
//!
//! [[hooks.serve]]
//! name = "notify"
//! command = ["notify-send", "serving $FOLIO_SERVE_URL"]
//!
//! [[hooks.shutdown]]
//! command = ["rm", "-f", ".folio.lock"]
//! quiet = false
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle hook commands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Run once before the first build.
    pub startup: Vec<HookConfig>,
    /// Run when the development server is about to serve.
    pub serve: Vec<HookConfig>,
    /// Run during shutdown.
    pub shutdown: Vec<HookConfig>,
}

/// Configuration for a single hook command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Whether this hook is enabled (default: true).
    pub enable: bool,

    /// Display name for logging (defaults to command[0]).
    pub name: Option<String>,

    /// Command and arguments to execute.
    /// Supports `$FOLIO_*` variable substitution.
    pub command: Vec<String>,

    /// Suppress output (default: true).
    pub quiet: bool,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            enable: true,
            name: None,
            command: Vec::new(),
            quiet: true,
        }
    }
}

impl HookConfig {
    /// Get the display name for this hook.
    ///
    /// Returns `name` if set, otherwise falls back to `command[0]`.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.command.first().map(String::as_str).unwrap_or("hook"))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_hooks_parse() {
        let config = test_parse_config(
            r#"
site_name = "Docs"

[[hooks.startup]]
command = ["echo", "hello"]

[[hooks.shutdown]]
name = "cleanup"
command = ["rm", "-f", "x"]
quiet = false
enable = false
"#,
        );

        assert_eq!(config.hooks.startup.len(), 1);
        assert!(config.hooks.startup[0].enable);
        assert!(config.hooks.startup[0].quiet);
        assert_eq!(config.hooks.startup[0].display_name(), "echo");

        let cleanup = &config.hooks.shutdown[0];
        assert_eq!(cleanup.display_name(), "cleanup");
        assert!(!cleanup.enable);
        assert!(!cleanup.quiet);
        assert!(config.hooks.serve.is_empty());
    }
}
