//! Hook execution utilities.
//!
//! Provides environment variable building and command execution for
//! lifecycle hooks.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::{CommandMode, Plugins};
use crate::config::{HookConfig, HooksConfig, SiteConfig};
use crate::reload::{Builder, ServerHandle};
use crate::{debug, log};

// ============================================================================
// Command Argument Resolution
// ============================================================================

/// Resolve `$FOLIO_*` variables in command arguments
///
/// Replaces occurrences of `$FOLIO_XXX` with actual values from the vars map.
/// Longer names are substituted first so `$FOLIO_SITE_DIR` is not clobbered
/// by a shorter `$FOLIO_SITE`.
pub fn resolve_args(args: &[String], vars: &FxHashMap<String, String>) -> Vec<String> {
    let mut keys: Vec<_> = vars.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    args.iter()
        .map(|arg| {
            let mut result = arg.clone();
            for key in &keys {
                let pattern = format!("${key}");
                result = result.replace(&pattern, &vars[*key]);
            }
            result
        })
        .collect()
}

// ============================================================================
// Hook Runner
// ============================================================================

/// Dispatches lifecycle hooks by running the configured `[hooks]` commands.
pub struct HookRunner {
    hooks: HooksConfig,
    root: PathBuf,
    vars: RwLock<FxHashMap<String, String>>,
}

impl HookRunner {
    pub fn new(config: &SiteConfig) -> Self {
        let mut vars = FxHashMap::default();
        vars.insert("FOLIO_ROOT".into(), config.get_root().display().to_string());
        vars.insert(
            "FOLIO_SITE_DIR".into(),
            config.site_dir.display().to_string(),
        );

        Self {
            hooks: config.hooks.clone(),
            root: config.get_root().to_path_buf(),
            vars: RwLock::new(vars),
        }
    }

    fn set_var(&self, key: &str, value: impl Into<String>) {
        self.vars.write().insert(key.to_string(), value.into());
    }

    fn run_all(&self, hooks: &[HookConfig], phase: &str) -> Result<()> {
        for hook in hooks {
            run_hook(hook, &self.root, &self.vars.read(), phase)?;
        }
        Ok(())
    }
}

impl Plugins for HookRunner {
    fn on_startup(&self, command: CommandMode, dirty: bool) -> Result<()> {
        self.set_var("FOLIO_COMMAND", command.as_str());
        self.set_var("FOLIO_DIRTY", dirty.to_string());
        self.run_all(&self.hooks.startup, "startup")
    }

    fn on_serve(
        &self,
        server: ServerHandle,
        config: &SiteConfig,
        _builder: &Builder,
    ) -> Result<ServerHandle> {
        let url = config.site_url.clone().unwrap_or_else(|| server.url());
        self.set_var("FOLIO_SERVE_URL", url);
        self.run_all(&self.hooks.serve, "serve")?;
        Ok(server)
    }

    fn on_shutdown(&self) -> Result<()> {
        self.run_all(&self.hooks.shutdown, "shutdown")
    }
}

/// Execute a single hook
///
/// The `phase` parameter is used for logging (e.g., "startup" or "shutdown")
fn run_hook(
    hook: &HookConfig,
    root: &Path,
    vars: &FxHashMap<String, String>,
    phase: &str,
) -> Result<()> {
    if !hook.enable || hook.command.is_empty() {
        return Ok(());
    }

    let resolved = resolve_args(&hook.command, vars);
    let Some((program, args)) = resolved.split_first() else {
        return Ok(());
    };

    if hook.quiet {
        debug!(phase; "`{}` running", hook.display_name());
    } else {
        log!(phase; "`{}` running", hook.display_name());
    }

    let output = Command::new(program)
        .args(args)
        .current_dir(root)
        .envs(vars)
        .output()
        .with_context(|| format!("failed to run hook `{}`", hook.display_name()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "hook `{}` exited with {}: {}",
            hook.display_name(),
            output.status,
            stderr.trim()
        );
    }

    if !hook.quiet {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if !stdout.is_empty() {
            println!("{stdout}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeServer;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> FxHashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn hook(command: &[&str]) -> HookConfig {
        HookConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            ..HookConfig::default()
        }
    }

    fn runner_with(temp: &TempDir, hooks: HooksConfig) -> HookRunner {
        let config = SiteConfig {
            root: temp.path().to_path_buf(),
            site_dir: temp.path().join("site"),
            hooks,
            ..SiteConfig::default()
        };
        HookRunner::new(&config)
    }

    #[test]
    fn test_resolve_args() {
        let vars = vars(&[("FOLIO_SITE_DIR", "/tmp/ws"), ("FOLIO_ROOT", "/srv")]);
        let args = vec![
            "cp".to_string(),
            "$FOLIO_ROOT/extra".to_string(),
            "$FOLIO_SITE_DIR".to_string(),
            "plain".to_string(),
        ];
        assert_eq!(
            resolve_args(&args, &vars),
            vec!["cp", "/srv/extra", "/tmp/ws", "plain"]
        );
    }

    #[test]
    fn test_resolve_args_prefers_longest_name() {
        let vars = vars(&[("FOLIO_SITE", "short"), ("FOLIO_SITE_DIR", "long")]);
        let args = vec!["$FOLIO_SITE_DIR".to_string()];
        assert_eq!(resolve_args(&args, &vars), vec!["long"]);
    }

    #[test]
    fn test_disabled_and_empty_hooks_are_skipped() {
        let temp = TempDir::new().unwrap();
        let disabled = HookConfig {
            enable: false,
            ..hook(&["definitely-not-a-real-program"])
        };
        let hooks = HooksConfig {
            shutdown: vec![disabled, HookConfig::default()],
            ..HooksConfig::default()
        };
        assert!(runner_with(&temp, hooks).on_shutdown().is_ok());
    }

    #[test]
    fn test_missing_program_is_an_error() {
        let temp = TempDir::new().unwrap();
        let hooks = HooksConfig {
            startup: vec![hook(&["definitely-not-a-real-program-folio"])],
            ..HooksConfig::default()
        };
        let err = runner_with(&temp, hooks)
            .on_startup(CommandMode::Serve, false)
            .unwrap_err();
        assert!(format!("{err:#}").contains("definitely-not-a-real-program-folio"));
    }

    #[cfg(unix)]
    #[test]
    fn test_startup_hook_sees_command_env() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("marker");
        let script = format!(
            "printf '%s %s' \"$FOLIO_COMMAND\" \"$FOLIO_DIRTY\" > {}",
            marker.display()
        );
        let hooks = HooksConfig {
            startup: vec![hook(&["sh", "-c", &script])],
            ..HooksConfig::default()
        };

        runner_with(&temp, hooks)
            .on_startup(CommandMode::Build, true)
            .unwrap();
        assert_eq!(std::fs::read_to_string(marker).unwrap(), "build true");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_hook_reports_status() {
        let temp = TempDir::new().unwrap();
        let hooks = HooksConfig {
            shutdown: vec![hook(&["sh", "-c", "echo boom >&2; exit 3"])],
            ..HooksConfig::default()
        };
        let err = runner_with(&temp, hooks).on_shutdown().unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
    }

    #[test]
    fn test_on_serve_returns_same_handle() {
        let temp = TempDir::new().unwrap();
        let runner = runner_with(&temp, HooksConfig::default());
        let server: ServerHandle = Arc::new(FakeServer::live());
        let builder: Builder = Arc::new(|_| Ok(()));

        let returned = runner
            .on_serve(Arc::clone(&server), &SiteConfig::default(), &builder)
            .unwrap();
        assert!(Arc::ptr_eq(&server, &returned));
    }
}
