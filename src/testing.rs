//! Test doubles shared by unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, bail};
use parking_lot::Mutex;

use crate::config::SiteConfig;
use crate::hooks::{CommandMode, Plugins};
use crate::reload::{Builder, ErrorHandler, LiveReload, ServerHandle};

/// How a fake step behaves when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Succeed,
    Fail,
    Panic,
}

impl Outcome {
    fn apply(self, what: &str) -> Result<()> {
        match self {
            Self::Succeed => Ok(()),
            Self::Fail => bail!("{what} failed"),
            Self::Panic => panic!("{what} panicked"),
        }
    }
}

/// In-memory live reload server.
#[derive(Default)]
pub struct FakeServer {
    pub live: AtomicBool,
    pub shutdowns: AtomicUsize,
    pub serves: AtomicUsize,
    pub on_shutdown: Outcome,
    pub watched: Mutex<Vec<PathBuf>>,
    pub error_handler: Mutex<Option<ErrorHandler>>,
    /// Runs at the start of `serve`.
    pub before_serve: Option<Box<dyn Fn() + Send + Sync>>,
}

impl FakeServer {
    pub fn live() -> Self {
        Self {
            live: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl LiveReload for FakeServer {
    fn watch(&self, path: &Path) {
        let mut watched = self.watched.lock();
        if !watched.iter().any(|p| p == path) {
            watched.push(path.to_path_buf());
        }
    }

    fn serve(&self, _open_in_browser: bool) -> Result<()> {
        self.serves.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.before_serve {
            hook();
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
        self.on_shutdown.apply("server shutdown")
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        *self.error_handler.lock() = Some(handler);
    }

    fn url(&self) -> String {
        "http://127.0.0.1:0/".to_string()
    }
}

/// Plugin dispatcher counting calls.
#[derive(Default)]
pub struct FakePlugins {
    pub startups: Mutex<Vec<(CommandMode, bool)>>,
    pub serves: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub on_shutdown: Outcome,
    /// Handle returned from `on_serve` instead of the one passed in.
    pub replacement: Mutex<Option<ServerHandle>>,
}

impl FakePlugins {
    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl Plugins for FakePlugins {
    fn on_startup(&self, command: CommandMode, dirty: bool) -> Result<()> {
        self.startups.lock().push((command, dirty));
        Ok(())
    }

    fn on_serve(
        &self,
        server: ServerHandle,
        _config: &SiteConfig,
        _builder: &Builder,
    ) -> Result<ServerHandle> {
        self.serves.fetch_add(1, Ordering::SeqCst);
        Ok(self.replacement.lock().clone().unwrap_or(server))
    }

    fn on_shutdown(&self) -> Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.on_shutdown.apply("shutdown hook")
    }
}
