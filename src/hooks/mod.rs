//! Lifecycle hooks.
//!
//! This module provides:
//! - `Plugins`: the dispatch points the serve and build commands call
//! - `runner`: the shipped dispatcher, running `[hooks]` commands

mod runner;

pub use runner::HookRunner;

use anyhow::Result;

use crate::config::SiteConfig;
use crate::reload::{Builder, ServerHandle};

/// Command a session was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandMode {
    /// Clean, production-equivalent build.
    Build,
    /// Development server.
    Serve,
}

impl CommandMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Serve => "serve",
        }
    }
}

/// Extension points dispatched at fixed lifecycle moments.
pub trait Plugins: Send + Sync {
    /// Called once before the first build.
    fn on_startup(&self, command: CommandMode, dirty: bool) -> Result<()>;

    /// Called once watches are registered, before serving starts.
    ///
    /// The returned handle replaces `server` for the rest of the session.
    fn on_serve(
        &self,
        server: ServerHandle,
        config: &SiteConfig,
        builder: &Builder,
    ) -> Result<ServerHandle>;

    /// Called exactly once while shutting down.
    fn on_shutdown(&self) -> Result<()>;
}
