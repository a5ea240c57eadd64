//! Shared state of one serve session.
//!
//! The builder closure, the `on_serve` hook and the orchestrator all need the
//! latest configuration snapshot and the current server handle. Both live
//! here instead of being captured and reassigned by closures.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use anyhow::{Context, Result, anyhow, bail};
use arc_swap::ArcSwap;
use parking_lot::RwLock;

use crate::build::build;
use crate::config::{ConfigSource, SiteConfig};
use crate::core::EphemeralWorkspace;
use crate::debug;
use crate::reload::{Builder, ServerHandle};

/// Where and how a session is reachable. Fixed for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSession {
    pub host: String,
    pub port: u16,
    /// Normalized to `/…/`
    pub mount_path: String,
    pub serve_url: String,
    pub workspace_path: PathBuf,
}

/// How pages are built for the browser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildMode {
    /// Production-equivalent output, never embeds the live reload script.
    pub clean: bool,
    pub dirty: bool,
    /// Browser clients are notified of rebuilds.
    pub livereload: bool,
}

impl BuildMode {
    fn embeds_livereload(self) -> bool {
        self.livereload && !self.clean
    }
}

pub struct ServeContext {
    pub session: ServerSession,
    mode: BuildMode,
    source: Arc<ConfigSource>,
    workspace: Arc<EphemeralWorkspace>,
    config: ArcSwap<SiteConfig>,
    server: RwLock<Option<ServerHandle>>,
}

impl ServeContext {
    pub fn new(
        session: ServerSession,
        mode: BuildMode,
        source: Arc<ConfigSource>,
        workspace: Arc<EphemeralWorkspace>,
        config: SiteConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            mode,
            source,
            workspace,
            config: ArcSwap::from_pointee(config),
            server: RwLock::new(None),
        })
    }

    /// Latest configuration snapshot.
    pub fn config(&self) -> Arc<SiteConfig> {
        self.config.load_full()
    }

    /// Handle the session currently serves through.
    pub fn server(&self) -> Result<ServerHandle> {
        self.server
            .read()
            .clone()
            .ok_or_else(|| anyhow!("no server bound to this session"))
    }

    /// Rebind the session to `server`, e.g. after `on_serve` replaced it.
    pub fn set_server(&self, server: ServerHandle) {
        *self.server.write() = Some(server);
    }

    /// Builder handed to the server.
    ///
    /// Holds the context weakly, since the server it is handed to is owned
    /// by the context.
    pub fn builder(self: &Arc<Self>) -> Builder {
        let context: Weak<Self> = Arc::downgrade(self);
        Arc::new(move |config| {
            let context = context
                .upgrade()
                .ok_or_else(|| anyhow!("serve session has ended"))?;
            context.rebuild(config)
        })
    }

    /// Build into the workspace.
    ///
    /// `None` re-derives the configuration from its source. The serve URL is
    /// always forced, so every build embeds the same one.
    ///
    /// The workspace is leased for the whole build, so shutdown removes it
    /// only after a build in flight has finished.
    pub fn rebuild(&self, config: Option<SiteConfig>) -> Result<()> {
        let Some(_lease) = self.workspace.lease() else {
            bail!("workspace {} has been removed", self.workspace.path().display());
        };

        let mut config = match config {
            Some(config) => config,
            None => self.source.load(Some(self.workspace.path()))?,
        };
        config.site_url = Some(self.session.serve_url.clone());

        let livereload = self
            .mode
            .embeds_livereload()
            .then_some(self.session.serve_url.as_str());
        let report = build(&config, livereload, self.mode.dirty)
            .with_context(|| format!("failed to build {}", config.docs_dir.display()))?;
        debug!("build"; "{} pages rebuilt", report.pages);

        self.config.store(Arc::new(config));
        Ok(())
    }
}
