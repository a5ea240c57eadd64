//! Development server with live reload support.
//!
//! # Session lifecycle
//!
//! ```text
//! workspace ─► config ─► startup hook ─► bind ─► signals ─► initial build
//!     ─► watches ─► serve hook ─► extra watches ─► serve loop ─► shutdown
//! ```
//!
//! A shutdown guard ([`ShutdownCoordinator::guard`]) is taken before anything
//! can fail. An error, the serve loop returning and a terminate signal all
//! end in the same single shutdown: stop the server, dispatch the shutdown
//! hook, remove the workspace.

mod context;
mod error_page;
mod url;

pub use context::{BuildMode, ServeContext, ServerSession};
pub use error_page::ErrorPageResolver;
use url::serve_url_for;

use std::sync::Arc;

use anyhow::{Context, Result};

use super::ServeArgs;
use crate::config::{ConfigSource, SiteConfig};
use crate::core::{EphemeralWorkspace, ShutdownCoordinator, SignalBridge, SignalHandler};
use crate::hooks::{CommandMode, HookRunner, Plugins};
use crate::reload::{LiveReloadServer, ServerHandle, ServerOptions};
use crate::{debug, log};

/// Entry point of `folio serve`.
pub fn serve(args: &ServeArgs) -> Result<()> {
    let source = Arc::new(ConfigSource::new(
        args.config_file.clone(),
        args.dev_addr.clone(),
        args.watch.clone(),
    ));

    let workspace = Arc::new(EphemeralWorkspace::create()?);
    debug!("serve"; "workspace {}", workspace.path().display());

    let config = match source.load(Some(workspace.path())) {
        Ok(config) => config,
        Err(err) => {
            if let Err(e) = workspace.destroy() {
                log!("serve"; "failed to remove {}: {}", workspace.path().display(), e);
            }
            return Err(err);
        }
    };
    let plugins: Arc<dyn Plugins> = Arc::new(HookRunner::new(&config));

    let orchestrator = ServeOrchestrator {
        options: ServeOptions::from(args),
        source,
        workspace,
        plugins,
        signals: Some(SignalBridge::for_host()),
    };
    orchestrator.run(config, |options| {
        let server = LiveReloadServer::bind(options)?;
        Ok(Arc::new(server) as ServerHandle)
    })
}

/// Session switches from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeOptions {
    pub livereload: bool,
    pub clean: bool,
    pub dirty: bool,
    pub watch_theme: bool,
    pub open: bool,
}

impl From<&ServeArgs> for ServeOptions {
    fn from(args: &ServeArgs) -> Self {
        Self {
            livereload: !args.no_livereload,
            clean: args.clean,
            dirty: args.dirty,
            watch_theme: args.watch_theme,
            open: args.open,
        }
    }
}

impl ServeOptions {
    fn command_mode(self) -> CommandMode {
        if self.clean {
            CommandMode::Build
        } else {
            CommandMode::Serve
        }
    }
}

/// Composes workspace, builder, server, hooks and signals into one session.
pub struct ServeOrchestrator {
    pub options: ServeOptions,
    pub source: Arc<ConfigSource>,
    pub workspace: Arc<EphemeralWorkspace>,
    pub plugins: Arc<dyn Plugins>,
    /// Terminate signals to intercept; `None` leaves process signals alone.
    pub signals: Option<SignalBridge>,
}

impl ServeOrchestrator {
    /// Run the session until the serve loop returns or a signal ends it.
    ///
    /// `bind` constructs the live reload server; its failure is fatal.
    pub fn run<F>(self, mut config: SiteConfig, bind: F) -> Result<()>
    where
        F: FnOnce(ServerOptions) -> Result<ServerHandle>,
    {
        let Self {
            options,
            source,
            workspace,
            plugins,
            signals,
        } = self;

        let coordinator = Arc::new(ShutdownCoordinator::new(
            Arc::clone(&workspace),
            Arc::clone(&plugins),
        ));
        let _guard = coordinator.guard();

        plugins
            .on_startup(options.command_mode(), options.dirty)
            .context("startup hook failed")?;

        let (host, port) = config.dev_addr();
        let session = ServerSession {
            host: host.to_string(),
            port,
            mount_path: config.mount_path(),
            serve_url: serve_url_for(&config),
            workspace_path: workspace.path().to_path_buf(),
        };
        config.site_url = Some(session.serve_url.clone());

        let mode = BuildMode {
            clean: options.clean,
            dirty: options.dirty,
            livereload: options.livereload,
        };
        let context = ServeContext::new(session, mode, source, Arc::clone(&workspace), config);
        let builder = context.builder();

        let server = bind(ServerOptions {
            builder: Arc::clone(&builder),
            host: context.session.host.clone(),
            port: context.session.port,
            root: workspace.path().to_path_buf(),
            mount_path: context.session.mount_path.clone(),
        })?;
        context.set_server(Arc::clone(&server));
        coordinator.attach_server(Arc::clone(&server));
        server.set_error_handler(ErrorPageResolver::new(workspace.path()).into_handler());

        if let Some(bridge) = &signals {
            let registration = bridge.register(terminate_handler(&coordinator));
            let names: Vec<_> = registration.installed().iter().map(|e| e.name()).collect();
            debug!("signal"; "intercepting {}", names.join(", "));
        }

        builder(Some(context.config().as_ref().clone())).context("initial build failed")?;

        if options.livereload {
            let config = context.config();
            server.watch(&config.docs_dir);
            server.watch(config.config_file_path());
            if options.watch_theme {
                for dir in config.theme.dirs() {
                    server.watch(&dir);
                }
            }

            let server = plugins
                .on_serve(server, &config, &builder)
                .context("serve hook failed")?;
            context.set_server(Arc::clone(&server));
            coordinator.attach_server(Arc::clone(&server));

            for path in &config.watch {
                server.watch(path);
            }
        }

        context.server()?.serve(options.open)
    }
}

/// Handler bound to every terminate event.
///
/// Runs shutdown (or waits for whoever already is), then exits with 0.
fn terminate_handler(coordinator: &Arc<ShutdownCoordinator>) -> SignalHandler {
    let coordinator = Arc::clone(coordinator);
    Arc::new(move |event| {
        log!("signal"; "received {}", event);
        if !coordinator.shutdown() {
            coordinator.wait();
        }
        std::process::exit(0);
    })
}
