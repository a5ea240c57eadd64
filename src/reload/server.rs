//! `LiveReloadServer`: HTTP listener, watcher and WebSocket lifecycle.
//!
//! The HTTP listener is bound in [`LiveReloadServer::bind`], so a taken
//! port fails startup before anything is built. [`LiveReload::serve`] then
//! starts the actor runtime (watcher + WebSocket) when at least one path is
//! watched, and runs the request loop until [`LiveReload::shutdown`]
//! unblocks it from any thread.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use tiny_http::Server;
use tokio::sync::mpsc;

use super::http::{self, Site};
use super::watch::WatchActor;
use super::ws::{self, DEFAULT_WS_PORT, WsActor, WsMsg};
use super::{Builder, ErrorHandler, LiveReload, browser};
use crate::{debug, log};

/// Worker threads answering HTTP requests.
const REQUEST_THREADS: usize = 4;
const CHANNEL_BUFFER: usize = 32;

/// Construction parameters of a [`LiveReloadServer`].
pub struct ServerOptions {
    pub builder: Builder,
    pub host: String,
    pub port: u16,
    /// Directory served, normally the session workspace.
    pub root: PathBuf,
    pub mount_path: String,
}

pub struct LiveReloadServer {
    http: Arc<Server>,
    addr: SocketAddr,
    host: String,
    site: Arc<Site>,
    builder: Builder,
    live: AtomicBool,
    /// Paths registered through `watch`, in registration order
    watched: Mutex<Vec<PathBuf>>,
    /// Forwards late `watch` calls to a running watcher
    watch_tx: Mutex<Option<mpsc::UnboundedSender<PathBuf>>>,
    ws_stop: Arc<AtomicBool>,
    shutdown_tx: Sender<()>,
    shutdown_rx: Receiver<()>,
}

impl LiveReloadServer {
    /// Bind the HTTP listener. The server is live from here until shutdown.
    pub fn bind(options: ServerOptions) -> Result<Self> {
        let ServerOptions {
            builder,
            host,
            port,
            root,
            mount_path,
        } = options;

        let http = Server::http((host.as_str(), port))
            .map_err(|e| anyhow!("failed to bind {}: {}", display_addr(&host, port), e))?;
        let addr = http
            .server_addr()
            .to_ip()
            .context("HTTP listener has no IP address")?;
        let (shutdown_tx, shutdown_rx) = channel::unbounded();

        debug!("serve"; "bound {}", addr);
        Ok(Self {
            http: Arc::new(http),
            addr,
            host,
            site: Arc::new(Site::new(root, &mount_path)),
            builder,
            live: AtomicBool::new(true),
            watched: Mutex::new(Vec::new()),
            watch_tx: Mutex::new(None),
            ws_stop: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
        })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start WebSocket acceptor and actors on their own runtime thread.
    fn spawn_actors(&self) -> Option<JoinHandle<()>> {
        let paths = self.watched.lock().clone();
        if paths.is_empty() {
            return None;
        }

        let (ws_tx, ws_rx) = mpsc::channel::<WsMsg>(CHANNEL_BUFFER);
        match ws::start_acceptor(
            &self.host,
            DEFAULT_WS_PORT,
            ws_tx.clone(),
            Arc::clone(&self.ws_stop),
        ) {
            Ok(port) => {
                self.site.ws_port.store(port, Ordering::Release);
                debug!("reload"; "ws://{}", display_addr(&self.host, port));
            }
            Err(e) => log!("reload"; "websocket server failed: {:#}", e),
        }

        let (add_tx, add_rx) = mpsc::unbounded_channel();
        *self.watch_tx.lock() = Some(add_tx);

        let builder = Arc::clone(&self.builder);
        let shutdown_rx = self.shutdown_rx.clone();
        let spawned = thread::Builder::new()
            .name("folio-actors".into())
            .spawn(move || run_actor_system(paths, add_rx, builder, ws_tx, ws_rx, shutdown_rx));

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log!("reload"; "failed to start watcher: {}", e);
                None
            }
        }
    }

    fn run_request_loop(&self) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(REQUEST_THREADS)
            .thread_name(|i| format!("folio-http-{i}"))
            .build()
            .context("failed to create request thread pool")?;

        for request in self.http.incoming_requests() {
            let site = Arc::clone(&self.site);
            pool.spawn(move || {
                if let Err(e) = http::handle_request(request, &site) {
                    log!("serve"; "request error: {e}");
                }
            });
        }
        Ok(())
    }
}

impl LiveReload for LiveReloadServer {
    fn watch(&self, path: &Path) {
        let path = crate::utils::normalize_path(path);
        {
            let mut watched = self.watched.lock();
            if watched.contains(&path) {
                return;
            }
            watched.push(path.clone());
        }
        debug!("watch"; "watching {}", path.display());

        if let Some(tx) = self.watch_tx.lock().as_ref() {
            let _ = tx.send(path);
        }
    }

    fn serve(&self, open_in_browser: bool) -> Result<()> {
        if !self.is_live() {
            debug!("serve"; "already shut down, not serving");
            return Ok(());
        }

        let actors = self.spawn_actors();
        let url = self.url();
        log!("serve"; "serving on {}", url);

        if open_in_browser && let Err(e) = browser::open(&url) {
            log!("serve"; "{:#}", e);
        }

        let result = self.run_request_loop();
        wait_for_actors(actors);
        result
    }

    fn shutdown(&self) -> Result<()> {
        if !self.live.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        debug!("serve"; "stopping server");
        self.ws_stop.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
        self.http.unblock();
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn set_error_handler(&self, handler: ErrorHandler) {
        *self.site.error_handler.write() = Some(handler);
    }

    fn url(&self) -> String {
        format!(
            "http://{}{}",
            display_addr(&self.host, self.addr.port()),
            self.site.mount_path
        )
    }
}

/// `host:port`, bracketing IPv6 literals.
fn display_addr(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn run_actor_system(
    paths: Vec<PathBuf>,
    add_rx: mpsc::UnboundedReceiver<PathBuf>,
    builder: Builder,
    ws_tx: mpsc::Sender<WsMsg>,
    ws_rx: mpsc::Receiver<WsMsg>,
    shutdown_rx: Receiver<()>,
) {
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log!("reload"; "failed to create runtime: {}", e);
            return;
        }
    };

    rt.block_on(async move {
        let watcher = match WatchActor::new(paths, add_rx, builder, ws_tx.clone()) {
            Ok(watcher) => watcher,
            Err(e) => {
                log!("watch"; "watcher failed: {}", e);
                return;
            }
        };

        let ws_handle = tokio::spawn(WsActor::new(ws_rx).run());
        let watch_handle = tokio::spawn(watcher.run());

        loop {
            if shutdown_rx.try_recv().is_ok() {
                debug!("reload"; "shutdown signal received");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        watch_handle.abort();
        let _ = ws_tx.send(WsMsg::Shutdown).await;
        let _ = tokio::time::timeout(Duration::from_millis(500), ws_handle).await;
    });
    rt.shutdown_timeout(Duration::from_millis(500));
}

/// Wait for the actor thread to finish (max 2 seconds).
fn wait_for_actors(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else { return };

    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    debug!("reload"; "actors still running after shutdown");
}
