//! Live reload server.
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────── HTTP (tiny_http, rayon pool) ───────────┐
//! Browser ───┤                                                     ├── workspace/
//!            └── WebSocket (tungstenite) ◄── WsActor ◄── WatchActor ◄── notify
//!                                                       (debounce → builder)
//! ```
//!
//! The orchestrator only sees the [`LiveReload`] trait, so a lifecycle hook
//! can hand back a different server implementation.
//!
//! # Modules
//!
//! - `server` - `LiveReloadServer`, the HTTP side and lifecycle
//! - `http` - request routing under the mount path
//! - `path` - URL to filesystem path resolution
//! - `response` - HTTP response helpers
//! - `watch` - file watcher actor with debouncing
//! - `ws` - WebSocket acceptor and broadcast actor
//! - `message` - JSON messages sent to browser clients
//! - `browser` - open the served URL in a browser

mod browser;
mod http;
pub mod message;
mod path;
mod response;
mod server;
mod watch;
mod ws;

pub use server::{LiveReloadServer, ServerOptions};

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::config::SiteConfig;

/// Rebuilds the site into the server root.
///
/// `None` asks the builder to re-derive configuration from its source.
pub type Builder = Arc<dyn Fn(Option<SiteConfig>) -> Result<()> + Send + Sync>;

/// Maps an HTTP status code to a custom error page body.
pub type ErrorHandler = Arc<dyn Fn(u16) -> Option<Vec<u8>> + Send + Sync>;

/// Shared handle to a live reload server.
pub type ServerHandle = Arc<dyn LiveReload>;

/// Contract between the serve orchestrator and a live reload server.
pub trait LiveReload: Send + Sync {
    /// Watch `path` recursively and rebuild on change. Registering the same
    /// path twice is harmless.
    fn watch(&self, path: &Path);

    /// Run the request loop until [`LiveReload::shutdown`] is called.
    /// Returns at once when the server is already shut down.
    fn serve(&self, open_in_browser: bool) -> Result<()>;

    /// Stop serving. Safe to call from any thread, including while another
    /// thread is blocked in [`LiveReload::serve`].
    fn shutdown(&self) -> Result<()>;

    /// Whether the server still holds its listener.
    fn is_live(&self) -> bool;

    /// Install the handler consulted for error responses.
    fn set_error_handler(&self, handler: ErrorHandler);

    /// Base URL clients use to reach the server.
    fn url(&self) -> String;
}
