//! Request routing under the mount path.
//!
//! | Request                    | Response                          |
//! |----------------------------|-----------------------------------|
//! | `{mount}livereload.js`     | client script, from memory        |
//! | `/` with a non-root mount  | `302` to the mount path           |
//! | `{mount}…`                 | file under the root, or `404`     |
//! | anything else              | `404`                             |

use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};

use anyhow::Result;
use parking_lot::RwLock;
use tiny_http::Request;

use super::ErrorHandler;
use super::path::resolve_path;
use super::response;
use crate::embed::serve::LIVERELOAD_JS_NAME;

/// Request-time view of the server, shared with the worker pool.
pub struct Site {
    pub root: PathBuf,
    /// Normalized to start and end with `/`
    pub mount_path: String,
    /// Port of the WebSocket endpoint, `0` until it is bound
    pub ws_port: AtomicU16,
    pub error_handler: RwLock<Option<ErrorHandler>>,
}

impl Site {
    pub fn new(root: PathBuf, mount_path: &str) -> Self {
        Self {
            root,
            mount_path: normalize_mount(mount_path),
            ws_port: AtomicU16::new(0),
            error_handler: RwLock::new(None),
        }
    }

    fn ws_port(&self) -> Option<u16> {
        match self.ws_port.load(Ordering::Acquire) {
            0 => None,
            port => Some(port),
        }
    }
}

/// `"docs"`, `"/docs"` and `"/docs/"` all become `"/docs/"`.
pub fn normalize_mount(mount_path: &str) -> String {
    let trimmed = mount_path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    LivereloadJs,
    Redirect,
    /// Remainder of the URL below the mount path
    File(&'a str),
    NotFound,
}

fn route<'a>(url: &'a str, mount_path: &str, livereload: bool) -> Route<'a> {
    let path = url.split(['?', '#']).next().unwrap_or(url);

    if livereload
        && let Some(name) = path.strip_prefix(mount_path)
        && name == LIVERELOAD_JS_NAME
    {
        return Route::LivereloadJs;
    }

    if mount_path != "/" && (path == "/" || path == mount_path.trim_end_matches('/')) {
        return Route::Redirect;
    }

    match url.strip_prefix(mount_path) {
        Some(rest) => Route::File(rest),
        None => Route::NotFound,
    }
}

pub fn handle_request(request: Request, site: &Site) -> Result<()> {
    let url = request.url().to_string();
    let ws_port = site.ws_port();

    match route(&url, &site.mount_path, ws_port.is_some()) {
        Route::LivereloadJs => match ws_port {
            Some(port) => response::respond_livereload_js(request, port),
            None => respond_error(request, 404, site),
        },
        Route::Redirect => response::respond_redirect(request, &site.mount_path),
        Route::File(rest) => match resolve_path(rest, &site.root) {
            Some(path) => {
                let handler = site.error_handler.read().clone();
                response::respond_file(request, &path, handler.as_ref())
            }
            None => respond_error(request, 404, site),
        },
        Route::NotFound => respond_error(request, 404, site),
    }
}

fn respond_error(request: Request, status: u16, site: &Site) -> Result<()> {
    let handler = site.error_handler.read().clone();
    response::respond_error(request, status, handler.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mount() {
        assert_eq!(normalize_mount(""), "/");
        assert_eq!(normalize_mount("/"), "/");
        assert_eq!(normalize_mount("docs"), "/docs/");
        assert_eq!(normalize_mount("/a/b"), "/a/b/");
        assert_eq!(normalize_mount("/docs/"), "/docs/");
    }

    #[test]
    fn test_root_mount() {
        assert_eq!(route("/", "/", true), Route::File(""));
        assert_eq!(route("/signature/", "/", true), Route::File("signature/"));
        assert_eq!(route("/livereload.js", "/", true), Route::LivereloadJs);
        assert_eq!(route("/livereload.js?v=2", "/", true), Route::LivereloadJs);
        assert_eq!(route("/livereload.js", "/", false), Route::File("livereload.js"));
    }

    #[test]
    fn test_sub_mount() {
        assert_eq!(route("/", "/docs/", true), Route::Redirect);
        assert_eq!(route("/docs", "/docs/", true), Route::Redirect);
        assert_eq!(route("/docs/", "/docs/", true), Route::File(""));
        assert_eq!(route("/docs/guide/?q=1", "/docs/", true), Route::File("guide/?q=1"));
        assert_eq!(route("/docs/livereload.js", "/docs/", true), Route::LivereloadJs);
        assert_eq!(route("/livereload.js", "/docs/", true), Route::NotFound);
        assert_eq!(route("/other/page/", "/docs/", true), Route::NotFound);
    }
}
