//! Serve URL derivation.

use crate::config::{DevAddr, SiteConfig};

/// `http://host:port{mount_path}`, bracketing IPv6 hosts.
///
/// `mount_path` is expected in the `/…/` form of [`SiteConfig::mount_path`].
pub fn serve_url(host: &str, port: u16, mount_path: &str) -> String {
    let addr = DevAddr {
        host: host.to_string(),
        port,
    };
    format!("http://{addr}{mount_path}")
}

/// Serve URL for a configuration snapshot.
pub fn serve_url_for(config: &SiteConfig) -> String {
    let (host, port) = config.dev_addr();
    serve_url(host, port, &config.mount_path())
}
