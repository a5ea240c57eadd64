//! `dev_addr` configuration.
//!
//! The development server address is written as `host:port`:
//!
//! ```toml
//! dev_addr = "127.0.0.1:8000"   # default
//! dev_addr = "0.0.0.0:8080"     # reachable from LAN
//! dev_addr = "[::1]:8000"       # IPv6 hosts are bracketed
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Development server address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DevAddr {
    /// Host name or IP literal (IPv6 without brackets).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Default for DevAddr {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl FromStr for DevAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("`{s}` must be in the form host:port"))?;

        let host = match host.strip_prefix('[') {
            Some(inner) => inner
                .strip_suffix(']')
                .ok_or_else(|| format!("`{s}` has an unterminated IPv6 bracket"))?,
            None if host.contains(':') => {
                return Err(format!("IPv6 host in `{s}` must be written as [host]:port"));
            }
            None => host,
        };

        if host.is_empty() {
            return Err(format!("`{s}` has an empty host"));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| format!("`{port}` is not a valid port number"))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl TryFrom<String> for DevAddr {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DevAddr> for String {
    fn from(addr: DevAddr) -> Self {
        addr.to_string()
    }
}

impl fmt::Display for DevAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
