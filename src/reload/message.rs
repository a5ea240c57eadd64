//! Live reload message protocol.
//!
//! JSON messages pushed over the WebSocket to browser clients:
//!
//! - `connected`: sent once after the handshake
//! - `reload`: a rebuild finished, reload the page
//! - `error`: a rebuild failed, show an overlay and keep the page
//! - `clear_error`: the next rebuild succeeded

use serde::{Deserialize, Serialize};

/// Message sent over WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HotReloadMessage {
    /// Full page reload
    Reload {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Connection established
    Connected {
        /// Server version for compatibility check
        version: String,
    },

    /// Build error (display overlay, no reload)
    Error {
        /// Changed path that triggered the failed build
        path: String,
        error: String,
    },

    #[serde(rename = "clear_error")]
    ClearError,
}

impl HotReloadMessage {
    pub fn reload_with_reason(reason: impl Into<String>) -> Self {
        Self::Reload {
            reason: Some(reason.into()),
        }
    }

    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn error(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Error {
            path: path.into(),
            error: error.into(),
        }
    }

    pub fn clear_error() -> Self {
        Self::ClearError
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}
