//! `[theme]` section configuration.
//!
//! ```toml
//! [theme]
//! custom_dir = "overrides"   # main.html template + static files
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Theme settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfig {
    /// Directory overriding the built-in theme.
    pub custom_dir: Option<PathBuf>,
}

impl ThemeConfig {
    /// Theme directories on disk, in lookup order.
    ///
    /// The built-in theme is embedded in the binary and has no directory.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.custom_dir.iter().cloned().collect()
    }
}
