//! Custom error pages from the build output.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::reload::ErrorHandler;

/// Status codes with a page under the workspace.
const PAGE_CODES: [u16; 2] = [404, 500];

/// Maps 404 and 500 to `{root}/{code}.html`.
///
/// Nothing is cached: every lookup reads the current build output.
#[derive(Debug, Clone)]
pub struct ErrorPageResolver {
    root: PathBuf,
}

impl ErrorPageResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, code: u16) -> Option<Vec<u8>> {
        if !PAGE_CODES.contains(&code) {
            return None;
        }
        fs::read(self.root.join(format!("{code}.html"))).ok()
    }

    pub fn into_handler(self) -> ErrorHandler {
        Arc::new(move |code| self.resolve(code))
    }
}
