//! Ephemeral build workspace.
//!
//! Each serve session builds into its own temporary directory. The name is
//! allocated by the OS temp facility (random suffix, exclusive create), so
//! two overlapping sessions never share a directory. The `folio_` prefix
//! lets tooling find leftovers if a process is killed without cleanup.
//!
//! Builds write under a [`WorkspaceLease`]. Destroying the workspace waits
//! for outstanding leases and refuses new ones afterwards, so a build still
//! running at shutdown cannot recreate the directory after it was removed.

use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{RwLock, RwLockReadGuard};
use thiserror::Error;

/// Prefix of every workspace directory name.
pub const WORKSPACE_PREFIX: &str = "folio_";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace directory in `{0}`")]
    Create(PathBuf, #[source] io::Error),
}

/// A uniquely named temporary directory holding build output.
///
/// Dropping this does not delete anything. Removal only happens through
/// [`EphemeralWorkspace::destroy`], which the shutdown coordinator calls.
#[derive(Debug)]
pub struct EphemeralWorkspace {
    path: PathBuf,
    /// Set once `destroy` ran
    removed: RwLock<bool>,
}

/// Permission to write into a workspace. Removal waits until it is dropped.
#[must_use]
pub struct WorkspaceLease<'a> {
    _guard: RwLockReadGuard<'a, bool>,
}

impl EphemeralWorkspace {
    /// Create a fresh workspace in the system temp directory.
    pub fn create() -> Result<Self, WorkspaceError> {
        Self::create_in(std::env::temp_dir())
    }

    /// Create a fresh workspace under `parent`.
    pub fn create_in(parent: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let parent = parent.as_ref();
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .map_err(|err| WorkspaceError::Create(parent.to_path_buf(), err))?;

        Ok(Self {
            path: dir.keep(),
            removed: RwLock::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory is still present.
    pub fn exists(&self) -> bool {
        !*self.removed.read() && self.path.is_dir()
    }

    /// Hold the workspace open for writing.
    ///
    /// `None` once the workspace was destroyed or its directory vanished.
    pub fn lease(&self) -> Option<WorkspaceLease<'_>> {
        let guard = self.removed.read();
        if *guard || !self.path.is_dir() {
            return None;
        }
        Some(WorkspaceLease { _guard: guard })
    }

    /// Recursively remove the workspace, after outstanding leases are released.
    ///
    /// Removing an already absent workspace succeeds.
    pub fn destroy(&self) -> io::Result<()> {
        let mut removed = self.removed.write();
        *removed = true;
        match std::fs::remove_dir_all(&self.path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_empty_prefixed_dir() {
        let parent = TempDir::new().unwrap();
        let ws = EphemeralWorkspace::create_in(parent.path()).unwrap();

        assert!(ws.exists());
        assert!(ws.path().starts_with(parent.path()));
        let name = ws.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(WORKSPACE_PREFIX));
        assert_eq!(std::fs::read_dir(ws.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_overlapping_sessions_are_distinct() {
        let parent = TempDir::new().unwrap();
        let first = EphemeralWorkspace::create_in(parent.path()).unwrap();
        let second = EphemeralWorkspace::create_in(parent.path()).unwrap();

        assert_ne!(first.path(), second.path());
        assert!(first.exists() && second.exists());
    }

    #[test]
    fn test_destroy_removes_contents() {
        let parent = TempDir::new().unwrap();
        let ws = EphemeralWorkspace::create_in(parent.path()).unwrap();
        std::fs::create_dir_all(ws.path().join("signature")).unwrap();
        std::fs::write(ws.path().join("signature/index.html"), "x").unwrap();

        ws.destroy().unwrap();
        assert!(!ws.exists());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let parent = TempDir::new().unwrap();
        let ws = EphemeralWorkspace::create_in(parent.path()).unwrap();

        ws.destroy().unwrap();
        ws.destroy().unwrap();
        assert!(!ws.exists());
    }

    #[test]
    fn test_destroy_waits_for_lease() {
        let parent = TempDir::new().unwrap();
        let ws = std::sync::Arc::new(EphemeralWorkspace::create_in(parent.path()).unwrap());
        let lease = ws.lease().unwrap();

        let destroyer = {
            let ws = std::sync::Arc::clone(&ws);
            std::thread::spawn(move || ws.destroy().unwrap())
        };
        std::thread::sleep(std::time::Duration::from_millis(100));
        // a build holding the lease can still write
        std::fs::write(ws.path().join("index.html"), "x").unwrap();
        assert!(!destroyer.is_finished());

        drop(lease);
        destroyer.join().unwrap();
        assert!(!ws.path().exists());
        assert!(ws.lease().is_none());
    }

    #[test]
    fn test_no_lease_on_vanished_directory() {
        let parent = TempDir::new().unwrap();
        let ws = EphemeralWorkspace::create_in(parent.path()).unwrap();
        std::fs::remove_dir_all(ws.path()).unwrap();
        assert!(ws.lease().is_none());
    }

    #[test]
    fn test_drop_keeps_directory() {
        let parent = TempDir::new().unwrap();
        let path = {
            let ws = EphemeralWorkspace::create_in(parent.path()).unwrap();
            ws.path().to_path_buf()
        };
        assert!(path.is_dir());
    }

    #[test]
    fn test_create_in_missing_parent_fails() {
        let parent = TempDir::new().unwrap();
        let missing = parent.path().join("does/not/exist");
        let err = EphemeralWorkspace::create_in(&missing).unwrap_err();
        assert!(matches!(err, WorkspaceError::Create(p, _) if p == missing));
    }
}
