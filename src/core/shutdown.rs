//! Single-execution shutdown.
//!
//! Three independent authorities can end a serve session: a terminate
//! signal, an error unwinding out of the orchestrator, and the serve loop
//! returning on its own. All of them call [`ShutdownCoordinator::shutdown`].
//! The first caller wins a compare-and-set on the state and runs the body;
//! every other caller returns immediately without side effects.
//!
//! State machine:
//!
//! ```text
//! Idle ──(first shutdown())──► ShuttingDown ──(body finished)──► Done
//! ```
//!
//! Body steps, each isolated from failures (errors and panics) of the others:
//! 1. stop the live reload server, skipped when it is no longer live
//! 2. dispatch the shutdown hook
//! 3. remove the workspace if it still exists

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use anyhow::{Context, Result};
use parking_lot::{Condvar, Mutex, RwLock};

use super::workspace::EphemeralWorkspace;
use crate::hooks::Plugins;
use crate::reload::ServerHandle;
use crate::{debug, log};

const IDLE: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const DONE: u8 = 2;

/// Observable shutdown progress.
#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Idle,
    ShuttingDown,
    Done,
}

/// Runs session cleanup at most once, whoever asks first.
pub struct ShutdownCoordinator {
    state: AtomicU8,
    finished: Mutex<bool>,
    finished_cv: Condvar,
    workspace: Arc<EphemeralWorkspace>,
    plugins: Arc<dyn Plugins>,
    server: RwLock<Option<ServerHandle>>,
}

impl ShutdownCoordinator {
    pub fn new(workspace: Arc<EphemeralWorkspace>, plugins: Arc<dyn Plugins>) -> Self {
        Self {
            state: AtomicU8::new(IDLE),
            finished: Mutex::new(false),
            finished_cv: Condvar::new(),
            workspace,
            plugins,
            server: RwLock::new(None),
        }
    }

    /// Point shutdown at the current server handle.
    ///
    /// Called again whenever a lifecycle hook replaces the server.
    pub fn attach_server(&self, server: ServerHandle) {
        *self.server.write() = Some(server);
    }

    #[cfg(test)]
    pub fn state(&self) -> ShutdownState {
        match self.state.load(Ordering::Acquire) {
            IDLE => ShutdownState::Idle,
            SHUTTING_DOWN => ShutdownState::ShuttingDown,
            _ => ShutdownState::Done,
        }
    }

    /// Request shutdown.
    ///
    /// Returns `true` for the single caller that ran the body. Never blocks
    /// on another caller, so it is safe to re-enter from the body itself.
    pub fn shutdown(&self) -> bool {
        if self
            .state
            .compare_exchange(IDLE, SHUTTING_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        log!("shutdown"; "shutting down...");
        self.run_body();
        self.state.store(DONE, Ordering::Release);

        *self.finished.lock() = true;
        self.finished_cv.notify_all();
        log!("shutdown"; "shutdown complete");
        true
    }

    /// Block until the body has finished, on whichever thread runs it.
    ///
    /// Must not be called from inside the body.
    pub fn wait(&self) {
        let mut finished = self.finished.lock();
        while !*finished {
            self.finished_cv.wait(&mut finished);
        }
    }

    /// Scoped guard that shuts down when dropped, on every exit path.
    pub fn guard(self: &Arc<Self>) -> ShutdownGuard {
        ShutdownGuard {
            coordinator: Arc::clone(self),
        }
    }

    fn run_body(&self) {
        let server = self.server.read().clone();
        match server {
            Some(server) if server.is_live() => {
                run_step("stopping server", || server.shutdown());
            }
            _ => debug!("shutdown"; "server not live, nothing to stop"),
        }

        run_step("shutdown hook", || self.plugins.on_shutdown());

        if self.workspace.exists() {
            run_step("removing workspace", || {
                self.workspace
                    .destroy()
                    .with_context(|| format!("failed to remove {}", self.workspace.path().display()))
            });
        }
    }
}

/// Run one shutdown step, reporting but containing its failure.
fn run_step(name: &str, step: impl FnOnce() -> Result<()>) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            log!("shutdown"; "{} failed: {:#}", name, err);
            false
        }
        Err(_) => {
            log!("shutdown"; "{} panicked", name);
            false
        }
    }
}

/// Runs [`ShutdownCoordinator::shutdown`] when dropped.
///
/// If another trigger already started shutting down, the drop waits for it
/// to finish so the process cannot exit with cleanup half done.
pub struct ShutdownGuard {
    coordinator: Arc<ShutdownCoordinator>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        if !self.coordinator.shutdown() {
            self.coordinator.wait();
        }
    }
}
