//! Shared utilities for tests driving the `folio` binary.

#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tempfile::TempDir;

/// Bound on waiting for the first build of a session.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(20);
/// Bound on waiting for the process to exit after a signal.
pub const EXIT_TIMEOUT: Duration = Duration::from_secs(10);
/// Polls of the workspace after exit, and the interval between them.
pub const CLEANUP_POLLS: usize = 4;
pub const CLEANUP_INTERVAL: Duration = Duration::from_millis(250);

/// A minimal project carrying a unique signature page.
pub struct Project {
    pub dir: TempDir,
    /// Scratch `TMPDIR` of spawned sessions, so their workspaces are ours.
    pub tmp: TempDir,
    pub signature: String,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new().prefix("folio_test-").tempdir().unwrap();
        let tmp = TempDir::new().unwrap();
        let signature = unique_token();

        fs::write(
            dir.path().join("folio.toml"),
            "site_name = \"Testing case\"\ndocs_dir = \"docs\"\n",
        )
        .unwrap();
        let docs = dir.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("index.md"), "# Index File").unwrap();
        fs::write(docs.join("signature.md"), format!("# {} ", signature)).unwrap();

        Self {
            dir,
            tmp,
            signature,
        }
    }

    /// Start `folio serve` on a free port.
    pub fn serve(&self) -> Session {
        let port = free_port();
        let child = Command::new(env!("CARGO_BIN_EXE_folio"))
            .args(["serve", "--dev-addr", &format!("127.0.0.1:{port}")])
            .current_dir(self.dir.path())
            .env("TMPDIR", self.tmp.path())
            .env("TMP", self.tmp.path())
            .env("TEMP", self.tmp.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        Session { child, port }
    }

    /// Wait for a finished session workspace holding this project's signature page.
    pub fn wait_for_workspace(&self, session: &mut Session) -> PathBuf {
        let deadline = Instant::now() + STARTUP_TIMEOUT;
        loop {
            if let Some(dir) = self.locate_workspace() {
                return dir;
            }
            if let Some(status) = session.child.try_wait().unwrap() {
                panic!("folio exited before building: {status}");
            }
            assert!(Instant::now() < deadline, "no workspace after {STARTUP_TIMEOUT:?}");
            sleep(Duration::from_millis(100));
        }
    }

    fn locate_workspace(&self) -> Option<PathBuf> {
        fs::read_dir(self.tmp.path())
            .ok()?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_dir()
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("folio_"))
            })
            .find(|path| {
                // 404.html is written last, so its presence marks a finished build
                path.join("404.html").is_file()
                    && fs::read_to_string(path.join("signature/index.html"))
                        .is_ok_and(|page| page.contains(&self.signature))
            })
    }
}

pub struct Session {
    pub child: Child,
    pub port: u16,
}

/// How a session ended, as far as the harness can tell.
#[derive(Debug)]
pub enum Exit {
    Status(ExitStatus),
    /// Liveness could not be queried; counts as already exited.
    Unknown,
    TimedOut,
}

impl Exit {
    /// Classify one liveness query; `None` while still running.
    pub fn from_poll(poll: std::io::Result<Option<ExitStatus>>) -> Option<Self> {
        match poll {
            Ok(Some(status)) => Some(Self::Status(status)),
            Ok(None) => None,
            Err(_) => Some(Self::Unknown),
        }
    }

    /// Assert a zero exit status. An unknown status passes, the cleanup
    /// check is what remains to be verified then.
    pub fn assert_success(&self, after: &str) {
        match self {
            Self::Status(status) => assert_eq!(status.code(), Some(0), "exit status after {after}"),
            Self::Unknown => {}
            Self::TimedOut => panic!("still running {EXIT_TIMEOUT:?} after {after}"),
        }
    }
}

impl Session {
    /// Poll until the process exits or `timeout` passes.
    pub fn wait_for_exit(&mut self, timeout: Duration) -> Exit {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Some(exit) = Exit::from_poll(self.child.try_wait()) {
                return exit;
            }
            sleep(Duration::from_millis(50));
        }
        Exit::TimedOut
    }

    /// Plain HTTP/1.1 GET, returning the raw response.
    pub fn get(&self, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", self.port)).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        write!(
            stream,
            "GET {path} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Whether `dir` disappears within the bounded number of polls.
pub fn was_cleaned(dir: &Path) -> bool {
    for _ in 0..CLEANUP_POLLS {
        if !dir.exists() {
            return true;
        }
        sleep(CLEANUP_INTERVAL);
    }
    !dir.exists()
}

fn free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    listener.local_addr().unwrap().port()
}

fn unique_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("sig{:x}{:x}", std::process::id(), nanos)
}
