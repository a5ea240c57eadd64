//! File watcher actor.
//!
//! ```text
//! notify → Debouncer (timing, dedup) → builder(None) → WsActor (reload | error)
//! ```
//!
//! Every debounced batch triggers one full rebuild. Roots that do not exist
//! yet, or that get deleted and recreated, are re-attached on a periodic
//! maintenance tick.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::mpsc;

use super::Builder;
use super::ws::WsMsg;
use crate::logger::{status_detach, status_error, status_success};
use crate::utils::normalize_path;
use crate::{debug, log};

const DEBOUNCE_MS: u64 = 300;
const REBUILD_COOLDOWN_MS: u64 = 800;
/// Upper bound between watch-root maintenance passes.
const MAINTAIN_INTERVAL_MS: u64 = 500;

// =============================================================================
// Debouncer
// =============================================================================

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Collects raw events until the quiet window and rebuild cooldown elapse.
struct Debouncer {
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
    last_build: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
            last_build: None,
        }
    }

    /// Add a notify event, applying dedup rules:
    /// - Removed then Created/Modified: restored, keep the new kind
    /// - Modified then Removed: deleted
    /// - Created then Removed: never existed, drop it
    /// - anything else: first event wins
    fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return,
            EventKind::Modify(_) => ChangeKind::Modified,
            _ => return,
        };

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            self.record(normalize_path(path), kind);
        }
    }

    fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        if let Some(&existing) = self.changes.get(&path) {
            match (existing, kind) {
                (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                    self.changes.insert(path, kind);
                }
                (ChangeKind::Modified, ChangeKind::Removed) => {
                    self.changes.insert(path, ChangeKind::Removed);
                }
                (ChangeKind::Created, ChangeKind::Removed) => {
                    debug!("watch"; "discard created+removed: {}", path.display());
                    self.changes.remove(&path);
                }
                _ => return,
            }
            self.last_event = Some(Instant::now());
            return;
        }

        debug!("watch"; "event {}: {}", kind.label(), path.display());
        self.changes.insert(path, kind);
        self.last_event = Some(Instant::now());
    }

    /// Take the batch if the quiet window and cooldown have elapsed.
    fn take_if_ready(&mut self) -> Option<Vec<PathBuf>> {
        if !self.is_ready() {
            return None;
        }

        let changes = std::mem::take(&mut self.changes);
        self.last_event = None;
        if changes.is_empty() {
            return None;
        }

        self.last_build = Some(Instant::now());
        let mut paths: Vec<_> = changes.into_keys().collect();
        paths.sort();
        Some(paths)
    }

    fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };
        if last_event.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
            return false;
        }
        if let Some(last_build) = self.last_build
            && last_build.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS)
        {
            return false;
        }
        !self.changes.is_empty()
    }

    /// Time until the batch could become ready, capped by the maintenance tick.
    fn sleep_duration(&self) -> Duration {
        let tick = Duration::from_millis(MAINTAIN_INTERVAL_MS);
        let Some(last_event) = self.last_event else {
            return tick;
        };

        let debounce_remaining =
            Duration::from_millis(DEBOUNCE_MS).saturating_sub(last_event.elapsed());
        let cooldown_remaining = self
            .last_build
            .map(|t| Duration::from_millis(REBUILD_COOLDOWN_MS).saturating_sub(t.elapsed()))
            .unwrap_or(Duration::ZERO);

        debounce_remaining
            .max(cooldown_remaining)
            .clamp(Duration::from_millis(1), tick)
    }
}

/// Editor temp and backup files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

// =============================================================================
// Watch roots
// =============================================================================

/// Keeps the desired roots attached to the watcher.
struct WatchRoots {
    desired: Vec<PathBuf>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    fn new() -> Self {
        Self {
            desired: Vec::new(),
            attached: FxHashSet::default(),
        }
    }

    /// Add a root. Duplicates are ignored.
    fn add(&mut self, path: PathBuf, watcher: &mut RecommendedWatcher) {
        if self.desired.contains(&path) {
            return;
        }
        self.desired.push(path.clone());
        if path.exists() {
            match watcher.watch(&path, RecursiveMode::Recursive) {
                Ok(()) => {
                    self.attached.insert(path);
                }
                Err(err) => log!("watch"; "cannot watch {}: {}", path.display(), err),
            }
        }
    }

    fn maintain(&mut self, watcher: &mut RecommendedWatcher) {
        self.attached.retain(|path| path.exists());

        for path in &self.desired {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }
            if watcher.watch(path, RecursiveMode::Recursive).is_ok() {
                self.attached.insert(path.clone());
                debug!("watch"; "re-attached watch: {}", path.display());
            }
        }
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Watches roots and rebuilds on change.
pub struct WatchActor {
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    watcher: RecommendedWatcher,
    roots: WatchRoots,
    /// Roots registered while running
    add_rx: mpsc::UnboundedReceiver<PathBuf>,
    builder: Builder,
    ws_tx: mpsc::Sender<WsMsg>,
}

impl WatchActor {
    /// Start watching immediately; events buffer until [`WatchActor::run`].
    pub fn new(
        paths: Vec<PathBuf>,
        add_rx: mpsc::UnboundedReceiver<PathBuf>,
        builder: Builder,
        ws_tx: mpsc::Sender<WsMsg>,
    ) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut roots = WatchRoots::new();
        for path in paths {
            roots.add(path, &mut watcher);
        }

        Ok(Self {
            notify_rx,
            watcher,
            roots,
            add_rx,
            builder,
            ws_tx,
        })
    }

    pub async fn run(self) {
        let Self {
            notify_rx,
            mut watcher,
            mut roots,
            mut add_rx,
            builder,
            ws_tx,
        } = self;
        let mut debouncer = Debouncer::new();
        let mut failing = false;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                Some(event) = async_rx.recv() => debouncer.add_event(&event),
                Some(path) = add_rx.recv() => roots.add(path, &mut watcher),
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    roots.maintain(&mut watcher);
                    let Some(changed) = debouncer.take_if_ready() else {
                        continue;
                    };
                    if !rebuild(&builder, &ws_tx, &changed, &mut failing).await {
                        break;
                    }
                }
            }
        }
    }
}

/// Run one full rebuild for a batch. Returns `false` once the WebSocket
/// actor is gone.
async fn rebuild(
    builder: &Builder,
    ws_tx: &mpsc::Sender<WsMsg>,
    changed: &[PathBuf],
    failing: &mut bool,
) -> bool {
    let trigger = describe(changed);
    log!("watch"; "{} changed, rebuilding", trigger);
    // keep the line above when the status block is redrawn
    status_detach();

    let build = builder.clone();
    let result = tokio::task::spawn_blocking(move || build(None)).await;

    let messages = match result {
        Ok(Ok(())) => {
            status_success(&format!("rebuilt after change to {trigger}"));
            let mut messages = Vec::with_capacity(2);
            if std::mem::take(failing) {
                messages.push(WsMsg::ClearError);
            }
            messages.push(WsMsg::Reload { reason: trigger });
            messages
        }
        Ok(Err(err)) => {
            *failing = true;
            let detail = format!("{err:#}");
            status_error("rebuild failed", &detail);
            vec![WsMsg::Error {
                path: trigger,
                error: detail,
            }]
        }
        Err(join) => {
            *failing = true;
            status_error("rebuild panicked", &join.to_string());
            vec![WsMsg::Error {
                path: trigger,
                error: "build panicked".to_string(),
            }]
        }
    };

    for msg in messages {
        if ws_tx.send(msg).await.is_err() {
            return false;
        }
    }
    true
}

/// Short label for a batch of changed paths.
fn describe(changed: &[PathBuf]) -> String {
    let first = changed
        .first()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match changed.len() {
        0 | 1 => first,
        n => format!("{first} (+{} more)", n - 1),
    }
}
