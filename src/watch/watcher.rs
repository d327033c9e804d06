//! Per-path filesystem watcher.
//!
//! Each watched directory runs one watcher: a recursive OS watch feeds a
//! pending map of operation bitmasks, a fixed debounce tick flushes the map,
//! and flushed paths are parsed and hash-deduplicated before surfacing on a
//! bounded event channel. Events for the same path coalesce into a single
//! post-debounce outcome; the last observation wins.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::WatchPathConfig;
use crate::core::errors::{IndexerError, Result};
use crate::lang::common::{repo_relative, FileParser, ParseResult};
use crate::lang::registry::ParserRegistry;
use crate::lang::{java, python, svelte, typescript};

/// Debounce window between filesystem events and parser dispatch.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(100);

/// Bounded event-channel capacity; overflow drops the event and counts it.
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;

const OP_CREATE: u8 = 1 << 0;
const OP_WRITE: u8 = 1 << 1;
const OP_REMOVE: u8 = 1 << 2;
const OP_RENAME: u8 = 1 << 3;

/// Post-debounce operation on a watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOp {
    /// File appeared (or was first observed)
    Create,
    /// File content changed
    Modify,
    /// File was removed or renamed away
    Delete,
}

/// One debounced, deduplicated watcher outcome.
#[derive(Debug)]
pub struct WatchEvent {
    /// Repo-relative path
    pub path: String,
    /// Post-debounce operation
    pub operation: WatchOp,
    /// Parse result, present on successful create/modify
    pub result: Option<ParseResult>,
    /// Parse error, present when parsing failed
    pub error: Option<IndexerError>,
}

/// Recursive watcher for one resolved directory tree.
pub struct PathWatcher {
    // Debug is implemented manually below (dyn FileParser doesn't implement Debug).
    base: PathBuf,
    watched_extensions: HashSet<String>,
    excluded_dirs: HashSet<String>,
    ext_to_language: HashMap<String, String>,
    parsers: tokio::sync::Mutex<HashMap<String, Box<dyn FileParser>>>,
    pending: Mutex<HashMap<PathBuf, u8>>,
    hashes: Mutex<HashMap<String, String>>,
    events_tx: Mutex<Option<mpsc::Sender<WatchEvent>>>,
    events_rx: Mutex<Option<mpsc::Receiver<WatchEvent>>>,
    dropped_events: AtomicU64,
    debounce: Duration,
}

impl std::fmt::Debug for PathWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathWatcher")
            .field("base", &self.base)
            .field("watched_extensions", &self.watched_extensions)
            .field("excluded_dirs", &self.excluded_dirs)
            .field("ext_to_language", &self.ext_to_language)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl PathWatcher {
    /// Build a watcher (without starting it) for `base` from one watch-path
    /// config, creating one parser per configured language.
    pub fn new(base: &Path, config: &WatchPathConfig, registry: &ParserRegistry) -> Result<Self> {
        if !base.is_dir() {
            return Err(IndexerError::path("watch path is not a directory", base));
        }

        let mut parsers = HashMap::new();
        let mut ext_to_language = HashMap::new();
        let mut watched_extensions = HashSet::new();
        for language in &config.languages {
            let parser = registry.create_parser(language, &config.org, &config.project, base)?;
            for ext in registry.extensions_for(language) {
                watched_extensions.insert(ext.clone());
                ext_to_language.insert(ext, language.clone());
            }
            parsers.insert(language.clone(), parser);
        }

        let mut excluded_dirs: HashSet<String> = if config.excludes.is_empty() {
            ["vendor".to_string()].into()
        } else {
            config.excludes.iter().cloned().collect()
        };
        for language in &config.languages {
            for dir in language_skip_dirs(language) {
                excluded_dirs.insert((*dir).to_string());
            }
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            base: base.to_path_buf(),
            watched_extensions,
            excluded_dirs,
            ext_to_language,
            parsers: tokio::sync::Mutex::new(parsers),
            pending: Mutex::new(HashMap::new()),
            hashes: Mutex::new(HashMap::new()),
            events_tx: Mutex::new(Some(events_tx)),
            events_rx: Mutex::new(Some(events_rx)),
            dropped_events: AtomicU64::new(0),
            debounce: DEBOUNCE_INTERVAL,
        })
    }

    /// The watched directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Take the receiving end of the event channel (once).
    pub fn take_events(&self) -> Option<mpsc::Receiver<WatchEvent>> {
        self.events_rx.lock().take()
    }

    /// Cumulative count of events dropped on channel overflow.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Whether a path sits under an excluded or hidden directory (or is
    /// itself hidden).
    pub fn is_excluded_path(&self, path: &Path) -> bool {
        let rel = path.strip_prefix(&self.base).unwrap_or(path);
        rel.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            name.starts_with('.') || self.excluded_dirs.contains(name.as_ref())
        })
    }

    /// Whether a file's extension is owned by one of this watcher's parsers.
    pub fn owns_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.watched_extensions
                    .contains(&ext.to_ascii_lowercase())
            })
    }

    /// Parse a file with the parser owning its extension. Used by the
    /// orchestrator's full-index walk and by the debounce flush.
    pub async fn parse_path(&self, ctx: &CancellationToken, path: &Path) -> Result<ParseResult> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let language = self.ext_to_language.get(&ext).ok_or_else(|| {
            IndexerError::internal(format!("no parser owns extension '{ext}'"))
        })?;

        let mut parsers = self.parsers.lock().await;
        let parser = parsers
            .get_mut(language)
            .ok_or_else(|| IndexerError::ParserNotRegistered {
                language: language.clone(),
            })?;
        parser.parse_file(ctx, path).await
    }

    /// Record the published hash for a repo-relative path.
    pub fn record_hash(&self, rel_path: &str, hash: &str) {
        self.hashes
            .lock()
            .insert(rel_path.to_string(), hash.to_string());
    }

    /// Run the watch loop until `cancel` fires: install the recursive OS
    /// watch, buffer raw events into the pending map, and flush on the
    /// debounce tick. On cancellation the events channel closes and the OS
    /// watch handles are released.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let _ = raw_tx.send(event);
                }
                Err(error) => warn!(%error, "filesystem watch error"),
            })
            .map_err(|e| IndexerError::watch_at(e.to_string(), &self.base))?;
        watcher
            .watch(&self.base, RecursiveMode::Recursive)
            .map_err(|e| IndexerError::watch_at(e.to_string(), &self.base))?;

        info!(base = %self.base.display(), "watcher started");

        let mut tick = tokio::time::interval(self.debounce);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe_event = raw_rx.recv() => {
                    match maybe_event {
                        Some(event) => self.note_event(event),
                        None => break,
                    }
                }
                _ = tick.tick() => self.flush(&cancel).await,
            }
        }

        // Releases the OS watch descriptors and closes the events channel.
        drop(watcher);
        self.events_tx.lock().take();
        info!(base = %self.base.display(), "watcher stopped");
        Ok(())
    }

    /// Fold one raw filesystem event into the pending map.
    fn note_event(&self, event: notify::Event) {
        let op = match event.kind {
            EventKind::Create(_) => OP_CREATE,
            EventKind::Modify(ModifyKind::Name(_)) => OP_RENAME,
            EventKind::Modify(_) => OP_WRITE,
            EventKind::Remove(_) => OP_REMOVE,
            _ => return,
        };

        for path in event.paths {
            // New directories are covered by the recursive watch; excluded
            // and hidden subtrees are filtered per event.
            if op == OP_CREATE && path.is_dir() {
                if !self.is_excluded_path(&path) {
                    debug!(path = %path.display(), "new directory under watch");
                }
                continue;
            }
            if !self.owns_extension(&path) || self.is_excluded_path(&path) {
                continue;
            }
            *self.pending.lock().entry(path).or_insert(0) |= op;
        }
    }

    /// Debounce flush: swap the pending map and resolve each entry into at
    /// most one event. Content-hash deduplication is the only suppression.
    async fn flush(&self, cancel: &CancellationToken) {
        let pending = std::mem::take(&mut *self.pending.lock());
        if pending.is_empty() {
            return;
        }

        for (path, ops) in pending {
            if cancel.is_cancelled() {
                return;
            }
            let rel_path = repo_relative(&self.base, &path);

            if ops & (OP_REMOVE | OP_RENAME) != 0 || !path.exists() {
                self.hashes.lock().remove(&rel_path);
                self.emit(WatchEvent {
                    path: rel_path,
                    operation: WatchOp::Delete,
                    result: None,
                    error: None,
                });
                continue;
            }

            let observed_create = ops & OP_CREATE != 0;
            match self.parse_path(cancel, &path).await {
                Ok(result) => {
                    let prior = self.hashes.lock().get(&rel_path).cloned();
                    if prior.as_deref() == Some(result.hash.as_str()) {
                        debug!(path = %rel_path, "content hash unchanged, dropping event");
                        continue;
                    }
                    let operation = if prior.is_none() || observed_create {
                        WatchOp::Create
                    } else {
                        WatchOp::Modify
                    };
                    self.hashes
                        .lock()
                        .insert(rel_path.clone(), result.hash.clone());
                    self.emit(WatchEvent {
                        path: rel_path,
                        operation,
                        result: Some(result),
                        error: None,
                    });
                }
                Err(error) if error.is_cancelled() => return,
                Err(error) => {
                    self.emit(WatchEvent {
                        path: rel_path,
                        operation: if observed_create {
                            WatchOp::Create
                        } else {
                            WatchOp::Modify
                        },
                        result: None,
                        error: Some(error),
                    });
                }
            }
        }
    }

    /// Deliver an event, dropping on overflow. Publication failure never
    /// re-enqueues; the counter makes the loss observable.
    fn emit(&self, event: WatchEvent) {
        let sender = self.events_tx.lock().clone();
        let Some(sender) = sender else {
            return;
        };
        if let Err(mpsc::error::TrySendError::Full(event)) = sender.try_send(event) {
            let dropped = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
            let error = IndexerError::ChannelOverflow { dropped };
            warn!(path = %event.path, %error, "dropping event");
        }
    }
}

/// Directories a language's parser never descends into.
fn language_skip_dirs(language: &str) -> &'static [&'static str] {
    match language {
        "java" => java::JAVA_SKIPPED_DIRS,
        "python" => python::PYTHON_SKIPPED_DIRS,
        "typescript" | "javascript" => typescript::TS_SKIPPED_DIRS,
        "svelte" => svelte::SVELTE_SKIPPED_DIRS,
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{sleep, Duration};

    fn config(excludes: &[&str]) -> WatchPathConfig {
        WatchPathConfig {
            path: String::new(),
            org: "acme".to_string(),
            project: "demo".to_string(),
            languages: vec!["go".to_string()],
            excludes: excludes.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn watcher_at(dir: &Path, excludes: &[&str]) -> PathWatcher {
        PathWatcher::new(
            dir,
            &config(excludes),
            crate::lang::registry::default_registry(),
        )
        .unwrap()
    }

    async fn recv_event(
        rx: &mut mpsc::Receiver<WatchEvent>,
        timeout: Duration,
    ) -> Option<WatchEvent> {
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    #[test]
    fn test_rejects_missing_directory() {
        let err = PathWatcher::new(
            Path::new("/definitely/not/here"),
            &config(&[]),
            crate::lang::registry::default_registry(),
        )
        .unwrap_err();
        assert!(matches!(err, IndexerError::Path { .. }));
    }

    #[test]
    fn test_exclusion_rules() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher_at(dir.path(), &["node_modules"]);

        assert!(watcher.is_excluded_path(&dir.path().join("node_modules/a.go")));
        assert!(watcher.is_excluded_path(&dir.path().join(".git/a.go")));
        assert!(!watcher.is_excluded_path(&dir.path().join("src/a.go")));

        assert!(watcher.owns_extension(Path::new("x.go")));
        assert!(!watcher.owns_extension(Path::new("x.rs")));
    }

    #[test]
    fn test_default_excludes_vendor() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher_at(dir.path(), &[]);
        assert!(watcher.is_excluded_path(&dir.path().join("vendor/a.go")));
    }

    #[test]
    fn test_language_skip_dirs_are_unioned() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(&[]);
        cfg.languages = vec!["python".to_string()];
        let watcher =
            PathWatcher::new(dir.path(), &cfg, crate::lang::registry::default_registry()).unwrap();
        assert!(watcher.is_excluded_path(&dir.path().join("__pycache__/m.py")));
        assert!(watcher.is_excluded_path(&dir.path().join("venv/m.py")));
    }

    #[tokio::test]
    async fn test_create_then_identical_write_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = Arc::new(watcher_at(dir.path(), &[]));
        let mut rx = watcher.take_events().unwrap();
        let cancel = CancellationToken::new();

        let run = {
            let watcher = Arc::clone(&watcher);
            let cancel = cancel.clone();
            tokio::spawn(async move { watcher.run(cancel).await })
        };
        sleep(Duration::from_millis(200)).await;

        let file = dir.path().join("main.go");
        std::fs::write(&file, "package main\n").unwrap();

        let event = recv_event(&mut rx, Duration::from_secs(5)).await.expect("create event");
        assert_eq!(event.operation, WatchOp::Create);
        assert_eq!(event.path, "main.go");
        assert!(event.result.is_some());

        // Identical bytes re-written: the hash check suppresses the event.
        std::fs::write(&file, "package main\n").unwrap();
        assert!(recv_event(&mut rx, Duration::from_millis(600)).await.is_none());

        // A real change surfaces as Modify.
        std::fs::write(&file, "package main\n\nfunc F() {}\n").unwrap();
        let event = recv_event(&mut rx, Duration::from_secs(5)).await.expect("modify event");
        assert_eq!(event.operation, WatchOp::Modify);

        cancel.cancel();
        run.await.unwrap().unwrap();
        // Channel closes on cancellation.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_delete_event() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("gone.go");
        std::fs::write(&file, "package gone\n").unwrap();

        let watcher = Arc::new(watcher_at(dir.path(), &[]));
        let mut rx = watcher.take_events().unwrap();
        let cancel = CancellationToken::new();
        let run = {
            let watcher = Arc::clone(&watcher);
            let cancel = cancel.clone();
            tokio::spawn(async move { watcher.run(cancel).await })
        };
        sleep(Duration::from_millis(200)).await;

        std::fs::remove_file(&file).unwrap();
        let event = recv_event(&mut rx, Duration::from_secs(5)).await.expect("delete event");
        assert_eq!(event.operation, WatchOp::Delete);
        assert_eq!(event.path, "gone.go");
        assert!(event.result.is_none());

        cancel.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_excluded_files_never_surface() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("vendor")).unwrap();

        let watcher = Arc::new(watcher_at(dir.path(), &[]));
        let mut rx = watcher.take_events().unwrap();
        let cancel = CancellationToken::new();
        let run = {
            let watcher = Arc::clone(&watcher);
            let cancel = cancel.clone();
            tokio::spawn(async move { watcher.run(cancel).await })
        };
        sleep(Duration::from_millis(200)).await;

        std::fs::write(dir.path().join("vendor/dep.go"), "package dep\n").unwrap();
        assert!(recv_event(&mut rx, Duration::from_millis(600)).await.is_none());

        cancel.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_initial_hash_suppresses_unchanged_rewrite() {
        // Models the initial-index handoff: the orchestrator records the
        // published hash, then an identical write produces no event.
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.go");
        let source = "package main\n";
        std::fs::write(&file, source).unwrap();

        let watcher = Arc::new(watcher_at(dir.path(), &[]));
        let mut rx = watcher.take_events().unwrap();
        watcher.record_hash("main.go", &crate::core::entity::content_hash(source.as_bytes()));

        let cancel = CancellationToken::new();
        let run = {
            let watcher = Arc::clone(&watcher);
            let cancel = cancel.clone();
            tokio::spawn(async move { watcher.run(cancel).await })
        };
        sleep(Duration::from_millis(200)).await;

        std::fs::write(&file, source).unwrap();
        assert!(recv_event(&mut rx, Duration::from_millis(600)).await.is_none());

        // One byte change: exactly one Modify.
        std::fs::write(&file, "package main2\n").unwrap();
        let event = recv_event(&mut rx, Duration::from_secs(5)).await.expect("modify");
        assert_eq!(event.operation, WatchOp::Modify);
        assert!(recv_event(&mut rx, Duration::from_millis(400)).await.is_none());

        cancel.cancel();
        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_parse_path_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = watcher_at(dir.path(), &[]);

        // A directory named like a watched file cannot be read as one.
        std::fs::create_dir(dir.path().join("odd.go")).unwrap();
        let err = watcher
            .parse_path(&CancellationToken::new(), &dir.path().join("odd.go"))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Parse { .. }));

        // Unowned extensions are an internal dispatch error.
        let err = watcher
            .parse_path(&CancellationToken::new(), &dir.path().join("x.rs"))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Internal { .. }));
    }
}
