//! Indexer orchestrator.
//!
//! Expands configured watch paths, performs the initial full index, runs the
//! per-path watchers with one consumer task each, and re-indexes the whole
//! tree on a periodic timer as a safety net. Parse and publish failures are
//! counted and skipped; only configuration and path errors are fatal.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::config::IndexerConfig;
use crate::core::errors::{IndexerError, Result};
use crate::core::metrics::IndexerMetrics;
use crate::core::triples::EntityPayload;
use crate::index::paths::expand_watch_paths;
use crate::index::publisher::{EntityPublisher, ENTITY_SUBJECT};
use crate::lang::common::ParseResult;
use crate::lang::registry::ParserRegistry;
use crate::watch::watcher::PathWatcher;

/// Top-level indexer lifecycle: initialize → start → stop.
pub struct Indexer {
    config: IndexerConfig,
    registry: &'static ParserRegistry,
    publisher: Arc<dyn EntityPublisher>,
    metrics: Arc<IndexerMetrics>,
    watchers: Vec<Arc<PathWatcher>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    initialized: bool,
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("config", &self.config)
            .field("watchers", &self.watchers)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Indexer {
    /// Validate the configuration and construct an indexer. Configuration
    /// errors are fatal here, before any watcher exists.
    pub fn new(
        config: IndexerConfig,
        registry: &'static ParserRegistry,
        publisher: Arc<dyn EntityPublisher>,
    ) -> Result<Self> {
        config.validate(registry)?;
        Ok(Self {
            config,
            registry,
            publisher,
            metrics: Arc::new(IndexerMetrics::new()),
            watchers: Vec::new(),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            initialized: false,
        })
    }

    /// Shared metrics handle.
    pub fn metrics(&self) -> Arc<IndexerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Resolved watcher count (after initialization).
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Expand globs and build one watcher (not yet started) per resolved
    /// directory, with one parser per configured language.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let resolved = expand_watch_paths(&self.config.effective_watch_paths())?;
        for r in &resolved {
            let watcher = PathWatcher::new(&r.base, &r.config, self.registry)?;
            self.watchers.push(Arc::new(watcher));
        }
        info!(paths = self.watchers.len(), "indexer initialized");
        self.initialized = true;
        Ok(())
    }

    /// Initial full index, then watchers and the periodic re-index timer.
    pub async fn start(&mut self) -> Result<()> {
        self.initialize()?;
        self.metrics.set_running(true);

        for watcher in &self.watchers {
            index_tree(watcher, self.publisher.as_ref(), &self.metrics, &self.cancel).await?;
        }

        if self.config.watch_enabled {
            for watcher in &self.watchers {
                let run_watcher = Arc::clone(watcher);
                let run_cancel = self.cancel.clone();
                self.tasks.push(tokio::spawn(async move {
                    if let Err(error) = run_watcher.run(run_cancel).await {
                        warn!(%error, "watcher terminated");
                    }
                }));

                let Some(mut events) = watcher.take_events() else {
                    continue;
                };
                let publisher = Arc::clone(&self.publisher);
                let metrics = Arc::clone(&self.metrics);
                let cancel = self.cancel.clone();
                self.tasks.push(tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            maybe_event = events.recv() => {
                                let Some(event) = maybe_event else { break };
                                if let Some(error) = &event.error {
                                    warn!(path = %event.path, %error, "parse failed");
                                    metrics.record_parse_failure();
                                } else if let Some(result) = &event.result {
                                    publish_result(result, publisher.as_ref(), &metrics).await;
                                } else {
                                    // Deletes are observed; no tombstone is
                                    // published downstream.
                                    debug!(path = %event.path, "file deleted");
                                }
                            }
                        }
                    }
                }));
            }
        }

        if let Some(interval) = self.config.reindex_interval()? {
            let watchers = self.watchers.clone();
            let publisher = Arc::clone(&self.publisher);
            let metrics = Arc::clone(&self.metrics);
            let cancel = self.cancel.clone();
            self.tasks.push(tokio::spawn(async move {
                let mut tick = tokio::time::interval(interval);
                tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                tick.tick().await; // the initial index already ran
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tick.tick() => {
                            debug!("periodic re-index");
                            for watcher in &watchers {
                                if let Err(error) =
                                    index_tree(watcher, publisher.as_ref(), &metrics, &cancel).await
                                {
                                    if error.is_cancelled() {
                                        return;
                                    }
                                    warn!(%error, "periodic re-index failed");
                                }
                            }
                        }
                    }
                }
            }));
        }

        Ok(())
    }

    /// Run the full index once without starting watchers or timers.
    pub async fn index_once(&mut self) -> Result<()> {
        self.initialize()?;
        self.metrics.set_running(true);
        for watcher in &self.watchers {
            index_tree(watcher, self.publisher.as_ref(), &self.metrics, &self.cancel).await?;
        }
        self.metrics.set_running(false);
        Ok(())
    }

    /// Cancel all spawned tasks, wait up to `timeout` for each, and report
    /// final metrics.
    pub async fn stop(&mut self, timeout: Duration) -> Result<()> {
        self.cancel.cancel();
        let tasks: Vec<_> = self.tasks.drain(..).collect();
        if tokio::time::timeout(timeout, futures::future::join_all(tasks))
            .await
            .is_err()
        {
            warn!("tasks did not stop within timeout");
        }
        self.metrics.set_running(false);
        info!(
            entities_indexed = self.metrics.entities_indexed(),
            parse_failures = self.metrics.parse_failures(),
            errors = self.metrics.errors(),
            "indexer stopped"
        );
        Ok(())
    }
}

/// Walk one watcher's tree, parse every owned file, and publish the
/// resulting entities. Parse errors are counted and skipped; cancellation
/// propagates immediately.
async fn index_tree(
    watcher: &PathWatcher,
    publisher: &dyn EntityPublisher,
    metrics: &IndexerMetrics,
    cancel: &CancellationToken,
) -> Result<()> {
    let base = watcher.base().to_path_buf();
    let mut files = 0u64;
    let mut failures = 0u64;

    let walk = WalkDir::new(&base)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && watcher.is_excluded_path(entry.path())));

    for entry in walk {
        if cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(%error, "walk error");
                metrics.record_error();
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !watcher.owns_extension(path) || watcher.is_excluded_path(path) {
            continue;
        }

        match watcher.parse_path(cancel, path).await {
            Ok(result) => {
                watcher.record_hash(&result.path, &result.hash);
                publish_result(&result, publisher, metrics).await;
                files += 1;
            }
            Err(error) if error.is_cancelled() => return Err(error),
            Err(error) => {
                warn!(path = %path.display(), %error, "parse failed during index");
                metrics.record_parse_failure();
                failures += 1;
            }
        }
    }

    info!(base = %base.display(), files, failures, "index pass complete");
    Ok(())
}

/// Publish every entity in one parse result. Publication failures are
/// logged and counted; they neither retry nor re-enqueue.
async fn publish_result(
    result: &ParseResult,
    publisher: &dyn EntityPublisher,
    metrics: &IndexerMetrics,
) {
    for entity in &result.entities {
        let payload = EntityPayload::from_entity(entity);
        let bytes = match payload.to_bytes() {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(id = %entity.id, %error, "payload encoding failed");
                metrics.record_error();
                continue;
            }
        };
        match publisher.publish(ENTITY_SUBJECT, &bytes).await {
            Ok(()) => {
                metrics.record_publish(bytes.len() as u64);
                metrics.record_entities(1);
            }
            Err(error) => {
                warn!(id = %entity.id, %error, "publish failed");
                metrics.record_error();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::WatchPathConfig;
    use crate::index::publisher::MemoryPublisher;
    use crate::lang::registry::default_registry;

    fn config_for(dir: &std::path::Path, languages: &[&str]) -> IndexerConfig {
        IndexerConfig {
            watch_paths: vec![WatchPathConfig {
                path: dir.to_string_lossy().to_string(),
                org: "acme".to_string(),
                project: "demo".to_string(),
                languages: languages.iter().map(|s| s.to_string()).collect(),
                excludes: vec![],
            }],
            watch_enabled: false,
            index_interval: String::new(),
            ..IndexerConfig::default()
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let publisher = Arc::new(MemoryPublisher::new());
        let err = Indexer::new(IndexerConfig::default(), default_registry(), publisher)
            .unwrap_err();
        assert!(matches!(err, IndexerError::Config { .. }));
    }

    #[test]
    fn test_initialize_rejects_missing_path() {
        let config = config_for(std::path::Path::new("/no/such/dir"), &["go"]);
        let mut indexer = Indexer::new(
            config,
            default_registry(),
            Arc::new(MemoryPublisher::new()),
        )
        .unwrap();
        assert!(indexer.initialize().is_err());
    }

    #[tokio::test]
    async fn test_index_once_publishes_entities() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.go"),
            "package main\n\nfunc Main() {}\n",
        )
        .unwrap();

        let publisher = Arc::new(MemoryPublisher::new());
        let config = config_for(dir.path(), &["go"]);
        let mut indexer =
            Indexer::new(config, default_registry(), Arc::clone(&publisher) as _).unwrap();
        indexer.index_once().await.unwrap();

        // package + file + function
        assert_eq!(publisher.len(), 3);
        assert_eq!(indexer.metrics().entities_indexed(), 3);

        let ids: Vec<String> = publisher.payloads().into_iter().map(|p| p.id).collect();
        assert!(ids.contains(&"acme.semspec.code.file.demo.main-go".to_string()));
        assert!(ids.contains(&"acme.semspec.code.function.demo.main-go-Main".to_string()));
    }

    #[tokio::test]
    async fn test_non_file_entries_skipped() {
        let dir = tempfile::tempdir().unwrap();
        // A directory with a watched extension must not be parsed.
        std::fs::create_dir(dir.path().join("odd.go")).unwrap();
        std::fs::write(dir.path().join("ok.go"), "package ok\n").unwrap();

        let publisher = Arc::new(MemoryPublisher::new());
        let config = config_for(dir.path(), &["go"]);
        let mut indexer =
            Indexer::new(config, default_registry(), Arc::clone(&publisher) as _).unwrap();
        indexer.index_once().await.unwrap();

        assert!(publisher.len() >= 2, "ok.go entities published");
        assert_eq!(indexer.metrics().parse_failures(), 0);
    }

    #[tokio::test]
    async fn test_excluded_dirs_skipped_in_walk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("vendor")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        for sub in ["src", "vendor", ".git"] {
            std::fs::write(dir.path().join(sub).join("file.go"), "package x\n").unwrap();
        }

        let publisher = Arc::new(MemoryPublisher::new());
        let config = config_for(dir.path(), &["go"]);
        let mut indexer =
            Indexer::new(config, default_registry(), Arc::clone(&publisher) as _).unwrap();
        indexer.index_once().await.unwrap();

        let payloads = publisher.payloads();
        assert!(payloads.iter().all(|p| !p.id.contains("vendor")));
        assert!(payloads.iter().all(|p| !p.id.contains("git")));
        assert!(payloads.iter().any(|p| p.id.contains("src-file-go")));
    }

    #[tokio::test]
    async fn test_stop_reports_metrics() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.go"), "package a\n").unwrap();

        let mut config = config_for(dir.path(), &["go"]);
        config.watch_enabled = true;
        let publisher = Arc::new(MemoryPublisher::new());
        let mut indexer =
            Indexer::new(config, default_registry(), Arc::clone(&publisher) as _).unwrap();
        indexer.start().await.unwrap();
        assert!(indexer.metrics().health().healthy);

        indexer.stop(Duration::from_secs(5)).await.unwrap();
        assert!(!indexer.metrics().health().healthy);
        assert_eq!(indexer.metrics().health().status, "stopped");
    }
}
