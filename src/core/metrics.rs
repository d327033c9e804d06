//! Aggregate indexer metrics.
//!
//! Counters are atomics shared across watcher and consumer tasks;
//! `last_activity` sits behind a short critical section. Snapshots feed a
//! health endpoint owned by the embedding service.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Aggregate counters for one indexer instance.
#[derive(Debug)]
pub struct IndexerMetrics {
    entities_indexed: AtomicU64,
    parse_failures: AtomicU64,
    errors: AtomicU64,
    messages_published: AtomicU64,
    bytes_published: AtomicU64,
    running: AtomicBool,
    started: Instant,
    last_activity: Mutex<Option<DateTime<Utc>>>,
}

impl Default for IndexerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerMetrics {
    /// Create a zeroed metrics set; uptime counts from now.
    pub fn new() -> Self {
        Self {
            entities_indexed: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            bytes_published: AtomicU64::new(0),
            running: AtomicBool::new(false),
            started: Instant::now(),
            last_activity: Mutex::new(None),
        }
    }

    /// Record `count` newly indexed entities.
    pub fn record_entities(&self, count: u64) {
        self.entities_indexed.fetch_add(count, Ordering::Relaxed);
        self.touch();
    }

    /// Record one non-fatal parse failure.
    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one generic error.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one published message of `bytes` length.
    pub fn record_publish(&self, bytes: u64) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published.fetch_add(bytes, Ordering::Relaxed);
        self.touch();
    }

    /// Mark the indexer running or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    /// Total entities indexed so far.
    pub fn entities_indexed(&self) -> u64 {
        self.entities_indexed.load(Ordering::Relaxed)
    }

    /// Total parse failures so far.
    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    /// Total errors so far.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    fn touch(&self) {
        *self.last_activity.lock() = Some(Utc::now());
    }

    /// Health snapshot for the embedding service's health endpoint.
    pub fn health(&self) -> HealthSnapshot {
        let running = self.running.load(Ordering::Relaxed);
        HealthSnapshot {
            healthy: running,
            status: if running { "running" } else { "stopped" }.to_string(),
            uptime_seconds: self.started.elapsed().as_secs(),
            error_count: self.errors() + self.parse_failures(),
            last_activity: *self.last_activity.lock(),
        }
    }

    /// Flow-rate snapshot averaged over process uptime.
    pub fn flow(&self) -> FlowMetrics {
        let elapsed = self.started.elapsed().as_secs_f64().max(1.0);
        let messages = self.messages_published.load(Ordering::Relaxed);
        let bytes = self.bytes_published.load(Ordering::Relaxed);
        let errors = self.errors() + self.parse_failures();
        FlowMetrics {
            messages_per_second: messages as f64 / elapsed,
            bytes_per_second: bytes as f64 / elapsed,
            error_rate: errors as f64 / elapsed,
            last_activity: *self.last_activity.lock(),
        }
    }
}

/// Point-in-time health view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// True while the indexer is running
    pub healthy: bool,
    /// "running" or "stopped"
    pub status: String,
    /// Seconds since construction
    pub uptime_seconds: u64,
    /// Errors plus parse failures
    pub error_count: u64,
    /// Timestamp of the most recent index or publish activity
    pub last_activity: Option<DateTime<Utc>>,
}

/// Point-in-time publish-rate view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowMetrics {
    /// Published messages per second of uptime
    pub messages_per_second: f64,
    /// Published bytes per second of uptime
    pub bytes_per_second: f64,
    /// Errors per second of uptime
    pub error_rate: f64,
    /// Timestamp of the most recent index or publish activity
    pub last_activity: Option<DateTime<Utc>>,
}
