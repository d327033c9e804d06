//! Downstream publication contract.
//!
//! The message/stream bus is an external collaborator; the indexer only
//! knows the [`EntityPublisher`] contract. Publication failures are logged
//! and counted, never retried in-process.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::core::errors::Result;
use crate::core::triples::EntityPayload;

/// Subject every entity payload is published under.
pub const ENTITY_SUBJECT: &str = "graph.ingest.entity";

/// Opaque downstream sink for serialized entity payloads.
#[async_trait]
pub trait EntityPublisher: Send + Sync {
    /// Publish one payload under a subject.
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<()>;
}

/// Publisher that logs payload sizes; the CLI default when no bus is wired.
pub struct LoggingPublisher;

#[async_trait]
impl EntityPublisher for LoggingPublisher {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<()> {
        debug!(subject, bytes = payload.len(), "publish");
        Ok(())
    }
}

/// Publisher that captures every message in memory. Test support.
#[derive(Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryPublisher {
    /// Create an empty capturing publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of captured messages.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// True when nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Snapshot of captured `(subject, payload)` pairs.
    pub fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages.lock().clone()
    }

    /// Captured payloads decoded from their JSON wire form.
    pub fn payloads(&self) -> Vec<EntityPayload> {
        self.messages
            .lock()
            .iter()
            .filter_map(|(_, bytes)| serde_json::from_slice(bytes).ok())
            .collect()
    }
}

#[async_trait]
impl EntityPublisher for MemoryPublisher {
    async fn publish(&self, subject: &str, payload: &[u8]) -> Result<()> {
        self.messages
            .lock()
            .push((subject.to_string(), payload.to_vec()));
        Ok(())
    }
}
