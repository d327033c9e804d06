//! # Semdex: Incremental Source-Code Indexer
//!
//! Semdex continuously ingests a set of watched directory trees, parses every
//! supported source file into a uniform entity model, and publishes each
//! entity as a set of semantic triples for downstream graph ingestion. It
//! provides:
//!
//! - **Uniform entity model**: files, packages, classes, structs, interfaces,
//!   enums, functions, methods, constants, variables, type aliases, components
//! - **Language parsers**: Go, Java, Python, TypeScript/JavaScript, Svelte,
//!   all behind a single `FileParser` contract
//! - **Change detection**: recursive filesystem watches with debounced event
//!   buffers and content-hash deduplication
//! - **Orchestration**: glob expansion of watch paths, initial full index,
//!   periodic re-index, per-path watcher lifecycle
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Orchestrator                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Path Watchers  │  Parser     │  Language  │  Triple        │
//! │                 │  Registry   │  Parsers   │  Encoder       │
//! │ • debounce      │ • name→fac  │ • go       │ • fixed vocab  │
//! │ • hash dedup    │ • ext→name  │ • java     │ • typed objs   │
//! │ • event channel │             │ • python   │ • payloads     │
//! │                 │             │ • ts/js    │                │
//! │                 │             │ • svelte   │                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use semdex::core::config::IndexerConfig;
//! use semdex::index::orchestrator::Indexer;
//! use semdex::index::publisher::LoggingPublisher;
//! use semdex::lang::registry::default_registry;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IndexerConfig::from_yaml_file("semdex.yaml")?;
//!     let mut indexer = Indexer::new(config, default_registry(), Arc::new(LoggingPublisher))?;
//!     indexer.initialize()?;
//!     indexer.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     indexer.stop(std::time::Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_arguments)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

// Core entity model, configuration, and error types
pub mod core {
    //! Core data model, triple encoding, configuration, and errors.

    pub mod config;
    pub mod entity;
    pub mod errors;
    pub mod metrics;
    pub mod triples;
}

// Language-specific parsers behind the shared FileParser contract
pub mod lang {
    //! Language-specific parsing and entity extraction.

    pub mod common;
    pub mod go;
    pub mod java;
    pub mod python;
    pub mod registry;
    pub mod svelte;
    pub mod typescript;

    pub use common::{FileParser, ParseResult, ParserFactory};
    pub use registry::{default_registry, ParserRegistry};
}

// Filesystem watching and change detection
pub mod watch {
    //! Per-path recursive watches with debounced, hash-deduplicated events.

    pub mod watcher;

    pub use watcher::{PathWatcher, WatchEvent, WatchOp};
}

// Orchestration: path resolution, publishing, lifecycle
pub mod index {
    //! Top-level indexer orchestration and publishing.

    pub mod orchestrator;
    pub mod paths;
    pub mod publisher;

    pub use orchestrator::Indexer;
    pub use publisher::{EntityPublisher, ENTITY_SUBJECT};
}

// Re-export primary types for convenience
pub use crate::core::entity::{CodeEntity, EntityKind, Visibility};
pub use crate::core::errors::{IndexerError, Result, ResultExt};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
