//! Error types for the semdex library.
//!
//! This module provides structured error handling for every indexer
//! operation. Configuration and path errors are fatal at startup; parse,
//! watch, and publish errors are reported and counted without halting the
//! indexer; cancellation propagates without logging.

use std::io;
use std::path::PathBuf;
use std::str::Utf8Error;

use thiserror::Error;

/// Main result type for semdex operations.
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Comprehensive error type for all indexer operations.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// Invalid configuration: missing required fields, unknown language,
    /// malformed interval, unresolved glob.
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Watch path does not exist or is not a directory.
    #[error("Path error: {message}: {path}")]
    Path {
        /// Error description
        message: String,
        /// Offending path
        path: PathBuf,
    },

    /// Attempted to construct a parser for an unknown language.
    #[error("No parser registered for language '{language}'")]
    ParserNotRegistered {
        /// Language name requested from the registry
        language: String,
    },

    /// File could not be read, parsed, or exceeded grammar limits.
    #[error("Parse error in {language}: {message}")]
    Parse {
        /// Language being parsed
        language: String,
        /// Error description
        message: String,
        /// File path where the error occurred
        file_path: Option<String>,
    },

    /// Underlying OS watch failed to install.
    #[error("Watch error: {message}")]
    Watch {
        /// Error description
        message: String,
        /// Directory the watch targeted
        path: Option<PathBuf>,
    },

    /// Downstream publish failed.
    #[error("Publish error on '{subject}': {message}")]
    Publish {
        /// Stream subject
        subject: String,
        /// Error description
        message: String,
    },

    /// Propagated from context cancellation.
    #[error("operation cancelled")]
    Cancelled,

    /// Event channel full; the event was dropped.
    #[error("event channel full, {dropped} events dropped so far")]
    ChannelOverflow {
        /// Cumulative dropped-event count
        dropped: u64,
    },

    /// I/O errors outside the parse path.
    #[error("I/O error: {message}")]
    Io {
        /// Error description
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Serialization/deserialization errors.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generic internal errors.
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl IndexerError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new path error
    pub fn path(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Path {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create a new parse error
    pub fn parse(language: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: None,
        }
    }

    /// Create a new parse error with file context
    pub fn parse_in_file(
        language: impl Into<String>,
        message: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self::Parse {
            language: language.into(),
            message: message.into(),
            file_path: Some(file_path.into()),
        }
    }

    /// Create a new watch error
    pub fn watch(message: impl Into<String>) -> Self {
        Self::Watch {
            message: message.into(),
            path: None,
        }
    }

    /// Create a new watch error with directory context
    pub fn watch_at(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Watch {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a new publish error
    pub fn publish(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// True when the error is a cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Add context to an existing error by folding it into the variant's
    /// message. Cancellation and the message-free variants pass through
    /// unchanged.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        match &mut self {
            Self::Config { message, .. }
            | Self::Path { message, .. }
            | Self::Parse { message, .. }
            | Self::Watch { message, .. }
            | Self::Publish { message, .. }
            | Self::Io { message, .. }
            | Self::Serialization { message, .. } => {
                *message = format!("{context}: {message}");
            }
            Self::Internal { context: ctx, .. } => {
                *ctx = Some(context);
            }
            Self::Cancelled
            | Self::ParserNotRegistered { .. }
            | Self::ChannelOverflow { .. } => {}
        }
        self
    }
}

impl From<io::Error> for IndexerError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for IndexerError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<Utf8Error> for IndexerError {
    fn from(err: Utf8Error) -> Self {
        Self::parse("unknown", format!("UTF-8 encoding error: {err}"))
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<IndexerError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}
