//! Glob expansion of configured watch paths.
//!
//! A watch-path pattern may contain `*`, `?`, `[…]`, and `**`. The resolver
//! splits the pattern at the first glob character, resolves the non-glob
//! prefix to an absolute directory, and expands the remainder with
//! `**`-capable matching; only directory matches are kept.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::GlobBuilder;
use walkdir::WalkDir;

use crate::core::config::WatchPathConfig;
use crate::core::errors::{IndexerError, Result};

/// One watch-path config bound to a concrete directory.
#[derive(Debug, Clone)]
pub struct ResolvedWatchPath {
    /// Absolute directory to watch
    pub base: PathBuf,
    /// The config the directory inherits (org, project, languages, excludes)
    pub config: WatchPathConfig,
}

/// Expand every configured pattern; resolved absolute paths are
/// deduplicated across all configs (first config wins).
pub fn expand_watch_paths(configs: &[WatchPathConfig]) -> Result<Vec<ResolvedWatchPath>> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::new();

    for config in configs {
        for base in expand_pattern(&config.path)? {
            if seen.insert(base.clone()) {
                resolved.push(ResolvedWatchPath {
                    base,
                    config: config.clone(),
                });
            }
        }
    }

    Ok(resolved)
}

/// Expand one pattern into absolute directories. Patterns without glob
/// characters resolve to themselves; glob patterns that match zero
/// directories are a configuration error.
pub fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let Some(glob_at) = pattern.find(['*', '?', '[']) else {
        return Ok(vec![absolutize(Path::new(pattern))]);
    };

    // Split at the last separator before the first glob character.
    let split_at = pattern[..glob_at].rfind('/').map(|i| i + 1).unwrap_or(0);
    let (prefix, remainder) = pattern.split_at(split_at);
    let base = if prefix.is_empty() {
        absolutize(Path::new("."))
    } else {
        absolutize(Path::new(prefix))
    };
    if !base.is_dir() {
        return Err(IndexerError::config_field(
            format!("watch path prefix '{prefix}' is not a directory"),
            "watch_paths.path",
        ));
    }

    let glob = GlobBuilder::new(remainder.trim_end_matches('/'))
        .literal_separator(true)
        .build()
        .map_err(|e| {
            IndexerError::config_field(
                format!("invalid glob pattern '{pattern}': {e}"),
                "watch_paths.path",
            )
        })?;
    let matcher = glob.compile_matcher();

    let mut matches = Vec::new();
    for entry in WalkDir::new(&base).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(%error, "failed to walk directory during glob expansion");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&base) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        if matcher.is_match(relative) {
            matches.push(entry.path().to_path_buf());
        }
    }

    if matches.is_empty() {
        return Err(IndexerError::config_field(
            format!("watch path pattern '{pattern}' matched no directories"),
            "watch_paths.path",
        ));
    }

    matches.sort();
    Ok(matches)
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
    } else {
        let joined = std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf());
        joined.canonicalize().unwrap_or(joined)
    }
}
