//! Configuration types for the indexer.
//!
//! A configuration lists one or more watch-path configs plus global flags.
//! The legacy single-path fields (`repo_path`, `org`, `project`, …) are still
//! accepted and folded into the watch-path list.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{IndexerError, Result, ResultExt};
use crate::lang::registry::ParserRegistry;

/// One watched directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchPathConfig {
    /// Directory path, possibly containing glob characters (`*`, `?`, `[…]`,
    /// `**`).
    pub path: String,

    /// Organization token for entity IDs
    pub org: String,

    /// Project token for entity IDs
    pub project: String,

    /// Languages to index under this path (registry names)
    #[serde(default)]
    pub languages: Vec<String>,

    /// Directory basenames excluded from walks and watches
    #[serde(default)]
    pub excludes: Vec<String>,
}

/// Top-level indexer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Watched directory trees
    #[serde(default)]
    pub watch_paths: Vec<WatchPathConfig>,

    /// Legacy single-path form: repository path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_path: Option<String>,

    /// Legacy single-path form: organization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,

    /// Legacy single-path form: project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Legacy single-path form: languages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,

    /// Legacy single-path form: excluded directory names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_patterns: Option<Vec<String>>,

    /// Whether filesystem watching is enabled
    #[serde(default = "IndexerConfig::default_watch_enabled")]
    pub watch_enabled: bool,

    /// Periodic re-index interval as a duration string; empty disables
    #[serde(default = "IndexerConfig::default_index_interval")]
    pub index_interval: String,

    /// Downstream stream name (informational; the publish subject is fixed)
    #[serde(default)]
    pub stream_name: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            watch_paths: Vec::new(),
            repo_path: None,
            org: None,
            project: None,
            languages: None,
            exclude_patterns: None,
            watch_enabled: Self::default_watch_enabled(),
            index_interval: Self::default_index_interval(),
            stream_name: String::new(),
        }
    }
}

impl IndexerConfig {
    const fn default_watch_enabled() -> bool {
        true
    }

    fn default_index_interval() -> String {
        "5m".to_string()
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// Serialize the configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// The effective watch-path list: configured paths plus the legacy
    /// single-path fields folded into one entry when present.
    pub fn effective_watch_paths(&self) -> Vec<WatchPathConfig> {
        let mut paths = self.watch_paths.clone();
        if let Some(repo_path) = &self.repo_path {
            paths.push(WatchPathConfig {
                path: repo_path.clone(),
                org: self.org.clone().unwrap_or_default(),
                project: self.project.clone().unwrap_or_default(),
                languages: self.languages.clone().unwrap_or_default(),
                excludes: self.exclude_patterns.clone().unwrap_or_default(),
            });
        }
        paths
    }

    /// Parse `index_interval`; `Ok(None)` when the empty string disables the
    /// periodic re-index.
    pub fn reindex_interval(&self) -> Result<Option<Duration>> {
        if self.index_interval.is_empty() {
            return Ok(None);
        }
        let interval = humantime::parse_duration(&self.index_interval).map_err(|e| {
            IndexerError::config_field(
                format!("invalid index_interval '{}': {e}", self.index_interval),
                "index_interval",
            )
        })?;
        if interval.is_zero() {
            return Err(IndexerError::config_field(
                "index_interval must be positive",
                "index_interval",
            ));
        }
        Ok(Some(interval))
    }

    /// Validate the configuration against a parser registry.
    ///
    /// Every watch path needs non-empty `path`, `org` and `project`, and
    /// every listed language must name a registered parser.
    pub fn validate(&self, registry: &ParserRegistry) -> Result<()> {
        let paths = self.effective_watch_paths();
        if paths.is_empty() {
            return Err(IndexerError::config_field(
                "at least one watch path is required",
                "watch_paths",
            ));
        }

        for (i, wp) in paths.iter().enumerate() {
            if wp.path.is_empty() {
                return Err(IndexerError::config_field(
                    format!("watch path #{i} has an empty path"),
                    "watch_paths.path",
                ));
            }
            if wp.org.is_empty() {
                return Err(IndexerError::config_field(
                    format!("watch path '{}' has an empty org", wp.path),
                    "watch_paths.org",
                ));
            }
            if wp.project.is_empty() {
                return Err(IndexerError::config_field(
                    format!("watch path '{}' has an empty project", wp.path),
                    "watch_paths.project",
                ));
            }
            for language in &wp.languages {
                if !registry.has_parser(language) {
                    return Err(IndexerError::config_field(
                        format!("unknown language '{language}' for watch path '{}'", wp.path),
                        "watch_paths.languages",
                    ));
                }
            }
        }

        let _ = self.reindex_interval()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::registry::default_registry;

    fn minimal_config() -> IndexerConfig {
        IndexerConfig {
            watch_paths: vec![WatchPathConfig {
                path: "/tmp/repo".to_string(),
                org: "acme".to_string(),
                project: "demo".to_string(),
                languages: vec!["go".to_string()],
                excludes: vec![],
            }],
            ..IndexerConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = IndexerConfig::default();
        assert!(config.watch_enabled);
        assert_eq!(config.index_interval, "5m");
    }

    #[test]
    fn test_validate_ok() {
        assert!(minimal_config().validate(default_registry()).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty() {
        let config = IndexerConfig::default();
        assert!(config.validate(default_registry()).is_err());

        let mut config = minimal_config();
        config.watch_paths[0].org.clear();
        assert!(config.validate(default_registry()).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_language() {
        let mut config = minimal_config();
        config.watch_paths[0].languages = vec!["cobol".to_string()];
        let err = config.validate(default_registry()).unwrap_err();
        assert!(err.to_string().contains("cobol"));
    }

    #[test]
    fn test_interval_parsing() {
        let mut config = minimal_config();
        assert_eq!(
            config.reindex_interval().unwrap(),
            Some(Duration::from_secs(300))
        );

        config.index_interval = String::new();
        assert_eq!(config.reindex_interval().unwrap(), None);

        config.index_interval = "30s".to_string();
        assert_eq!(
            config.reindex_interval().unwrap(),
            Some(Duration::from_secs(30))
        );

        config.index_interval = "not-a-duration".to_string();
        assert!(config.reindex_interval().is_err());

        config.index_interval = "0s".to_string();
        assert!(config.reindex_interval().is_err());
    }

    #[test]
    fn test_legacy_single_path_form() {
        let yaml = r#"
repo_path: /srv/code
org: acme
project: legacy
languages: [go, python]
exclude_patterns: [vendor]
watch_enabled: false
"#;
        let config: IndexerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.watch_enabled);

        let paths = config.effective_watch_paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].path, "/srv/code");
        assert_eq!(paths[0].org, "acme");
        assert_eq!(paths[0].languages, vec!["go", "python"]);
        assert_eq!(paths[0].excludes, vec!["vendor"]);
        assert!(config.validate(default_registry()).is_ok());
    }

    #[test]
    fn test_load_missing_file_carries_context() {
        let err = IndexerConfig::from_yaml_file("/no/such/semdex.yaml").unwrap_err();
        assert!(err.to_string().contains("/no/such/semdex.yaml"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = minimal_config();
        let yaml = config.to_yaml().unwrap();
        let decoded: IndexerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(decoded.watch_paths, config.watch_paths);
    }
}
