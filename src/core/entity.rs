//! Uniform entity model shared by every language parser.
//!
//! A [`CodeEntity`] is the unit of indexing: one code artifact (file, class,
//! function, …) with a stable dotted identifier and ordered relationship
//! lists. Entities are created during parsing, are immutable after
//! construction, and live only long enough to be serialized and published.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fixed middle segments of every entity identifier:
/// `{org}.semspec.code.{type}.{project}.{instance}`.
pub const ID_INFIX: &str = "semspec.code";

/// Prefix marking a language built-in reference (`builtin:string`).
pub const BUILTIN_PREFIX: &str = "builtin:";

/// Prefix marking a reference into an imported module
/// (`external:{import_path}.{symbol}`).
pub const EXTERNAL_PREFIX: &str = "external:";

/// Discriminates what kind of code artifact an entity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A source file
    File,
    /// A package or module scope
    Package,
    /// A free function
    Function,
    /// A method bound to a receiver type
    Method,
    /// A class
    Class,
    /// A struct, record, or dataclass
    Struct,
    /// An interface
    Interface,
    /// An enum
    Enum,
    /// A constant
    Const,
    /// A variable
    Var,
    /// A type alias
    Type,
    /// A UI component (e.g. a Svelte file)
    Component,
}

impl EntityKind {
    /// The lowercase token used inside entity IDs and triples.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::File => "file",
            EntityKind::Package => "package",
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Class => "class",
            EntityKind::Struct => "struct",
            EntityKind::Interface => "interface",
            EntityKind::Enum => "enum",
            EntityKind::Const => "const",
            EntityKind::Var => "var",
            EntityKind::Type => "type",
            EntityKind::Component => "component",
        }
    }

    /// Whether IDs of this kind omit the `-{name}` instance suffix.
    fn instance_is_path_only(self) -> bool {
        matches!(self, EntityKind::File | EntityKind::Package)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity visibility, derived per-language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Exported / public symbol
    Public,
    /// Unexported / private symbol
    #[default]
    Private,
}

impl Visibility {
    /// The lowercase token used in triples.
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

/// Agentic capability metadata declared in an entity's doc comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Capability {
    /// Capability name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Tools the capability uses
    pub tools: Vec<String>,
    /// Declared inputs
    pub inputs: Vec<String>,
    /// Declared outputs
    pub outputs: Vec<String>,
}

impl Capability {
    /// Parse capability annotations out of a doc comment.
    ///
    /// Recognizes line-oriented `Capability:`, `Description:`, `Tools:`,
    /// `Inputs:` and `Outputs:` keys (case-insensitive); list values are
    /// comma-separated. Returns `None` unless a `Capability:` line names the
    /// capability.
    pub fn from_doc_comment(doc: &str) -> Option<Self> {
        let mut cap = Capability::default();
        let mut found = false;

        for line in doc.lines() {
            let line = line.trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "capability" if !value.is_empty() => {
                    cap.name = value.to_string();
                    found = true;
                }
                "description" => cap.description = value.to_string(),
                "tools" => cap.tools = split_list(value),
                "inputs" => cap.inputs = split_list(value),
                "outputs" => cap.outputs = split_list(value),
                _ => {}
            }
        }

        found.then_some(cap)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// A single indexed code artifact.
///
/// Relationship lists hold reference-ID strings: canonical entity IDs,
/// `builtin:{name}`, `external:{path}.{symbol}`, or verbatim source text
/// when a qualifier cannot be resolved. They never contain the empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntity {
    /// Stable dotted identifier (see [`entity_id`])
    pub id: String,
    /// Artifact kind
    pub kind: EntityKind,
    /// Display name
    pub name: String,
    /// Repo-relative source path
    pub path: String,
    /// Package or module name, empty when not applicable
    #[serde(default)]
    pub package: String,
    /// Source language tag
    #[serde(default)]
    pub language: String,
    /// Framework tag (e.g. "svelte"), empty when not applicable
    #[serde(default)]
    pub framework: String,
    /// Derived visibility
    #[serde(default)]
    pub visibility: Visibility,
    /// 1-based inclusive start line
    #[serde(default)]
    pub start_line: usize,
    /// 1-based inclusive end line
    #[serde(default)]
    pub end_line: usize,
    /// Content hash, file entities only (16 lowercase hex chars)
    #[serde(default)]
    pub hash: String,
    /// Leading doc/JSDoc/docstring and/or collapsed modifier lines
    #[serde(default)]
    pub doc_comment: String,
    /// Single parent entity ID
    #[serde(default)]
    pub contained_by: String,
    /// Child entity IDs
    #[serde(default)]
    pub contains: Vec<String>,
    /// Opaque import paths (not resolved IDs)
    #[serde(default)]
    pub imports: Vec<String>,
    /// Supertypes
    #[serde(default)]
    pub extends: Vec<String>,
    /// Implemented interfaces
    #[serde(default)]
    pub implements: Vec<String>,
    /// Embedded types or interfaces
    #[serde(default)]
    pub embeds: Vec<String>,
    /// Distinct callee reference IDs
    #[serde(default)]
    pub calls: Vec<String>,
    /// Referenced type IDs
    #[serde(default)]
    pub references: Vec<String>,
    /// Return type reference IDs
    #[serde(default)]
    pub returns: Vec<String>,
    /// Parameter type reference IDs
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Receiver reference ID, methods only; empty when absent
    #[serde(default)]
    pub receiver: String,
    /// Wall-clock indexing timestamp
    pub indexed_at: DateTime<Utc>,
    /// Agentic capability metadata, when declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,
}

impl CodeEntity {
    /// Create a new entity with its canonical ID computed from
    /// `(org, project, kind, name, path)` and `indexed_at` set to now.
    pub fn new(
        org: &str,
        project: &str,
        kind: EntityKind,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let path = path.into();
        Self {
            id: entity_id(org, project, kind, &path, &name),
            kind,
            name,
            path,
            package: String::new(),
            language: String::new(),
            framework: String::new(),
            visibility: Visibility::Private,
            start_line: 0,
            end_line: 0,
            hash: String::new(),
            doc_comment: String::new(),
            contained_by: String::new(),
            contains: Vec::new(),
            imports: Vec::new(),
            extends: Vec::new(),
            implements: Vec::new(),
            embeds: Vec::new(),
            calls: Vec::new(),
            references: Vec::new(),
            returns: Vec::new(),
            parameters: Vec::new(),
            receiver: String::new(),
            indexed_at: Utc::now(),
            capability: None,
        }
    }

    /// Set the 1-based inclusive line span.
    pub fn with_line_range(mut self, start: usize, end: usize) -> Self {
        self.start_line = start;
        self.end_line = end;
        self
    }

    /// Set the package/module name.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Set the language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the framework tag.
    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = framework.into();
        self
    }

    /// Set the visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Set the doc comment and derive capability metadata from it.
    pub fn with_doc_comment(mut self, doc: impl Into<String>) -> Self {
        self.doc_comment = doc.into();
        self.capability = Capability::from_doc_comment(&self.doc_comment);
        self
    }

    /// Set the content hash (file entities).
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = hash.into();
        self
    }

    /// Set the parent entity ID.
    pub fn with_contained_by(mut self, parent: impl Into<String>) -> Self {
        self.contained_by = parent.into();
        self
    }

    /// Number of source lines spanned, when the line range is set.
    pub fn line_count(&self) -> Option<usize> {
        (self.start_line > 0 && self.end_line >= self.start_line)
            .then(|| self.end_line - self.start_line + 1)
    }
}

/// Compute the canonical entity ID:
/// `{org}.semspec.code.{type}.{project}.{instance}` where `instance` is the
/// sanitized path, suffixed with `-{name}` for entities that are neither
/// files nor packages.
pub fn entity_id(org: &str, project: &str, kind: EntityKind, path: &str, name: &str) -> String {
    let mut instance = sanitize_instance(path);
    if !kind.instance_is_path_only() && !name.is_empty() {
        instance.push('-');
        instance.push_str(name);
    }
    format!("{org}.{ID_INFIX}.{}.{project}.{instance}", kind.as_str())
}

/// Rewrite a path into an ID instance token: `/` and `.` become `-`, and a
/// leading `-` is stripped.
pub fn sanitize_instance(path: &str) -> String {
    let sanitized: String = path
        .chars()
        .map(|c| if c == '/' || c == '.' { '-' } else { c })
        .collect();
    sanitized.trim_start_matches('-').to_string()
}

/// Hash file content: lowercase hex of the first 8 bytes of SHA-256.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_grammar() {
        let id = entity_id("acme", "demo", EntityKind::Struct, "main.go", "User");
        assert_eq!(id, "acme.semspec.code.struct.demo.main-go-User");

        let id = entity_id("acme", "demo", EntityKind::File, "main.go", "main.go");
        assert_eq!(id, "acme.semspec.code.file.demo.main-go");

        let id = entity_id("acme", "demo", EntityKind::Package, "pkg/util/io.go", "util");
        assert_eq!(id, "acme.semspec.code.package.demo.pkg-util-io-go");
    }

    #[test]
    fn test_sanitize_strips_leading_dash() {
        assert_eq!(sanitize_instance("/src/app.ts"), "src-app-ts");
        assert_eq!(sanitize_instance("./lib/mod.py"), "lib-mod-py");
        assert_eq!(sanitize_instance("a/b.c"), "a-b-c");
    }

    #[test]
    fn test_entity_id_deterministic() {
        let a = entity_id("org", "proj", EntityKind::Function, "a/b.go", "F");
        let b = entity_id("org", "proj", EntityKind::Function, "a/b.go", "F");
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_hash_shape() {
        let hash = content_hash(b"package main\n");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        // Prefix of the full SHA-256 hex digest.
        let full = hex::encode(Sha256::digest(b"package main\n"));
        assert!(full.starts_with(&hash));
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
        assert_eq!(content_hash(b"same"), content_hash(b"same"));
    }

    #[test]
    fn test_capability_parsing() {
        let doc = "Resolves user records.\nCapability: user-lookup\nDescription: looks up users\nTools: http, cache\nInputs: user_id\nOutputs: user";
        let cap = Capability::from_doc_comment(doc).unwrap();
        assert_eq!(cap.name, "user-lookup");
        assert_eq!(cap.description, "looks up users");
        assert_eq!(cap.tools, vec!["http", "cache"]);
        assert_eq!(cap.inputs, vec!["user_id"]);
        assert_eq!(cap.outputs, vec!["user"]);
    }

    #[test]
    fn test_capability_requires_name() {
        assert!(Capability::from_doc_comment("Tools: a, b").is_none());
        assert!(Capability::from_doc_comment("plain doc comment").is_none());
    }

    #[test]
    fn test_with_doc_comment_derives_capability() {
        let entity = CodeEntity::new("o", "p", EntityKind::Function, "f", "x.go")
            .with_doc_comment("Capability: indexer");
        assert_eq!(entity.capability.as_ref().unwrap().name, "indexer");
    }

    #[test]
    fn test_line_count() {
        let entity =
            CodeEntity::new("o", "p", EntityKind::Function, "f", "x.go").with_line_range(3, 7);
        assert_eq!(entity.line_count(), Some(5));

        let entity = CodeEntity::new("o", "p", EntityKind::Function, "f", "x.go");
        assert_eq!(entity.line_count(), None);
    }
}
