//! Shared parsing abstractions.
//!
//! Every language parser implements [`FileParser`] and produces the same
//! [`ParseResult`]; no per-language result variants exist. This module also
//! carries the reference-ID resolution shared by all parsers and small
//! helpers for comments, paths, and generics.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tree_sitter::Node;

use crate::core::entity::{
    entity_id, CodeEntity, EntityKind, BUILTIN_PREFIX, EXTERNAL_PREFIX,
};
use crate::core::errors::{IndexerError, Result};

/// Everything a parser derives from one source file.
///
/// `entities` includes the file entity and is topologically ordered: every
/// entity appears after its parent.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// All entities, parent-first
    pub entities: Vec<CodeEntity>,
    /// Raw import paths observed in the file
    pub imports: Vec<String>,
    /// Package or module name, empty when not applicable
    pub package: String,
    /// Repo-relative file path
    pub path: String,
    /// Content hash of the file bytes
    pub hash: String,
}

impl ParseResult {
    /// The file entity inside `entities`.
    pub fn file_entity(&self) -> Option<&CodeEntity> {
        self.entities.iter().find(|e| e.kind == EntityKind::File)
    }
}

/// Contract every language parser fulfills.
///
/// Implementations own their tree-sitter parser state and are not shared
/// across files concurrently; the registry hands out independent instances.
#[async_trait]
pub trait FileParser: Send {
    /// Registry name of the language this parser handles.
    fn language(&self) -> &'static str;

    /// Parse one file into a [`ParseResult`].
    ///
    /// Must respect cancellation before I/O and between significant work
    /// units; returns [`IndexerError::Cancelled`] when interrupted.
    async fn parse_file(&mut self, ctx: &CancellationToken, path: &Path) -> Result<ParseResult>;
}

/// Factory producing a parser bound to `(org, project, repo_root)`.
pub type ParserFactory =
    Arc<dyn Fn(&str, &str, &Path) -> Result<Box<dyn FileParser>> + Send + Sync>;

/// Read a file's bytes with the cancellation discipline the [`FileParser`]
/// contract requires: checked before the read and again after it.
pub async fn read_source(
    ctx: &CancellationToken,
    language: &str,
    path: &Path,
) -> Result<Vec<u8>> {
    if ctx.is_cancelled() {
        return Err(IndexerError::Cancelled);
    }
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        IndexerError::parse_in_file(language, format!("read failed: {e}"), path.display().to_string())
    })?;
    if ctx.is_cancelled() {
        return Err(IndexerError::Cancelled);
    }
    Ok(bytes)
}

/// Repo-relative form of `path` under `root`, with `/` separators.
pub fn repo_relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = rel.to_string_lossy().replace('\\', "/");
    rel.trim_start_matches("./").to_string()
}

/// Number of lines in a source text, counting a trailing partial line.
pub fn line_count(source: &str) -> usize {
    if source.is_empty() {
        return 1;
    }
    let lines = source.lines().count();
    lines.max(1)
}

/// Strip a generic suffix from a type name: `List<String>` → `List`.
pub fn strip_generics(name: &str) -> &str {
    match name.find('<') {
        Some(idx) => name[..idx].trim_end(),
        None => name,
    }
}

/// Collect the contiguous comment block ending on the line directly above
/// `node`, walking previous siblings whose kind is in `comment_kinds`.
/// Returned lines are in source order, markers intact.
pub fn preceding_comments<'a>(
    node: Node<'a>,
    source: &'a str,
    comment_kinds: &[&str],
) -> Vec<&'a str> {
    let mut comments = Vec::new();
    let mut expected_row = node.start_position().row;
    let mut current = node.prev_sibling();

    while let Some(sibling) = current {
        if !comment_kinds.contains(&sibling.kind()) {
            break;
        }
        // Block must be contiguous with the declaration and itself.
        if sibling.end_position().row + 1 != expected_row {
            break;
        }
        if let Ok(text) = sibling.utf8_text(source.as_bytes()) {
            comments.push(text);
        }
        expected_row = sibling.start_position().row;
        current = sibling.prev_sibling();
    }

    comments.reverse();
    comments
}

/// Collapse raw comment text into a doc comment: strips `//`, `///`, `#`,
/// `/* */`, leading `*` gutters, and joins lines with newlines.
pub fn normalize_comment(raw: &str) -> String {
    let mut lines = Vec::new();
    for line in raw.lines() {
        let mut line = line.trim();
        for prefix in ["///", "//", "/**", "/*", "#"] {
            if let Some(rest) = line.strip_prefix(prefix) {
                line = rest;
                break;
            }
        }
        line = line.strip_suffix("*/").unwrap_or(line);
        line = line.trim_start_matches('*');
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// Join a list of raw comment chunks into one normalized doc comment.
pub fn join_comments(chunks: &[&str]) -> String {
    let normalized: Vec<String> = chunks
        .iter()
        .map(|chunk| normalize_comment(chunk))
        .filter(|text| !text.is_empty())
        .collect();
    normalized.join("\n")
}

/// Resolves relationship targets into reference IDs for one file.
///
/// Targets are always strings: `builtin:{name}` for language built-ins,
/// `external:{import_path}.{symbol}` for symbols qualified through the
/// file's import map, a canonical project entity ID for local symbols, and
/// verbatim source text as the fallback.
pub struct ReferenceResolver<'a> {
    org: &'a str,
    project: &'a str,
    file_path: &'a str,
    imports: &'a HashMap<String, String>,
    builtin_types: &'a [&'static str],
    builtin_functions: &'a [&'static str],
}

impl<'a> ReferenceResolver<'a> {
    /// Create a resolver for one file's context.
    pub fn new(
        org: &'a str,
        project: &'a str,
        file_path: &'a str,
        imports: &'a HashMap<String, String>,
        builtin_types: &'a [&'static str],
        builtin_functions: &'a [&'static str],
    ) -> Self {
        Self {
            org,
            project,
            file_path,
            imports,
            builtin_types,
            builtin_functions,
        }
    }

    /// Resolve a symbol in type position (extends, references, returns,
    /// parameters, receiver). Generic parameters are stripped first.
    pub fn type_ref(&self, symbol: &str) -> Option<String> {
        self.resolve(symbol, EntityKind::Type, self.builtin_types)
    }

    /// Resolve a symbol in call position.
    pub fn call_ref(&self, symbol: &str) -> Option<String> {
        self.resolve(symbol, EntityKind::Function, self.builtin_functions)
    }

    fn resolve(&self, symbol: &str, kind: EntityKind, builtins: &[&'static str]) -> Option<String> {
        let symbol = strip_generics(symbol.trim());
        if symbol.is_empty() {
            return None;
        }

        if builtins.contains(&symbol) {
            return Some(format!("{BUILTIN_PREFIX}{symbol}"));
        }

        // Whole-symbol alias from a from-import style binding.
        if let Some(path) = self.imports.get(symbol) {
            return Some(format!("{EXTERNAL_PREFIX}{path}"));
        }

        if let Some((qualifier, rest)) = symbol.split_once('.') {
            if let Some(path) = self.imports.get(qualifier) {
                return Some(format!("{EXTERNAL_PREFIX}{path}.{rest}"));
            }
            // Qualifier is not a known import: keep the source text verbatim.
            return Some(symbol.to_string());
        }

        Some(entity_id(
            self.org,
            self.project,
            kind,
            self.file_path,
            symbol,
        ))
    }
}
