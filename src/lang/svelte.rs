//! Svelte language parser.
//!
//! The file is parsed with the tree-sitter Svelte grammar to locate the
//! script block and template elements; the script block itself is parsed by
//! the TypeScript grammar. Each file yields one additional `component`
//! entity carrying rune metadata and template component references.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tree_sitter::{Node, Parser};

use crate::core::entity::{content_hash, CodeEntity, EntityKind, Visibility};
use crate::core::errors::{IndexerError, Result};
use crate::lang::common::{
    line_count, read_source, repo_relative, FileParser, ParseResult, ReferenceResolver,
};
use crate::lang::typescript::{TsDialect, TypeScriptParser, TS_BUILTIN_FUNCS, TS_BUILTIN_TYPES};

/// Directories skipped when walking Svelte trees: the TS/JS set plus the
/// SvelteKit build output.
pub const SVELTE_SKIPPED_DIRS: &[&str] =
    &["node_modules", "dist", ".next", "build", "coverage", ".svelte-kit"];

/// Svelte-specific parsing: script harvest, runes, and template references.
pub struct SvelteParser {
    org: String,
    project: String,
    repo_root: PathBuf,
    parser: Parser,
    script_parser: TypeScriptParser,
}

struct ScriptBlock {
    text: String,
    /// 0-based row of the script text inside the file.
    row_offset: usize,
    language: &'static str,
}

impl SvelteParser {
    /// Create a new Svelte parser bound to `(org, project, repo_root)`.
    pub fn new(org: &str, project: &str, repo_root: &Path) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_svelte_ng::LANGUAGE.into())
            .map_err(|e| {
                IndexerError::parse("svelte", format!("failed to set parser language: {e}"))
            })?;
        let script_parser =
            TypeScriptParser::new(org, project, repo_root, TsDialect::TypeScript)?;

        Ok(Self {
            org: org.to_string(),
            project: project.to_string(),
            repo_root: repo_root.to_path_buf(),
            parser,
            script_parser,
        })
    }

    /// Parse Svelte source text into a [`ParseResult`].
    pub fn parse_source(
        &mut self,
        source: &str,
        rel_path: &str,
        hash: &str,
    ) -> Result<ParseResult> {
        let tree = self.parser.parse(source, None).ok_or_else(|| {
            IndexerError::parse_in_file("svelte", "failed to parse source", rel_path)
        })?;
        let root = tree.root_node();

        let script = self.script_block(root, source);
        let language = script.as_ref().map_or("typescript", |s| s.language);

        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path).to_string();
        let mut file_entity = CodeEntity::new(
            &self.org,
            &self.project,
            EntityKind::File,
            file_name.clone(),
            rel_path,
        )
        .with_language(language)
        .with_framework("svelte")
        .with_hash(hash)
        .with_line_range(1, line_count(source));

        // Harvest the script block through the TypeScript grammar.
        let mut imports = Vec::new();
        let mut import_map = std::collections::HashMap::new();
        let mut script_entities = Vec::new();
        if let Some(script) = &script {
            let harvested = self
                .script_parser
                .parse_source(&script.text, rel_path, hash)?;
            (imports, import_map) = self.script_parser.imports_of(&script.text)?;

            for mut entity in harvested.entities {
                if entity.kind == EntityKind::File {
                    continue;
                }
                entity.language = language.to_string();
                entity.framework = "svelte".to_string();
                entity.start_line += script.row_offset;
                entity.end_line += script.row_offset;
                script_entities.push(entity);
            }
        }
        file_entity.imports = imports.clone();

        let resolver = ReferenceResolver::new(
            &self.org,
            &self.project,
            rel_path,
            &import_map,
            TS_BUILTIN_TYPES,
            TS_BUILTIN_FUNCS,
        );

        // One component entity per file, named from the filename stem.
        let stem = file_name.strip_suffix(".svelte").unwrap_or(&file_name);
        let mut component = CodeEntity::new(
            &self.org,
            &self.project,
            EntityKind::Component,
            stem,
            rel_path,
        )
        .with_language(language)
        .with_framework("svelte")
        .with_visibility(Visibility::Public)
        .with_line_range(1, line_count(source))
        .with_contained_by(file_entity.id.clone());

        for tag in self.template_components(root, source) {
            if let Some(reference) = resolver.type_ref(&tag) {
                component.references.push(reference);
            }
        }
        if let Some(script) = &script {
            component = component.with_doc_comment(rune_summary(&script.text));
        }

        file_entity.contains.push(component.id.clone());
        let file_id = file_entity.id.clone();
        for entity in &script_entities {
            if entity.contained_by == file_id {
                file_entity.contains.push(entity.id.clone());
            }
        }

        let mut entities = vec![file_entity, component];
        entities.extend(script_entities);

        Ok(ParseResult {
            entities,
            imports,
            package: String::new(),
            path: rel_path.to_string(),
            hash: hash.to_string(),
        })
    }

    /// The first script element's raw text, row offset, and declared
    /// language (`typescript` unless `lang` says JavaScript).
    fn script_block(&self, root: Node, source: &str) -> Option<ScriptBlock> {
        let mut scripts = Vec::new();
        collect_nodes_by_kind(root, "script_element", &mut scripts);
        let script = scripts.into_iter().next()?;

        let mut language = "typescript";
        if let Some(start_tag) = find_child_by_kind(script, "start_tag") {
            if let Some(lang) = attribute_value(start_tag, "lang", source) {
                if matches!(lang.as_str(), "js" | "javascript") {
                    language = "javascript";
                }
            }
        }

        let raw = find_child_by_kind(script, "raw_text")?;
        let text = raw.utf8_text(source.as_bytes()).ok()?.to_string();
        Some(ScriptBlock {
            text,
            row_offset: raw.start_position().row,
            language,
        })
    }

    /// PascalCase tag names used in the template, first occurrence order.
    fn template_components(&self, root: Node, source: &str) -> Vec<String> {
        let mut tags = Vec::new();
        let mut nodes = Vec::new();
        collect_nodes_by_kind(root, "tag_name", &mut nodes);
        for node in nodes {
            let Ok(name) = node.utf8_text(source.as_bytes()) else {
                continue;
            };
            if name.chars().next().is_some_and(char::is_uppercase)
                && !tags.iter().any(|t| t == name)
            {
                tags.push(name.to_string());
            }
        }
        tags
    }
}

/// Serialize rune usage into the component doc comment:
/// `"Props: …; State: …; Derived: …; Effects: N"`.
fn rune_summary(script: &str) -> String {
    let mut props = Vec::new();
    let mut state = Vec::new();
    let mut derived = Vec::new();
    let mut effects = 0usize;

    for line in script.lines() {
        let trimmed = line.trim();
        effects += trimmed.matches("$effect(").count();

        if trimmed.contains("$props()") {
            props.extend(destructured_names(trimmed));
            continue;
        }
        if trimmed.contains("= $state(") {
            if let Some(name) = binding_name(trimmed) {
                state.push(name);
            }
        }
        if trimmed.contains("= $derived(") {
            if let Some(name) = binding_name(trimmed) {
                derived.push(name);
            }
        }
    }

    let mut sections = Vec::new();
    if !props.is_empty() {
        sections.push(format!("Props: {}", props.join(", ")));
    }
    if !state.is_empty() {
        sections.push(format!("State: {}", state.join(", ")));
    }
    if !derived.is_empty() {
        sections.push(format!("Derived: {}", derived.join(", ")));
    }
    if effects > 0 {
        sections.push(format!("Effects: {effects}"));
    }
    sections.join("; ")
}

/// Names bound by `let { a, b = 1, c = $bindable() } = $props()`.
/// `$bindable()` defaults are props like any other.
fn destructured_names(line: &str) -> Vec<String> {
    let Some(open) = line.find('{') else {
        // `let props = $props()` binds a single name.
        return binding_name(line).into_iter().collect();
    };
    // The destructure closes on the last `}` before the `$props()` call;
    // default values may carry braces of their own.
    let Some(close) = line
        .find("$props")
        .and_then(|props_at| line[..props_at].rfind('}'))
        .filter(|close| *close > open)
    else {
        return Vec::new();
    };
    line[open + 1..close]
        .split(',')
        .filter_map(|entry| {
            let name = entry.split(['=', ':']).next()?.trim();
            let name = name.trim_start_matches("...").trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

/// The identifier bound by `let name = $rune(...)`.
fn binding_name(line: &str) -> Option<String> {
    let lhs = line.split('=').next()?.trim();
    let name = lhs
        .strip_prefix("export ")
        .unwrap_or(lhs)
        .trim_start_matches("let ")
        .trim_start_matches("const ")
        .trim_start_matches("var ")
        .trim();
    // Drop a type annotation on the binding.
    let name = name.split(':').next()?.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return None;
    }
    Some(name.to_string())
}

fn find_child_by_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor).find(|child| child.kind() == kind);
    result
}

fn collect_nodes_by_kind<'a>(node: Node<'a>, kind: &str, out: &mut Vec<Node<'a>>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == kind {
            out.push(child);
        } else {
            collect_nodes_by_kind(child, kind, out);
        }
    }
}

/// Value of a named attribute inside a start tag, quotes stripped.
fn attribute_value(start_tag: Node, name: &str, source: &str) -> Option<String> {
    let mut attributes = Vec::new();
    collect_nodes_by_kind(start_tag, "attribute", &mut attributes);
    for attribute in attributes {
        let Some(attr_name) = find_child_by_kind(attribute, "attribute_name") else {
            continue;
        };
        if attr_name.utf8_text(source.as_bytes()).ok()? != name {
            continue;
        }
        let text = attribute.utf8_text(source.as_bytes()).ok()?;
        let value = text.split_once('=')?.1.trim().trim_matches('"').trim_matches('\'');
        return Some(value.to_string());
    }
    None
}

#[async_trait]
impl FileParser for SvelteParser {
    fn language(&self) -> &'static str {
        "svelte"
    }

    async fn parse_file(&mut self, ctx: &CancellationToken, path: &Path) -> Result<ParseResult> {
        let bytes = read_source(ctx, "svelte", path).await?;
        let hash = content_hash(&bytes);
        let source = String::from_utf8_lossy(&bytes);
        let rel_path = repo_relative(&self.repo_root, path);
        self.parse_source(&source, &rel_path, &hash)
    }
}

#[cfg(test)]
#[path = "svelte_tests.rs"]
mod tests;
