//! TypeScript/JavaScript language parser with tree-sitter integration.
//!
//! One parser covers `.ts`, `.tsx`, `.js`, `.jsx`, `.mjs`, and `.cjs`; the
//! grammar is selected per file extension. Entities under an `export`
//! statement are public, everything else is private.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tree_sitter::{Language, Node, Parser};

use crate::core::entity::{content_hash, CodeEntity, EntityKind, Visibility};
use crate::core::errors::{IndexerError, Result};
use crate::lang::common::{
    join_comments, line_count, preceding_comments, read_source, repo_relative, FileParser,
    ParseResult, ReferenceResolver,
};

/// Fixed set of TS/JS built-in types and intrinsic generics.
pub const TS_BUILTIN_TYPES: &[&str] = &[
    "string", "number", "boolean", "any", "unknown", "never", "void", "null", "undefined",
    "object", "symbol", "bigint", "Array", "Promise", "Record", "Map", "Set", "WeakMap",
    "WeakSet", "Date", "RegExp", "Error", "Function", "Object", "String", "Number", "Boolean",
    "Symbol", "Partial", "Required", "Readonly", "Pick", "Omit", "Exclude", "Extract",
    "NonNullable", "ReturnType", "Parameters",
];

/// Fixed set of TS/JS built-in functions.
pub const TS_BUILTIN_FUNCS: &[&str] = &[
    "require", "parseInt", "parseFloat", "isNaN", "isFinite", "encodeURIComponent",
    "decodeURIComponent", "setTimeout", "setInterval", "clearTimeout", "clearInterval",
    "structuredClone", "fetch", "alert", "String", "Number", "Boolean", "Array", "Object",
    "Symbol", "BigInt",
];

/// Build and dependency directories skipped when walking TS/JS trees.
pub const TS_SKIPPED_DIRS: &[&str] = &["node_modules", "dist", ".next", "build", "coverage"];

/// Base dialect a parser instance is registered for; the concrete grammar
/// still follows the file extension (`.tsx` → TSX, `.js` → JavaScript).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TsDialect {
    /// TypeScript / TSX files
    TypeScript,
    /// JavaScript / JSX / module variants
    JavaScript,
}

/// TypeScript/JavaScript parsing and entity extraction.
pub struct TypeScriptParser {
    org: String,
    project: String,
    repo_root: PathBuf,
    dialect: TsDialect,
}

impl TypeScriptParser {
    /// Create a new parser bound to `(org, project, repo_root)`.
    pub fn new(org: &str, project: &str, repo_root: &Path, dialect: TsDialect) -> Result<Self> {
        // Validate the grammars up front so registry construction fails fast.
        let _ = make_parser(grammar_for_extension("ts"))?;
        Ok(Self {
            org: org.to_string(),
            project: project.to_string(),
            repo_root: repo_root.to_path_buf(),
            dialect,
        })
    }

    /// Language tag recorded on entities from `rel_path`.
    fn language_tag(&self, rel_path: &str) -> &'static str {
        match extension_of(rel_path) {
            "ts" | "tsx" => "typescript",
            "js" | "jsx" | "mjs" | "cjs" => "javascript",
            _ => match self.dialect {
                TsDialect::TypeScript => "typescript",
                TsDialect::JavaScript => "javascript",
            },
        }
    }

    /// Parse TS/JS source text into a [`ParseResult`].
    pub fn parse_source(
        &mut self,
        source: &str,
        rel_path: &str,
        hash: &str,
    ) -> Result<ParseResult> {
        let language = self.language_tag(rel_path);
        let mut parser = make_parser(grammar_for_extension(extension_of(rel_path)))?;
        let tree = parser.parse(source, None).ok_or_else(|| {
            IndexerError::parse_in_file(language, "failed to parse source", rel_path)
        })?;
        let root = tree.root_node();

        let (imports, import_map) = self.collect_imports(root, source);
        let resolver = ReferenceResolver::new(
            &self.org,
            &self.project,
            rel_path,
            &import_map,
            TS_BUILTIN_TYPES,
            TS_BUILTIN_FUNCS,
        );

        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path).to_string();
        let mut file_entity = CodeEntity::new(
            &self.org,
            &self.project,
            EntityKind::File,
            file_name,
            rel_path,
        )
        .with_language(language)
        .with_hash(hash)
        .with_line_range(1, line_count(source));
        file_entity.imports = imports.clone();

        let file_id = file_entity.id.clone();
        let mut children = Vec::new();
        self.extract_program(root, source, rel_path, language, &resolver, &file_id, &mut children)?;

        for child in &children {
            if child.contained_by == file_id {
                file_entity.contains.push(child.id.clone());
            }
        }

        let mut entities = vec![file_entity];
        entities.extend(children);

        Ok(ParseResult {
            entities,
            imports,
            package: String::new(),
            path: rel_path.to_string(),
            hash: hash.to_string(),
        })
    }

    fn extract_program(
        &self,
        root: Node,
        source: &str,
        rel_path: &str,
        language: &str,
        resolver: &ReferenceResolver,
        file_id: &str,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            if node.kind() == "export_statement" {
                let decorators = self.decorator_lines(node, source);
                let mut inner = node.walk();
                for declaration in node.named_children(&mut inner) {
                    self.extract_declaration(
                        declaration,
                        source,
                        rel_path,
                        language,
                        resolver,
                        file_id,
                        Visibility::Public,
                        &decorators,
                        out,
                    )?;
                }
            } else {
                self.extract_declaration(
                    node,
                    source,
                    rel_path,
                    language,
                    resolver,
                    file_id,
                    Visibility::Private,
                    &[],
                    out,
                )?;
            }
        }
        Ok(())
    }

    fn extract_declaration(
        &self,
        node: Node,
        source: &str,
        rel_path: &str,
        language: &str,
        resolver: &ReferenceResolver,
        file_id: &str,
        visibility: Visibility,
        outer_decorators: &[String],
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                self.extract_class(
                    node,
                    source,
                    rel_path,
                    language,
                    resolver,
                    file_id,
                    visibility,
                    outer_decorators,
                    out,
                )?;
            }
            "interface_declaration" => {
                if let Some(entity) = self.extract_interface(
                    node, source, rel_path, language, resolver, file_id, visibility,
                )? {
                    out.push(entity);
                }
            }
            "type_alias_declaration" => {
                if let Some(name) = self.node_field_text(node, "name", source) {
                    let mut entity = self.base_entity(
                        EntityKind::Type,
                        &name,
                        node,
                        rel_path,
                        language,
                        file_id,
                        visibility,
                    );
                    if let Some(value) = node.child_by_field_name("value") {
                        entity.references = self.collect_type_refs(value, source, resolver);
                    }
                    entity = entity.with_doc_comment(self.doc_for(node, source));
                    out.push(entity);
                }
            }
            "enum_declaration" => {
                if let Some(name) = self.node_field_text(node, "name", source) {
                    let entity = self
                        .base_entity(
                            EntityKind::Enum,
                            &name,
                            node,
                            rel_path,
                            language,
                            file_id,
                            visibility,
                        )
                        .with_doc_comment(self.doc_for(node, source));
                    out.push(entity);
                }
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = self.node_field_text(node, "name", source) {
                    let mut entity = self.base_entity(
                        EntityKind::Function,
                        &name,
                        node,
                        rel_path,
                        language,
                        file_id,
                        visibility,
                    );
                    self.fill_callable(node, source, resolver, &mut entity);
                    entity = entity
                        .with_doc_comment(self.compose_doc(node, source, outer_decorators, &[]));
                    out.push(entity);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                self.extract_variables(
                    node, source, rel_path, language, resolver, file_id, visibility, out,
                )?;
            }
            _ => {}
        }
        Ok(())
    }

    fn extract_class(
        &self,
        node: Node,
        source: &str,
        rel_path: &str,
        language: &str,
        resolver: &ReferenceResolver,
        file_id: &str,
        visibility: Visibility,
        outer_decorators: &[String],
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let Some(name) = self.node_field_text(node, "name", source) else {
            return Ok(());
        };

        let mut entity = self.base_entity(
            EntityKind::Class,
            &name,
            node,
            rel_path,
            language,
            file_id,
            visibility,
        );

        let own_decorators = self.decorator_lines(node, source);
        entity = entity.with_doc_comment(self.compose_doc(
            node,
            source,
            outer_decorators,
            &own_decorators,
        ));

        // class_heritage carries `extends` (both dialects) and `implements`
        // (TypeScript only). The JavaScript grammar has no extends_clause
        // node; the heritage expression sits directly under class_heritage.
        let mut cursor = node.walk();
        for heritage in node.children(&mut cursor) {
            if heritage.kind() != "class_heritage" {
                continue;
            }
            let mut clause_cursor = heritage.walk();
            let mut saw_clause = false;
            for clause in heritage.named_children(&mut clause_cursor) {
                match clause.kind() {
                    "extends_clause" => {
                        saw_clause = true;
                        self.heritage_refs(clause, source, resolver, &mut entity.extends);
                    }
                    "implements_clause" => {
                        saw_clause = true;
                        self.heritage_refs(clause, source, resolver, &mut entity.implements);
                    }
                    _ => {}
                }
            }
            if !saw_clause {
                self.heritage_refs(heritage, source, resolver, &mut entity.extends);
            }
        }

        let class_id = entity.id.clone();
        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for member in body.children(&mut cursor) {
                if member.kind() != "method_definition" {
                    continue;
                }
                if let Some(method) = self.extract_method(
                    member, source, rel_path, language, resolver, &class_id,
                )? {
                    methods.push(method);
                }
            }
        }

        for method in &methods {
            entity.contains.push(method.id.clone());
        }
        out.push(entity);
        out.extend(methods);
        Ok(())
    }

    fn heritage_refs(
        &self,
        clause: Node,
        source: &str,
        resolver: &ReferenceResolver,
        refs: &mut Vec<String>,
    ) {
        let mut cursor = clause.walk();
        for value in clause.named_children(&mut cursor) {
            if matches!(
                value.kind(),
                "identifier" | "member_expression" | "type_identifier" | "nested_type_identifier"
                    | "generic_type"
            ) {
                if let Ok(text) = value.utf8_text(source.as_bytes()) {
                    if let Some(reference) = resolver.type_ref(text) {
                        refs.push(reference);
                    }
                }
            }
        }
    }

    fn extract_method(
        &self,
        node: Node,
        source: &str,
        rel_path: &str,
        language: &str,
        resolver: &ReferenceResolver,
        class_id: &str,
    ) -> Result<Option<CodeEntity>> {
        let Some(name_node) = node.child_by_field_name("name") else {
            return Ok(None);
        };
        let Ok(name) = name_node.utf8_text(source.as_bytes()) else {
            return Ok(None);
        };
        if name == "constructor" {
            return Ok(None);
        }

        // `#`-prefixed names and private/protected accessibility are private.
        let mut visibility = if name.starts_with('#') {
            Visibility::Private
        } else {
            Visibility::Public
        };
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "accessibility_modifier" {
                if let Ok(text) = child.utf8_text(source.as_bytes()) {
                    if text == "private" || text == "protected" {
                        visibility = Visibility::Private;
                    }
                }
            }
        }

        let mut entity = CodeEntity::new(
            &self.org,
            &self.project,
            EntityKind::Method,
            name,
            rel_path,
        )
        .with_language(language)
        .with_visibility(visibility)
        .with_line_range(node.start_position().row + 1, node.end_position().row + 1)
        .with_contained_by(class_id);

        self.fill_callable(node, source, resolver, &mut entity);
        let own_decorators = self.decorator_lines(node, source);
        entity = entity.with_doc_comment(self.compose_doc(node, source, &[], &own_decorators));
        Ok(Some(entity))
    }

    fn extract_interface(
        &self,
        node: Node,
        source: &str,
        rel_path: &str,
        language: &str,
        resolver: &ReferenceResolver,
        file_id: &str,
        visibility: Visibility,
    ) -> Result<Option<CodeEntity>> {
        let Some(name) = self.node_field_text(node, "name", source) else {
            return Ok(None);
        };

        let mut entity = self.base_entity(
            EntityKind::Interface,
            &name,
            node,
            rel_path,
            language,
            file_id,
            visibility,
        );

        let mut clauses = Vec::new();
        self.collect_nodes_by_kind(node, "extends_type_clause", &mut clauses);
        self.collect_nodes_by_kind(node, "extends_clause", &mut clauses);
        for clause in clauses {
            let mut inner = clause.walk();
            for value in clause.named_children(&mut inner) {
                if let Ok(text) = value.utf8_text(source.as_bytes()) {
                    if let Some(reference) = resolver.type_ref(text) {
                        entity.extends.push(reference);
                    }
                }
            }
        }

        entity = entity.with_doc_comment(self.doc_for(node, source));
        Ok(Some(entity))
    }

    /// Const/let/var declarators: an arrow function or function expression
    /// bound to a top-level variable is a function entity; everything else
    /// is a const/var entity.
    fn extract_variables(
        &self,
        node: Node,
        source: &str,
        rel_path: &str,
        language: &str,
        resolver: &ReferenceResolver,
        file_id: &str,
        visibility: Visibility,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let is_const = node
            .child(0)
            .and_then(|c| c.utf8_text(source.as_bytes()).ok())
            .is_some_and(|text| text == "const");
        let value_kind = if is_const {
            EntityKind::Const
        } else {
            EntityKind::Var
        };

        let mut cursor = node.walk();
        for declarator in node.children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            if name_node.kind() != "identifier" {
                continue;
            }
            let Ok(name) = name_node.utf8_text(source.as_bytes()) else {
                continue;
            };

            let value = declarator.child_by_field_name("value");
            let is_function = value.is_some_and(|v| {
                matches!(
                    v.kind(),
                    "arrow_function" | "function_expression" | "function"
                )
            });

            if is_function {
                let function_node = value.expect("checked above");
                let mut entity = CodeEntity::new(
                    &self.org,
                    &self.project,
                    EntityKind::Function,
                    name,
                    rel_path,
                )
                .with_language(language)
                .with_visibility(visibility)
                .with_line_range(
                    declarator.start_position().row + 1,
                    declarator.end_position().row + 1,
                )
                .with_contained_by(file_id);
                self.fill_callable(function_node, source, resolver, &mut entity);
                entity = entity.with_doc_comment(self.compose_doc(node, source, &[], &[]));
                out.push(entity);
            } else {
                let mut entity = CodeEntity::new(
                    &self.org,
                    &self.project,
                    value_kind,
                    name,
                    rel_path,
                )
                .with_language(language)
                .with_visibility(visibility)
                .with_line_range(
                    declarator.start_position().row + 1,
                    declarator.end_position().row + 1,
                )
                .with_contained_by(file_id)
                .with_doc_comment(self.doc_for(node, source));
                if let Some(annotation) = declarator.child_by_field_name("type") {
                    entity.references = self.collect_type_refs(annotation, source, resolver);
                }
                out.push(entity);
            }
        }
        Ok(())
    }

    /// Parameters, return type, body calls, and the async marker.
    fn fill_callable(
        &self,
        node: Node,
        source: &str,
        resolver: &ReferenceResolver,
        entity: &mut CodeEntity,
    ) {
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                let annotation = match param.kind() {
                    "required_parameter" | "optional_parameter" => {
                        param.child_by_field_name("type")
                    }
                    _ => None,
                };
                if let Some(annotation) = annotation {
                    if let Some(reference) =
                        self.collect_type_refs(annotation, source, resolver).into_iter().next()
                    {
                        entity.parameters.push(reference);
                    }
                }
            }
        }
        if let Some(return_type) = node.child_by_field_name("return_type") {
            if let Some(reference) = self
                .collect_type_refs(return_type, source, resolver)
                .into_iter()
                .next()
            {
                entity.returns.push(reference);
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            entity.calls = self.collect_calls(body, source, resolver);
        }
    }

    /// Named types referenced inside a type expression, generics stripped.
    fn collect_type_refs(
        &self,
        node: Node,
        source: &str,
        resolver: &ReferenceResolver,
    ) -> Vec<String> {
        let mut refs = Vec::new();
        self.walk_type_refs(node, source, resolver, &mut refs);
        refs
    }

    fn walk_type_refs(
        &self,
        node: Node,
        source: &str,
        resolver: &ReferenceResolver,
        refs: &mut Vec<String>,
    ) {
        match node.kind() {
            "type_identifier" | "predefined_type" => {
                if let Ok(text) = node.utf8_text(source.as_bytes()) {
                    if let Some(reference) = resolver.type_ref(text) {
                        refs.push(reference);
                    }
                }
                return;
            }
            "generic_type" => {
                // The head only; type arguments stay out of the reference.
                if let Some(base) = node.named_child(0) {
                    self.walk_type_refs(base, source, resolver, refs);
                }
                return;
            }
            "nested_type_identifier" | "member_expression" => {
                if let Ok(text) = node.utf8_text(source.as_bytes()) {
                    if let Some(reference) = resolver.type_ref(text) {
                        refs.push(reference);
                    }
                }
                return;
            }
            _ => {}
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_type_refs(child, source, resolver, refs);
        }
    }

    fn collect_calls(&self, body: Node, source: &str, resolver: &ReferenceResolver) -> Vec<String> {
        let mut calls = Vec::new();
        self.walk_calls(body, source, resolver, &mut calls);
        calls.sort();
        calls.dedup();
        calls
    }

    fn walk_calls(
        &self,
        node: Node,
        source: &str,
        resolver: &ReferenceResolver,
        calls: &mut Vec<String>,
    ) {
        if node.kind() == "call_expression" {
            if let Some(function) = node.child_by_field_name("function") {
                if matches!(function.kind(), "identifier" | "member_expression") {
                    if let Ok(text) = function.utf8_text(source.as_bytes()) {
                        if let Some(reference) = resolver.call_ref(text) {
                            calls.push(reference);
                        }
                    }
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_calls(child, source, resolver, calls);
        }
    }

    /// Parse `source` with the TypeScript grammar and return its import
    /// list and import map. Used by the Svelte parser to resolve template
    /// component tags against script imports.
    pub(crate) fn imports_of(&self, source: &str) -> Result<(Vec<String>, HashMap<String, String>)> {
        let mut parser = make_parser(grammar_for_extension("ts"))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| IndexerError::parse("typescript", "failed to parse script source"))?;
        Ok(self.collect_imports(tree.root_node(), source))
    }

    /// ES imports plus CommonJS `require("...")` calls.
    fn collect_imports(&self, root: Node, source: &str) -> (Vec<String>, HashMap<String, String>) {
        let mut imports = Vec::new();
        let mut map = HashMap::new();

        let mut statements = Vec::new();
        self.collect_nodes_by_kind(root, "import_statement", &mut statements);
        for statement in statements {
            let Some(source_node) = statement.child_by_field_name("source") else {
                continue;
            };
            let Ok(raw) = source_node.utf8_text(source.as_bytes()) else {
                continue;
            };
            let module = raw.trim_matches('"').trim_matches('\'').to_string();
            if module.is_empty() {
                continue;
            }
            imports.push(module.clone());

            let mut clauses = Vec::new();
            self.collect_nodes_by_kind(statement, "import_clause", &mut clauses);
            for clause in clauses {
                let mut cursor = clause.walk();
                for child in clause.children(&mut cursor) {
                    match child.kind() {
                        // Default import binds the module itself.
                        "identifier" => {
                            if let Ok(name) = child.utf8_text(source.as_bytes()) {
                                map.entry(name.to_string())
                                    .or_insert_with(|| module.clone());
                            }
                        }
                        "namespace_import" => {
                            let mut inner = child.walk();
                            for part in child.named_children(&mut inner) {
                                if part.kind() == "identifier" {
                                    if let Ok(name) = part.utf8_text(source.as_bytes()) {
                                        map.entry(name.to_string())
                                            .or_insert_with(|| module.clone());
                                    }
                                }
                            }
                        }
                        "named_imports" => {
                            let mut specs = Vec::new();
                            self.collect_nodes_by_kind(child, "import_specifier", &mut specs);
                            for spec in specs {
                                let name = spec
                                    .child_by_field_name("name")
                                    .and_then(|n| n.utf8_text(source.as_bytes()).ok());
                                let alias = spec
                                    .child_by_field_name("alias")
                                    .and_then(|n| n.utf8_text(source.as_bytes()).ok());
                                if let Some(name) = name {
                                    let bound = alias.unwrap_or(name);
                                    map.entry(bound.to_string())
                                        .or_insert_with(|| format!("{module}.{name}"));
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        // CommonJS requires.
        let mut calls = Vec::new();
        self.collect_nodes_by_kind(root, "call_expression", &mut calls);
        for call in calls {
            let is_require = call
                .child_by_field_name("function")
                .and_then(|f| f.utf8_text(source.as_bytes()).ok())
                .is_some_and(|text| text == "require");
            if !is_require {
                continue;
            }
            let Some(args) = call.child_by_field_name("arguments") else {
                continue;
            };
            let Some(first) = args.named_child(0).filter(|n| n.kind() == "string") else {
                continue;
            };
            if let Ok(raw) = first.utf8_text(source.as_bytes()) {
                let module = raw.trim_matches('"').trim_matches('\'').to_string();
                if !module.is_empty() {
                    imports.push(module);
                }
            }
        }

        (imports, map)
    }

    fn decorator_lines(&self, node: Node, source: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "decorator" {
                if let Ok(text) = child.utf8_text(source.as_bytes()) {
                    lines.push(text.trim().to_string());
                }
            }
        }
        lines
    }

    fn base_entity(
        &self,
        kind: EntityKind,
        name: &str,
        node: Node,
        rel_path: &str,
        language: &str,
        file_id: &str,
        visibility: Visibility,
    ) -> CodeEntity {
        CodeEntity::new(&self.org, &self.project, kind, name, rel_path)
            .with_language(language)
            .with_visibility(visibility)
            .with_line_range(node.start_position().row + 1, node.end_position().row + 1)
            .with_contained_by(file_id)
    }

    /// Doc comment: leading comment block, async marker, and decorators
    /// collapsed into one string.
    fn compose_doc(
        &self,
        node: Node,
        source: &str,
        outer_decorators: &[String],
        own_decorators: &[String],
    ) -> String {
        let mut parts = Vec::new();
        if self.has_async_modifier(node, source) {
            parts.push("async".to_string());
        }
        parts.extend(outer_decorators.iter().cloned());
        parts.extend(own_decorators.iter().cloned());
        let comments = self.doc_for(node, source);
        if !comments.is_empty() {
            parts.push(comments);
        }
        parts.join("\n")
    }

    fn doc_for(&self, node: Node, source: &str) -> String {
        // Exported declarations carry their comment on the export statement.
        let anchor = match node.parent() {
            Some(parent) if parent.kind() == "export_statement" => parent,
            _ => node,
        };
        join_comments(&preceding_comments(anchor, source, &["comment"]))
    }

    fn has_async_modifier(&self, node: Node, source: &str) -> bool {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.is_named() {
                continue;
            }
            if let Ok(text) = child.utf8_text(source.as_bytes()) {
                if text == "async" {
                    return true;
                }
            }
        }
        false
    }

    fn node_field_text(&self, node: Node, field: &str, source: &str) -> Option<String> {
        node.child_by_field_name(field)?
            .utf8_text(source.as_bytes())
            .ok()
            .map(str::to_string)
    }

    fn collect_nodes_by_kind<'a>(&self, node: Node<'a>, kind: &str, out: &mut Vec<Node<'a>>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == kind {
                out.push(child);
            } else {
                self.collect_nodes_by_kind(child, kind, out);
            }
        }
    }
}

fn extension_of(rel_path: &str) -> &str {
    rel_path.rsplit('.').next().unwrap_or("")
}

fn grammar_for_extension(ext: &str) -> Language {
    match ext {
        "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
        "js" | "jsx" | "mjs" | "cjs" => tree_sitter_javascript::LANGUAGE.into(),
        _ => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    }
}

fn make_parser(language: Language) -> Result<Parser> {
    let mut parser = Parser::new();
    parser.set_language(&language).map_err(|e| {
        IndexerError::parse("typescript", format!("failed to set parser language: {e}"))
    })?;
    Ok(parser)
}

#[async_trait]
impl FileParser for TypeScriptParser {
    fn language(&self) -> &'static str {
        match self.dialect {
            TsDialect::TypeScript => "typescript",
            TsDialect::JavaScript => "javascript",
        }
    }

    async fn parse_file(&mut self, ctx: &CancellationToken, path: &Path) -> Result<ParseResult> {
        let bytes = read_source(ctx, self.language(), path).await?;
        let hash = content_hash(&bytes);
        let source = String::from_utf8_lossy(&bytes);
        let rel_path = repo_relative(&self.repo_root, path);
        self.parse_source(&source, &rel_path, &hash)
    }
}

#[cfg(test)]
#[path = "typescript_tests.rs"]
mod tests;
