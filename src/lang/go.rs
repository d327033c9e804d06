//! Go language parser with tree-sitter integration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tree_sitter::{Node, Parser};

use crate::core::entity::{content_hash, CodeEntity, EntityKind, Visibility};
use crate::core::errors::{IndexerError, Result};
use crate::lang::common::{
    join_comments, line_count, preceding_comments, read_source, repo_relative, FileParser,
    ParseResult, ReferenceResolver,
};

/// Fixed set of Go built-in and intrinsic type names.
pub const GO_BUILTIN_TYPES: &[&str] = &[
    "bool", "byte", "complex64", "complex128", "error", "float32", "float64", "int", "int8",
    "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16", "uint32", "uint64",
    "uintptr", "any", "comparable", "map", "chan", "func", "interface", "struct",
];

/// Fixed set of Go built-in functions.
pub const GO_BUILTIN_FUNCS: &[&str] = &[
    "append", "make", "len", "cap", "copy", "delete", "new", "panic", "recover", "println",
    "print", "real", "imag", "complex", "close", "clear", "min", "max",
];

/// Go-specific parsing and entity extraction.
pub struct GoParser {
    org: String,
    project: String,
    repo_root: PathBuf,
    parser: Parser,
}

impl GoParser {
    /// Create a new Go parser bound to `(org, project, repo_root)`.
    pub fn new(org: &str, project: &str, repo_root: &Path) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| IndexerError::parse("go", format!("failed to set parser language: {e}")))?;

        Ok(Self {
            org: org.to_string(),
            project: project.to_string(),
            repo_root: repo_root.to_path_buf(),
            parser,
        })
    }

    /// Parse Go source text into a [`ParseResult`].
    pub fn parse_source(
        &mut self,
        source: &str,
        rel_path: &str,
        hash: &str,
    ) -> Result<ParseResult> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| IndexerError::parse_in_file("go", "failed to parse source", rel_path))?;
        let root = tree.root_node();

        let (package_name, package_doc) = self.package_clause(root, source);
        let (imports, import_map) = self.collect_imports(root, source);
        let resolver = ReferenceResolver::new(
            &self.org,
            &self.project,
            rel_path,
            &import_map,
            GO_BUILTIN_TYPES,
            GO_BUILTIN_FUNCS,
        );

        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path).to_string();
        let mut file_entity = CodeEntity::new(
            &self.org,
            &self.project,
            EntityKind::File,
            file_name,
            rel_path,
        )
        .with_language("go")
        .with_package(package_name.clone())
        .with_hash(hash)
        .with_line_range(1, line_count(source))
        .with_doc_comment(package_doc);
        file_entity.imports = imports.clone();

        let mut entities = Vec::new();
        if !package_name.is_empty() {
            let mut package_entity = CodeEntity::new(
                &self.org,
                &self.project,
                EntityKind::Package,
                package_name.clone(),
                rel_path,
            )
            .with_language("go")
            .with_package(package_name.clone());
            package_entity.contains.push(file_entity.id.clone());
            file_entity.contained_by = package_entity.id.clone();
            entities.push(package_entity);
        }

        let mut children = Vec::new();
        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            match node.kind() {
                "function_declaration" => {
                    if let Some(entity) =
                        self.extract_function(node, source, rel_path, &package_name, &resolver)?
                    {
                        children.push(entity);
                    }
                }
                "method_declaration" => {
                    if let Some(entity) =
                        self.extract_method(node, source, rel_path, &package_name, &resolver)?
                    {
                        children.push(entity);
                    }
                }
                "type_declaration" => {
                    self.extract_types(node, source, rel_path, &package_name, &resolver, &mut children)?;
                }
                "const_declaration" | "var_declaration" => {
                    self.extract_values(node, source, rel_path, &package_name, &resolver, &mut children)?;
                }
                _ => {}
            }
        }

        for child in &mut children {
            child.contained_by = file_entity.id.clone();
            file_entity.contains.push(child.id.clone());
        }

        entities.push(file_entity);
        entities.extend(children);

        Ok(ParseResult {
            entities,
            imports,
            package: package_name,
            path: rel_path.to_string(),
            hash: hash.to_string(),
        })
    }

    fn package_clause(&self, root: Node, source: &str) -> (String, String) {
        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            if node.kind() == "package_clause" {
                let name = self
                    .find_child_by_kind(node, "package_identifier")
                    .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                    .unwrap_or_default()
                    .to_string();
                let doc = join_comments(&preceding_comments(node, source, &["comment"]));
                return (name, doc);
            }
        }
        (String::new(), String::new())
    }

    /// Import map: alias → import path, or the last path segment when the
    /// spec has no alias. Dot and blank imports contribute a path but no
    /// alias binding.
    fn collect_imports(&self, root: Node, source: &str) -> (Vec<String>, HashMap<String, String>) {
        let mut imports = Vec::new();
        let mut map = HashMap::new();

        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            if node.kind() != "import_declaration" {
                continue;
            }
            let mut specs = Vec::new();
            self.collect_nodes_by_kind(node, "import_spec", &mut specs);
            for spec in specs {
                let Some(path_node) = spec.child_by_field_name("path") else {
                    continue;
                };
                let Ok(raw) = path_node.utf8_text(source.as_bytes()) else {
                    continue;
                };
                let path = raw.trim_matches('"').trim_matches('`').to_string();
                if path.is_empty() {
                    continue;
                }

                let alias = spec
                    .child_by_field_name("name")
                    .filter(|n| n.kind() == "package_identifier")
                    .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                    .map(str::to_string);
                let key = alias
                    .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(&path).to_string());
                map.entry(key).or_insert_with(|| path.clone());
                imports.push(path);
            }
        }

        (imports, map)
    }

    fn extract_function(
        &self,
        node: Node,
        source: &str,
        rel_path: &str,
        package: &str,
        resolver: &ReferenceResolver,
    ) -> Result<Option<CodeEntity>> {
        let Some(name) = self.node_field_text(node, "name", source) else {
            return Ok(None);
        };

        let mut entity = self.signature_entity(
            EntityKind::Function,
            &name,
            node,
            source,
            rel_path,
            package,
            resolver,
        )?;
        entity.doc_comment = join_comments(&preceding_comments(node, source, &["comment"]));
        entity.capability = crate::core::entity::Capability::from_doc_comment(&entity.doc_comment);
        Ok(Some(entity))
    }

    fn extract_method(
        &self,
        node: Node,
        source: &str,
        rel_path: &str,
        package: &str,
        resolver: &ReferenceResolver,
    ) -> Result<Option<CodeEntity>> {
        let Some(name) = self.node_field_text(node, "name", source) else {
            return Ok(None);
        };

        let mut entity = self.signature_entity(
            EntityKind::Method,
            &name,
            node,
            source,
            rel_path,
            package,
            resolver,
        )?;
        entity.doc_comment = join_comments(&preceding_comments(node, source, &["comment"]));
        entity.capability = crate::core::entity::Capability::from_doc_comment(&entity.doc_comment);

        if let Some(receiver) = node.child_by_field_name("receiver") {
            if let Some(receiver_ref) = self.receiver_ref(receiver, source, resolver) {
                entity.receiver = receiver_ref;
            }
        }
        Ok(Some(entity))
    }

    /// Shared extraction for function-shaped declarations: line span,
    /// visibility, parameters, returns, and body calls.
    fn signature_entity(
        &self,
        kind: EntityKind,
        name: &str,
        node: Node,
        source: &str,
        rel_path: &str,
        package: &str,
        resolver: &ReferenceResolver,
    ) -> Result<CodeEntity> {
        let mut entity = CodeEntity::new(&self.org, &self.project, kind, name, rel_path)
            .with_language("go")
            .with_package(package)
            .with_visibility(go_visibility(name))
            .with_line_range(node.start_position().row + 1, node.end_position().row + 1);

        if let Some(params) = node.child_by_field_name("parameters") {
            entity.parameters = self.parameter_refs(params, source, resolver);
        }
        if let Some(result) = node.child_by_field_name("result") {
            entity.returns = self.result_refs(result, source, resolver);
        }
        if let Some(body) = node.child_by_field_name("body") {
            entity.calls = self.collect_calls(body, source, resolver);
        }
        Ok(entity)
    }

    fn extract_types(
        &self,
        decl: Node,
        source: &str,
        rel_path: &str,
        package: &str,
        resolver: &ReferenceResolver,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let decl_doc = join_comments(&preceding_comments(decl, source, &["comment"]));

        let mut cursor = decl.walk();
        for spec in decl.children(&mut cursor) {
            if spec.kind() != "type_spec" && spec.kind() != "type_alias" {
                continue;
            }
            let Some(name) = self.node_field_text(spec, "name", source) else {
                continue;
            };
            let Some(type_node) = spec.child_by_field_name("type") else {
                continue;
            };

            let kind = match type_node.kind() {
                "struct_type" => EntityKind::Struct,
                "interface_type" => EntityKind::Interface,
                _ => EntityKind::Type,
            };

            let mut entity = CodeEntity::new(&self.org, &self.project, kind, &name, rel_path)
                .with_language("go")
                .with_package(package)
                .with_visibility(go_visibility(&name))
                .with_line_range(spec.start_position().row + 1, spec.end_position().row + 1);

            let spec_doc = join_comments(&preceding_comments(spec, source, &["comment"]));
            entity = entity.with_doc_comment(if spec_doc.is_empty() {
                decl_doc.clone()
            } else {
                spec_doc
            });

            match kind {
                EntityKind::Struct => {
                    self.struct_members(type_node, source, resolver, &mut entity);
                }
                EntityKind::Interface => {
                    self.interface_members(type_node, source, resolver, &mut entity);
                }
                EntityKind::Type => {
                    if let Some(reference) = self.resolve_type_node(type_node, source, resolver) {
                        entity.references.push(reference);
                    }
                }
                _ => {}
            }

            out.push(entity);
        }
        Ok(())
    }

    /// Grouped const/var declarations produce one entity per declared
    /// identifier; a declared type becomes a `references` target.
    fn extract_values(
        &self,
        decl: Node,
        source: &str,
        rel_path: &str,
        package: &str,
        resolver: &ReferenceResolver,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let kind = if decl.kind() == "const_declaration" {
            EntityKind::Const
        } else {
            EntityKind::Var
        };
        let decl_doc = join_comments(&preceding_comments(decl, source, &["comment"]));

        let mut specs = Vec::new();
        self.collect_nodes_by_kind(decl, "const_spec", &mut specs);
        self.collect_nodes_by_kind(decl, "var_spec", &mut specs);

        for spec in specs {
            let type_ref = spec
                .child_by_field_name("type")
                .and_then(|t| self.resolve_type_node(t, source, resolver));
            let spec_doc = join_comments(&preceding_comments(spec, source, &["comment"]));

            let mut names = Vec::new();
            let mut cursor = spec.walk();
            for child in spec.children_by_field_name("name", &mut cursor) {
                if let Ok(text) = child.utf8_text(source.as_bytes()) {
                    names.push(text.to_string());
                }
            }

            for name in names {
                let mut entity = CodeEntity::new(&self.org, &self.project, kind, &name, rel_path)
                    .with_language("go")
                    .with_package(package)
                    .with_visibility(go_visibility(&name))
                    .with_line_range(
                        spec.start_position().row + 1,
                        spec.end_position().row + 1,
                    )
                    .with_doc_comment(if spec_doc.is_empty() {
                        decl_doc.clone()
                    } else {
                        spec_doc.clone()
                    });
                if let Some(reference) = &type_ref {
                    entity.references.push(reference.clone());
                }
                out.push(entity);
            }
        }
        Ok(())
    }

    /// Struct members: embedded fields become `embeds`, named fields
    /// contribute their type to `references`.
    fn struct_members(
        &self,
        struct_node: Node,
        source: &str,
        resolver: &ReferenceResolver,
        entity: &mut CodeEntity,
    ) {
        let Some(field_list) = self.find_child_by_kind(struct_node, "field_declaration_list")
        else {
            return;
        };

        let mut cursor = field_list.walk();
        for field in field_list.children(&mut cursor) {
            if field.kind() != "field_declaration" {
                continue;
            }

            let mut names = Vec::new();
            let mut name_cursor = field.walk();
            for name in field.children_by_field_name("name", &mut name_cursor) {
                names.push(name);
            }
            let type_node = field.child_by_field_name("type");

            if names.is_empty() {
                // Embedded field: the type node is the whole declaration.
                let embedded = type_node.or_else(|| field.named_child(0));
                if let Some(reference) =
                    embedded.and_then(|n| self.resolve_type_node(n, source, resolver))
                {
                    entity.embeds.push(reference);
                }
            } else if let Some(reference) =
                type_node.and_then(|n| self.resolve_type_node(n, source, resolver))
            {
                entity.references.push(reference);
            }
        }
    }

    /// Interface members: embedded interfaces become `embeds`; method
    /// elements are not separate entities.
    fn interface_members(
        &self,
        interface_node: Node,
        source: &str,
        resolver: &ReferenceResolver,
        entity: &mut CodeEntity,
    ) {
        let mut cursor = interface_node.walk();
        for child in interface_node.children(&mut cursor) {
            match child.kind() {
                "type_elem" | "constraint_elem" => {
                    let mut inner = child.walk();
                    for type_node in child.named_children(&mut inner) {
                        if let Some(reference) =
                            self.resolve_type_node(type_node, source, resolver)
                        {
                            entity.embeds.push(reference);
                        }
                    }
                }
                "type_identifier" | "qualified_type" => {
                    if let Some(reference) = self.resolve_type_node(child, source, resolver) {
                        entity.embeds.push(reference);
                    }
                }
                _ => {}
            }
        }
    }

    /// One parameter reference per declared name (or per declaration when
    /// the parameter is unnamed).
    fn parameter_refs(
        &self,
        params: Node,
        source: &str,
        resolver: &ReferenceResolver,
    ) -> Vec<String> {
        let mut refs = Vec::new();
        let mut cursor = params.walk();
        for param in params.children(&mut cursor) {
            if param.kind() != "parameter_declaration"
                && param.kind() != "variadic_parameter_declaration"
            {
                continue;
            }
            let Some(reference) = param
                .child_by_field_name("type")
                .and_then(|t| self.resolve_type_node(t, source, resolver))
            else {
                continue;
            };

            let mut names = 0;
            let mut name_cursor = param.walk();
            for _ in param.children_by_field_name("name", &mut name_cursor) {
                names += 1;
            }
            for _ in 0..names.max(1) {
                refs.push(reference.clone());
            }
        }
        refs
    }

    fn result_refs(&self, result: Node, source: &str, resolver: &ReferenceResolver) -> Vec<String> {
        if result.kind() == "parameter_list" {
            let mut refs = Vec::new();
            let mut cursor = result.walk();
            for param in result.children(&mut cursor) {
                if param.kind() != "parameter_declaration"
                    && param.kind() != "variadic_parameter_declaration"
                {
                    continue;
                }
                if let Some(reference) = param
                    .child_by_field_name("type")
                    .and_then(|t| self.resolve_type_node(t, source, resolver))
                {
                    refs.push(reference);
                }
            }
            refs
        } else {
            self.resolve_type_node(result, source, resolver)
                .into_iter()
                .collect()
        }
    }

    /// Walk a function body once, collecting distinct callee names.
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
            if let Some(callee) = node.child_by_field_name("function") {
                if let Ok(text) = callee.utf8_text(source.as_bytes()) {
                    if let Some(reference) = resolver.call_ref(text) {
                        calls.push(reference);
                    }
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_calls(child, source, resolver, calls);
        }
    }

    /// Resolve a type node to a reference ID, unwrapping pointers, slices,
    /// arrays, and generics down to the base named type. Map, channel,
    /// function, interface, and struct types resolve to their intrinsic
    /// builtin head.
    fn resolve_type_node(
        &self,
        node: Node,
        source: &str,
        resolver: &ReferenceResolver,
    ) -> Option<String> {
        match node.kind() {
            "type_identifier" | "qualified_type" => {
                let text = node.utf8_text(source.as_bytes()).ok()?;
                resolver.type_ref(text)
            }
            "pointer_type" | "parenthesized_type" => {
                let inner = node.named_child(0)?;
                self.resolve_type_node(inner, source, resolver)
            }
            "slice_type" | "array_type" => {
                let element = node
                    .child_by_field_name("element")
                    .or_else(|| node.named_child(node.named_child_count().saturating_sub(1)))?;
                self.resolve_type_node(element, source, resolver)
            }
            "generic_type" => {
                let base = node.child_by_field_name("type")?;
                self.resolve_type_node(base, source, resolver)
            }
            "map_type" => resolver.type_ref("map"),
            "channel_type" => resolver.type_ref("chan"),
            "function_type" => resolver.type_ref("func"),
            "interface_type" => resolver.type_ref("interface"),
            "struct_type" => resolver.type_ref("struct"),
            _ => {
                let text = node.utf8_text(source.as_bytes()).ok()?;
                resolver.type_ref(text)
            }
        }
    }

    /// Receiver reference: the receiver type's entity ID, or verbatim text
    /// when the base type cannot be named.
    fn receiver_ref(
        &self,
        receiver: Node,
        source: &str,
        resolver: &ReferenceResolver,
    ) -> Option<String> {
        let mut cursor = receiver.walk();
        for param in receiver.children(&mut cursor) {
            if param.kind() != "parameter_declaration" {
                continue;
            }
            if let Some(type_node) = param.child_by_field_name("type") {
                return self.resolve_type_node(type_node, source, resolver).or_else(|| {
                    type_node
                        .utf8_text(source.as_bytes())
                        .ok()
                        .map(str::to_string)
                });
            }
        }
        None
    }

    fn node_field_text(&self, node: Node, field: &str, source: &str) -> Option<String> {
        node.child_by_field_name(field)?
            .utf8_text(source.as_bytes())
            .ok()
            .map(str::to_string)
    }

    fn find_child_by_kind<'a>(&self, node: Node<'a>, kind: &str) -> Option<Node<'a>> {
        let mut cursor = node.walk();
        let result = node.children(&mut cursor).find(|child| child.kind() == kind);
        result
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

/// Go visibility: exported identifiers start with an uppercase letter.
fn go_visibility(name: &str) -> Visibility {
    if name.chars().next().is_some_and(char::is_uppercase) {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

#[async_trait]
impl FileParser for GoParser {
    fn language(&self) -> &'static str {
        "go"
    }

    async fn parse_file(&mut self, ctx: &CancellationToken, path: &Path) -> Result<ParseResult> {
        let bytes = read_source(ctx, "go", path).await?;
        let hash = content_hash(&bytes);
        let source = String::from_utf8_lossy(&bytes);
        let rel_path = repo_relative(&self.repo_root, path);
        self.parse_source(&source, &rel_path, &hash)
    }
}

#[cfg(test)]
#[path = "go_tests.rs"]
mod tests;
