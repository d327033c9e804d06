//! Java language parser with tree-sitter integration.

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

/// Fixed set of Java primitive and core `java.lang` type names.
pub const JAVA_BUILTIN_TYPES: &[&str] = &[
    "void", "boolean", "byte", "char", "short", "int", "long", "float", "double", "String",
    "Object", "Integer", "Long", "Double", "Float", "Boolean", "Character", "Byte", "Short",
    "Void", "Number", "CharSequence", "Iterable", "Comparable", "Runnable", "Thread",
    "Exception", "RuntimeException", "Error", "Throwable", "List", "Map", "Set", "Collection",
    "Optional", "Stream",
];

/// Java has no free-function built-ins; call references resolve through
/// imports or fall back to local/verbatim forms.
pub const JAVA_BUILTIN_FUNCS: &[&str] = &[];

/// Build directories skipped when walking Java trees.
pub const JAVA_SKIPPED_DIRS: &[&str] = &[
    "target", "build", "bin", "out", "classes", "node_modules", "vendor", ".gradle", ".mvn",
    "test-output", ".idea", ".settings",
];

const COMMENT_KINDS: &[&str] = &["line_comment", "block_comment", "comment"];

/// Access keywords are tracked for visibility; everything else in a
/// modifiers node is collapsed into the doc comment.
const ACCESS_MODIFIERS: &[&str] = &["public", "private", "protected"];

/// Java-specific parsing and entity extraction.
pub struct JavaParser {
    org: String,
    project: String,
    repo_root: PathBuf,
    parser: Parser,
}

impl JavaParser {
    /// Create a new Java parser bound to `(org, project, repo_root)`.
    pub fn new(org: &str, project: &str, repo_root: &Path) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| {
                IndexerError::parse("java", format!("failed to set parser language: {e}"))
            })?;

        Ok(Self {
            org: org.to_string(),
            project: project.to_string(),
            repo_root: repo_root.to_path_buf(),
            parser,
        })
    }

    /// Parse Java source text into a [`ParseResult`].
    pub fn parse_source(
        &mut self,
        source: &str,
        rel_path: &str,
        hash: &str,
    ) -> Result<ParseResult> {
        let tree = self.parser.parse(source, None).ok_or_else(|| {
            IndexerError::parse_in_file("java", "failed to parse source", rel_path)
        })?;
        let root = tree.root_node();

        let package_name = self.package_name(root, source);
        let (imports, import_map) = self.collect_imports(root, source);
        let resolver = ReferenceResolver::new(
            &self.org,
            &self.project,
            rel_path,
            &import_map,
            JAVA_BUILTIN_TYPES,
            JAVA_BUILTIN_FUNCS,
        );

        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path).to_string();
        let mut file_entity = CodeEntity::new(
            &self.org,
            &self.project,
            EntityKind::File,
            file_name,
            rel_path,
        )
        .with_language("java")
        .with_package(package_name.clone())
        .with_hash(hash)
        .with_line_range(1, line_count(source));
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
            .with_language("java")
            .with_package(package_name.clone());
            package_entity.contains.push(file_entity.id.clone());
            file_entity.contained_by = package_entity.id.clone();
            entities.push(package_entity);
        }

        let file_id = file_entity.id.clone();
        let mut children = Vec::new();
        self.extract_scope(
            root,
            source,
            rel_path,
            &package_name,
            &resolver,
            &file_id,
            &mut children,
        )?;

        for child in &children {
            if child.contained_by == file_id {
                file_entity.contains.push(child.id.clone());
            }
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

    fn extract_scope(
        &self,
        scope: Node,
        source: &str,
        rel_path: &str,
        package: &str,
        resolver: &ReferenceResolver,
        parent_id: &str,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let mut cursor = scope.walk();
        for node in scope.children(&mut cursor) {
            match node.kind() {
                "class_declaration" => self.extract_type(
                    node,
                    EntityKind::Class,
                    source,
                    rel_path,
                    package,
                    resolver,
                    parent_id,
                    out,
                )?,
                "interface_declaration" => self.extract_type(
                    node,
                    EntityKind::Interface,
                    source,
                    rel_path,
                    package,
                    resolver,
                    parent_id,
                    out,
                )?,
                "enum_declaration" => self.extract_type(
                    node,
                    EntityKind::Enum,
                    source,
                    rel_path,
                    package,
                    resolver,
                    parent_id,
                    out,
                )?,
                // Records map onto the struct kind.
                "record_declaration" => self.extract_type(
                    node,
                    EntityKind::Struct,
                    source,
                    rel_path,
                    package,
                    resolver,
                    parent_id,
                    out,
                )?,
                _ => {}
            }
        }
        Ok(())
    }

    fn extract_type(
        &self,
        node: Node,
        kind: EntityKind,
        source: &str,
        rel_path: &str,
        package: &str,
        resolver: &ReferenceResolver,
        parent_id: &str,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let Some(name) = self.node_field_text(node, "name", source) else {
            return Ok(());
        };

        let (visibility, modifier_doc) = self.modifiers(node, source);
        let mut entity = CodeEntity::new(&self.org, &self.project, kind, &name, rel_path)
            .with_language("java")
            .with_package(package)
            .with_visibility(visibility)
            .with_line_range(node.start_position().row + 1, node.end_position().row + 1)
            .with_contained_by(parent_id);

        // `extends` for classes, superinterface list for class `implements`,
        // `extends` again for interfaces.
        if let Some(superclass) = node.child_by_field_name("superclass") {
            let mut inner = superclass.walk();
            for type_node in superclass.named_children(&mut inner) {
                if let Some(reference) = self.resolve_type_node(type_node, source, resolver) {
                    entity.extends.push(reference);
                }
            }
        }
        if let Some(interfaces) = node.child_by_field_name("interfaces") {
            for reference in self.type_list_refs(interfaces, source, resolver) {
                entity.implements.push(reference);
            }
        }
        let mut extends_clauses = Vec::new();
        self.collect_direct_children(node, "extends_interfaces", &mut extends_clauses);
        for clause in extends_clauses {
            for reference in self.type_list_refs(clause, source, resolver) {
                entity.extends.push(reference);
            }
        }

        // Record components contribute type references.
        if kind == EntityKind::Struct {
            if let Some(params) = node.child_by_field_name("parameters") {
                let mut inner = params.walk();
                for param in params.named_children(&mut inner) {
                    if param.kind() != "formal_parameter" {
                        continue;
                    }
                    if let Some(reference) = param
                        .child_by_field_name("type")
                        .and_then(|t| self.resolve_type_node(t, source, resolver))
                    {
                        entity.references.push(reference);
                    }
                }
            }
        }

        entity = entity.with_doc_comment(self.compose_doc(node, source, &modifier_doc));

        let type_id = entity.id.clone();
        let class_name = name.clone();
        let mut members = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            self.extract_members(
                body,
                source,
                rel_path,
                package,
                resolver,
                &type_id,
                &class_name,
                &mut members,
            )?;
        }

        for member in &members {
            if member.contained_by == type_id {
                entity.contains.push(member.id.clone());
            }
        }
        out.push(entity);
        out.extend(members);
        Ok(())
    }

    fn extract_members(
        &self,
        body: Node,
        source: &str,
        rel_path: &str,
        package: &str,
        resolver: &ReferenceResolver,
        type_id: &str,
        class_name: &str,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            match member.kind() {
                "method_declaration" => {
                    if let Some(entity) = self.extract_method(
                        member, source, rel_path, package, resolver, type_id, None,
                    )? {
                        out.push(entity);
                    }
                }
                "constructor_declaration" => {
                    if let Some(entity) = self.extract_method(
                        member,
                        source,
                        rel_path,
                        package,
                        resolver,
                        type_id,
                        Some(class_name),
                    )? {
                        out.push(entity);
                    }
                }
                "field_declaration" => {
                    self.extract_fields(
                        member, source, rel_path, package, resolver, type_id, out,
                    )?;
                }
                // Nested types.
                "class_declaration" => self.extract_type(
                    member,
                    EntityKind::Class,
                    source,
                    rel_path,
                    package,
                    resolver,
                    type_id,
                    out,
                )?,
                "interface_declaration" => self.extract_type(
                    member,
                    EntityKind::Interface,
                    source,
                    rel_path,
                    package,
                    resolver,
                    type_id,
                    out,
                )?,
                "enum_declaration" => self.extract_type(
                    member,
                    EntityKind::Enum,
                    source,
                    rel_path,
                    package,
                    resolver,
                    type_id,
                    out,
                )?,
                "record_declaration" => self.extract_type(
                    member,
                    EntityKind::Struct,
                    source,
                    rel_path,
                    package,
                    resolver,
                    type_id,
                    out,
                )?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Methods and constructors. Constructors map to the method kind with
    /// the class name and the enclosing class as receiver; `void` emits no
    /// return reference.
    fn extract_method(
        &self,
        node: Node,
        source: &str,
        rel_path: &str,
        package: &str,
        resolver: &ReferenceResolver,
        type_id: &str,
        constructor_of: Option<&str>,
    ) -> Result<Option<CodeEntity>> {
        let name = match constructor_of {
            Some(class_name) => class_name.to_string(),
            None => match self.node_field_text(node, "name", source) {
                Some(name) => name,
                None => return Ok(None),
            },
        };

        let (visibility, modifier_doc) = self.modifiers(node, source);
        let mut entity = CodeEntity::new(
            &self.org,
            &self.project,
            EntityKind::Method,
            &name,
            rel_path,
        )
        .with_language("java")
        .with_package(package)
        .with_visibility(visibility)
        .with_line_range(node.start_position().row + 1, node.end_position().row + 1)
        .with_contained_by(type_id);

        if constructor_of.is_some() {
            entity.receiver = type_id.to_string();
        }

        if let Some(return_type) = node.child_by_field_name("type") {
            if return_type.kind() != "void_type" {
                if let Some(reference) = self.resolve_type_node(return_type, source, resolver) {
                    entity.returns.push(reference);
                }
            }
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut inner = params.walk();
            for param in params.named_children(&mut inner) {
                if param.kind() != "formal_parameter" && param.kind() != "spread_parameter" {
                    continue;
                }
                if let Some(reference) = param
                    .child_by_field_name("type")
                    .or_else(|| param.named_child(0))
                    .and_then(|t| self.resolve_type_node(t, source, resolver))
                {
                    entity.parameters.push(reference);
                }
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            entity.calls = self.collect_calls(body, source, resolver);
        }

        entity = entity.with_doc_comment(self.compose_doc(node, source, &modifier_doc));
        Ok(Some(entity))
    }

    /// One entity per field declarator; `static final` fields are
    /// constants, the declared type contributes a reference.
    fn extract_fields(
        &self,
        node: Node,
        source: &str,
        rel_path: &str,
        package: &str,
        resolver: &ReferenceResolver,
        type_id: &str,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let (visibility, modifier_doc) = self.modifiers(node, source);
        let kind = if modifier_doc.contains("static") && modifier_doc.contains("final") {
            EntityKind::Const
        } else {
            EntityKind::Var
        };
        let type_ref = node
            .child_by_field_name("type")
            .and_then(|t| self.resolve_type_node(t, source, resolver));
        let doc = self.compose_doc(node, source, &modifier_doc);

        let mut cursor = node.walk();
        for declarator in node.children_by_field_name("declarator", &mut cursor) {
            let Some(name) = self.node_field_text(declarator, "name", source) else {
                continue;
            };
            let mut entity = CodeEntity::new(&self.org, &self.project, kind, &name, rel_path)
                .with_language("java")
                .with_package(package)
                .with_visibility(visibility)
                .with_line_range(node.start_position().row + 1, node.end_position().row + 1)
                .with_contained_by(type_id)
                .with_doc_comment(doc.clone());
            if let Some(reference) = &type_ref {
                entity.references.push(reference.clone());
            }
            out.push(entity);
        }
        Ok(())
    }

    /// Visibility from the access keyword plus the collapsed
    /// annotation/non-access-modifier line. `public` is public; protected
    /// and package-private collapse to private.
    fn modifiers(&self, node: Node, source: &str) -> (Visibility, String) {
        let mut visibility = Visibility::Private;
        let mut collapsed = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "modifiers" {
                continue;
            }
            let mut inner = child.walk();
            for modifier in child.children(&mut inner) {
                let Ok(text) = modifier.utf8_text(source.as_bytes()) else {
                    continue;
                };
                if text == "public" {
                    visibility = Visibility::Public;
                }
                if !ACCESS_MODIFIERS.contains(&text) {
                    collapsed.push(text.trim().to_string());
                }
            }
        }

        (visibility, collapsed.join(" "))
    }

    fn compose_doc(&self, node: Node, source: &str, modifier_doc: &str) -> String {
        let mut parts = Vec::new();
        if !modifier_doc.is_empty() {
            parts.push(modifier_doc.to_string());
        }
        let comments = join_comments(&preceding_comments(node, source, COMMENT_KINDS));
        if !comments.is_empty() {
            parts.push(comments);
        }
        parts.join("\n")
    }

    fn type_list_refs(
        &self,
        clause: Node,
        source: &str,
        resolver: &ReferenceResolver,
    ) -> Vec<String> {
        let mut refs = Vec::new();
        let mut lists = Vec::new();
        self.collect_direct_children(clause, "type_list", &mut lists);
        let targets = if lists.is_empty() { vec![clause] } else { lists };
        for list in targets {
            let mut cursor = list.walk();
            for type_node in list.named_children(&mut cursor) {
                if let Some(reference) = self.resolve_type_node(type_node, source, resolver) {
                    refs.push(reference);
                }
            }
        }
        refs
    }

    /// Resolve a type node to a reference ID; generic parameters strip to
    /// the base type, arrays unwrap to their element.
    fn resolve_type_node(
        &self,
        node: Node,
        source: &str,
        resolver: &ReferenceResolver,
    ) -> Option<String> {
        match node.kind() {
            "void_type" => None,
            "array_type" => {
                let element = node.child_by_field_name("element")?;
                self.resolve_type_node(element, source, resolver)
            }
            "generic_type" => {
                let base = node.named_child(0)?;
                self.resolve_type_node(base, source, resolver)
            }
            _ => {
                let text = node.utf8_text(source.as_bytes()).ok()?;
                resolver.type_ref(text)
            }
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
        if node.kind() == "method_invocation" {
            let name = node
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(source.as_bytes()).ok());
            let object = node
                .child_by_field_name("object")
                .and_then(|n| n.utf8_text(source.as_bytes()).ok());
            if let Some(name) = name {
                let symbol = match object {
                    Some(object) => format!("{object}.{name}"),
                    None => name.to_string(),
                };
                if let Some(reference) = resolver.call_ref(&symbol) {
                    calls.push(reference);
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk_calls(child, source, resolver, calls);
        }
    }

    fn package_name(&self, root: Node, source: &str) -> String {
        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            if node.kind() == "package_declaration" {
                let mut inner = node.walk();
                for child in node.named_children(&mut inner) {
                    if matches!(child.kind(), "scoped_identifier" | "identifier") {
                        if let Ok(text) = child.utf8_text(source.as_bytes()) {
                            return text.to_string();
                        }
                    }
                }
            }
        }
        String::new()
    }

    /// Import map: simple-name → fully qualified import path. Wildcard
    /// imports contribute a path but no binding.
    fn collect_imports(&self, root: Node, source: &str) -> (Vec<String>, HashMap<String, String>) {
        let mut imports = Vec::new();
        let mut map = HashMap::new();

        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            if node.kind() != "import_declaration" {
                continue;
            }
            let mut path = String::new();
            let mut wildcard = false;
            let mut inner = node.walk();
            for child in node.children(&mut inner) {
                match child.kind() {
                    "scoped_identifier" | "identifier" => {
                        if let Ok(text) = child.utf8_text(source.as_bytes()) {
                            path = text.to_string();
                        }
                    }
                    "asterisk" => wildcard = true,
                    _ => {}
                }
            }
            if path.is_empty() {
                continue;
            }
            if wildcard {
                path.push_str(".*");
            }
            imports.push(path.clone());
            if !path.ends_with(".*") {
                if let Some(simple) = path.rsplit('.').next() {
                    map.entry(simple.to_string()).or_insert_with(|| path.clone());
                }
            }
        }

        (imports, map)
    }

    fn node_field_text(&self, node: Node, field: &str, source: &str) -> Option<String> {
        node.child_by_field_name(field)?
            .utf8_text(source.as_bytes())
            .ok()
            .map(str::to_string)
    }

    fn collect_direct_children<'a>(&self, node: Node<'a>, kind: &str, out: &mut Vec<Node<'a>>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == kind {
                out.push(child);
            }
        }
    }
}

#[async_trait]
impl FileParser for JavaParser {
    fn language(&self) -> &'static str {
        "java"
    }

    async fn parse_file(&mut self, ctx: &CancellationToken, path: &Path) -> Result<ParseResult> {
        let bytes = read_source(ctx, "java", path).await?;
        let hash = content_hash(&bytes);
        let source = String::from_utf8_lossy(&bytes);
        let rel_path = repo_relative(&self.repo_root, path);
        self.parse_source(&source, &rel_path, &hash)
    }
}

#[cfg(test)]
#[path = "java_tests.rs"]
mod tests;
