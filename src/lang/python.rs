//! Python language parser with tree-sitter integration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tree_sitter::{Node, Parser};

use crate::core::entity::{content_hash, CodeEntity, EntityKind, Visibility};
use crate::core::errors::{IndexerError, Result};
use crate::lang::common::{
    line_count, read_source, repo_relative, FileParser, ParseResult, ReferenceResolver,
};

/// Fixed set of Python built-in types, typing generics, and common ABCs.
pub const PYTHON_BUILTIN_TYPES: &[&str] = &[
    "int", "float", "str", "bool", "bytes", "list", "dict", "set", "tuple", "frozenset",
    "complex", "object", "type", "None", "Any", "Optional", "Union", "List", "Dict", "Set",
    "Tuple", "FrozenSet", "Callable", "Iterator", "Iterable", "Sequence", "Mapping",
    "MutableMapping", "MutableSequence", "Awaitable", "Coroutine", "Generator", "AsyncIterator",
    "AsyncIterable", "Type", "Self", "ClassVar", "Final", "Literal", "Protocol",
];

/// Tooling and environment directories skipped when walking Python trees.
pub const PYTHON_SKIPPED_DIRS: &[&str] = &[
    "venv", ".venv", "env", ".env", "__pycache__", ".pytest_cache", "node_modules", "vendor",
    "dist", "build", ".tox", ".eggs", "site-packages", ".mypy_cache",
];

/// Fixed set of Python built-in functions.
pub const PYTHON_BUILTIN_FUNCS: &[&str] = &[
    "print", "len", "range", "enumerate", "zip", "map", "filter", "sorted", "reversed", "sum",
    "min", "max", "abs", "round", "open", "isinstance", "issubclass", "getattr", "setattr",
    "hasattr", "repr", "str", "int", "float", "bool", "list", "dict", "set", "tuple", "iter",
    "next", "super", "id", "hash", "type", "vars", "dir", "any", "all",
];

/// Python-specific parsing and entity extraction.
pub struct PythonParser {
    org: String,
    project: String,
    repo_root: PathBuf,
    parser: Parser,
}

impl PythonParser {
    /// Create a new Python parser bound to `(org, project, repo_root)`.
    pub fn new(org: &str, project: &str, repo_root: &Path) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| {
                IndexerError::parse("python", format!("failed to set parser language: {e}"))
            })?;

        Ok(Self {
            org: org.to_string(),
            project: project.to_string(),
            repo_root: repo_root.to_path_buf(),
            parser,
        })
    }

    /// Parse Python source text into a [`ParseResult`].
    pub fn parse_source(
        &mut self,
        source: &str,
        rel_path: &str,
        hash: &str,
    ) -> Result<ParseResult> {
        let tree = self.parser.parse(source, None).ok_or_else(|| {
            IndexerError::parse_in_file("python", "failed to parse source", rel_path)
        })?;
        let root = tree.root_node();

        let module = module_name(rel_path);
        let (imports, import_map) = self.collect_imports(root, source);
        let resolver = ReferenceResolver::new(
            &self.org,
            &self.project,
            rel_path,
            &import_map,
            PYTHON_BUILTIN_TYPES,
            PYTHON_BUILTIN_FUNCS,
        );

        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path).to_string();
        let mut file_entity = CodeEntity::new(
            &self.org,
            &self.project,
            EntityKind::File,
            file_name,
            rel_path,
        )
        .with_language("python")
        .with_package(module.clone())
        .with_hash(hash)
        .with_line_range(1, line_count(source))
        .with_doc_comment(docstring(root, source).unwrap_or_default());
        file_entity.imports = imports.clone();

        let mut entities = Vec::new();
        if !module.is_empty() {
            let mut package_entity = CodeEntity::new(
                &self.org,
                &self.project,
                EntityKind::Package,
                module.clone(),
                rel_path,
            )
            .with_language("python")
            .with_package(module.clone());
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
            &module,
            &resolver,
            &file_id,
            None,
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
            package: module,
            path: rel_path.to_string(),
            hash: hash.to_string(),
        })
    }

    /// Extract definitions from a module or class body. `enclosing_class`
    /// carries the class entity ID so methods can set their receiver.
    fn extract_scope(
        &self,
        scope: Node,
        source: &str,
        rel_path: &str,
        module: &str,
        resolver: &ReferenceResolver,
        parent_id: &str,
        enclosing_class: Option<&str>,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let mut cursor = scope.walk();
        for node in scope.children(&mut cursor) {
            match node.kind() {
                "class_definition" => {
                    self.extract_class(
                        node, node, &[], source, rel_path, module, resolver, parent_id, out,
                    )?;
                }
                "function_definition" => {
                    self.extract_function(
                        node,
                        node,
                        &[],
                        source,
                        rel_path,
                        module,
                        resolver,
                        parent_id,
                        enclosing_class,
                        out,
                    )?;
                }
                // The decorated_definition node spans the decorators, so it
                // provides the entity's line range.
                "decorated_definition" => {
                    let decorators = self.decorator_lines(node, source);
                    if let Some(definition) = node.child_by_field_name("definition") {
                        match definition.kind() {
                            "class_definition" => self.extract_class(
                                definition,
                                node,
                                &decorators,
                                source,
                                rel_path,
                                module,
                                resolver,
                                parent_id,
                                out,
                            )?,
                            "function_definition" => self.extract_function(
                                definition,
                                node,
                                &decorators,
                                source,
                                rel_path,
                                module,
                                resolver,
                                parent_id,
                                enclosing_class,
                                out,
                            )?,
                            _ => {}
                        }
                    }
                }
                // Module-level assignments only; class attributes stay
                // inside their class's source span.
                "expression_statement" if enclosing_class.is_none() => {
                    self.extract_assignment(node, source, rel_path, module, resolver, parent_id, out)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn extract_class(
        &self,
        node: Node,
        span: Node,
        decorators: &[String],
        source: &str,
        rel_path: &str,
        module: &str,
        resolver: &ReferenceResolver,
        parent_id: &str,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let Some(name) = self.node_field_text(node, "name", source) else {
            return Ok(());
        };

        // A @dataclass decorator turns the class into a struct.
        let kind = if decorators.iter().any(|d| d.contains("dataclass")) {
            EntityKind::Struct
        } else {
            EntityKind::Class
        };

        let mut entity = CodeEntity::new(&self.org, &self.project, kind, &name, rel_path)
            .with_language("python")
            .with_package(module)
            .with_visibility(python_visibility(&name))
            .with_line_range(span.start_position().row + 1, span.end_position().row + 1)
            .with_contained_by(parent_id);

        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut args = superclasses.walk();
            for base in superclasses.named_children(&mut args) {
                if matches!(base.kind(), "identifier" | "attribute") {
                    if let Ok(text) = base.utf8_text(source.as_bytes()) {
                        if let Some(reference) = resolver.type_ref(text) {
                            entity.extends.push(reference);
                        }
                    }
                }
            }
        }

        let body_doc = node.child_by_field_name("body").and_then(|b| docstring(b, source));
        entity = entity.with_doc_comment(compose_doc(false, decorators, body_doc));

        let class_id = entity.id.clone();
        out.push(entity);

        if let Some(body) = node.child_by_field_name("body") {
            self.extract_scope(
                body,
                source,
                rel_path,
                module,
                resolver,
                &class_id,
                Some(&class_id),
                out,
            )?;
        }
        Ok(())
    }

    fn extract_function(
        &self,
        node: Node,
        span: Node,
        decorators: &[String],
        source: &str,
        rel_path: &str,
        module: &str,
        resolver: &ReferenceResolver,
        parent_id: &str,
        enclosing_class: Option<&str>,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let Some(name) = self.node_field_text(node, "name", source) else {
            return Ok(());
        };

        let kind = if enclosing_class.is_some() {
            EntityKind::Method
        } else {
            EntityKind::Function
        };
        let is_async = node
            .child(0)
            .is_some_and(|first| first.kind() == "async");

        let mut entity = CodeEntity::new(&self.org, &self.project, kind, &name, rel_path)
            .with_language("python")
            .with_package(module)
            .with_visibility(python_visibility(&name))
            .with_line_range(span.start_position().row + 1, span.end_position().row + 1)
            .with_contained_by(parent_id);

        if let Some(class_id) = enclosing_class {
            entity.receiver = class_id.to_string();
        }

        if let Some(params) = node.child_by_field_name("parameters") {
            entity.parameters = self.parameter_refs(params, source, resolver);
        }
        if let Some(return_type) = node.child_by_field_name("return_type") {
            if let Some(reference) = self.annotation_ref(return_type, source, resolver) {
                entity.returns.push(reference);
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            entity.calls = self.collect_calls(body, source, resolver);
        }

        let body_doc = node.child_by_field_name("body").and_then(|b| docstring(b, source));
        entity = entity.with_doc_comment(compose_doc(is_async, decorators, body_doc));

        out.push(entity);
        Ok(())
    }

    /// Module-level assignments become constants (all-caps identifiers) or
    /// variables; a type annotation contributes a reference.
    fn extract_assignment(
        &self,
        statement: Node,
        source: &str,
        rel_path: &str,
        module: &str,
        resolver: &ReferenceResolver,
        parent_id: &str,
        out: &mut Vec<CodeEntity>,
    ) -> Result<()> {
        let Some(assignment) = statement.named_child(0).filter(|n| n.kind() == "assignment")
        else {
            return Ok(());
        };
        let Some(left) = assignment.child_by_field_name("left") else {
            return Ok(());
        };
        if left.kind() != "identifier" {
            return Ok(());
        }
        let Ok(name) = left.utf8_text(source.as_bytes()) else {
            return Ok(());
        };

        let kind = if is_const_name(name) {
            EntityKind::Const
        } else {
            EntityKind::Var
        };
        let mut entity = CodeEntity::new(&self.org, &self.project, kind, name, rel_path)
            .with_language("python")
            .with_package(module)
            .with_visibility(python_visibility(name))
            .with_line_range(
                assignment.start_position().row + 1,
                assignment.end_position().row + 1,
            )
            .with_contained_by(parent_id);

        if let Some(annotation) = assignment.child_by_field_name("type") {
            if let Some(reference) = self.annotation_ref(annotation, source, resolver) {
                entity.references.push(reference);
            }
        }

        out.push(entity);
        Ok(())
    }

    fn decorator_lines(&self, decorated: Node, source: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let mut cursor = decorated.walk();
        for child in decorated.children(&mut cursor) {
            if child.kind() == "decorator" {
                if let Ok(text) = child.utf8_text(source.as_bytes()) {
                    lines.push(text.trim().to_string());
                }
            }
        }
        lines
    }

    /// Typed parameters contribute one reference each; bare `self`/`cls`
    /// and untyped names contribute nothing.
    fn parameter_refs(
        &self,
        params: Node,
        source: &str,
        resolver: &ReferenceResolver,
    ) -> Vec<String> {
        let mut refs = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let annotation = match param.kind() {
                "typed_parameter" | "typed_default_parameter" => param.child_by_field_name("type"),
                _ => None,
            };
            if let Some(reference) =
                annotation.and_then(|a| self.annotation_ref(a, source, resolver))
            {
                refs.push(reference);
            }
        }
        refs
    }

    /// Resolve a type annotation to a reference ID, unwrapping subscripted
    /// generics to their head (`list[int]` → `builtin:list`).
    fn annotation_ref(
        &self,
        node: Node,
        source: &str,
        resolver: &ReferenceResolver,
    ) -> Option<String> {
        let target = match node.kind() {
            "type" => node.named_child(0)?,
            _ => node,
        };
        match target.kind() {
            "subscript" => {
                let value = target.child_by_field_name("value")?;
                self.annotation_ref(value, source, resolver)
            }
            "identifier" | "attribute" | "string" => {
                let text = target.utf8_text(source.as_bytes()).ok()?;
                resolver.type_ref(text.trim_matches('"').trim_matches('\''))
            }
            "none" => resolver.type_ref("None"),
            "generic_type" => {
                let base = target.named_child(0)?;
                self.annotation_ref(base, source, resolver)
            }
            _ => {
                let text = target.utf8_text(source.as_bytes()).ok()?;
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
        if node.kind() == "call" {
            if let Some(function) = node.child_by_field_name("function") {
                if matches!(function.kind(), "identifier" | "attribute") {
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

    /// Import map entries:
    /// - `import a.b` binds `a` → `a`
    /// - `import a.b as c` binds `c` → `a.b`
    /// - `from x import C` binds `C` → `x.C`
    /// - `from x import C as D` binds `D` → `x.C`
    fn collect_imports(&self, root: Node, source: &str) -> (Vec<String>, HashMap<String, String>) {
        let mut imports = Vec::new();
        let mut map = HashMap::new();

        let mut cursor = root.walk();
        for node in root.children(&mut cursor) {
            match node.kind() {
                "import_statement" => {
                    let mut inner = node.walk();
                    for child in node.named_children(&mut inner) {
                        match child.kind() {
                            "dotted_name" => {
                                if let Ok(path) = child.utf8_text(source.as_bytes()) {
                                    let head = path.split('.').next().unwrap_or(path);
                                    map.entry(head.to_string())
                                        .or_insert_with(|| head.to_string());
                                    imports.push(path.to_string());
                                }
                            }
                            "aliased_import" => {
                                let path = child
                                    .child_by_field_name("name")
                                    .and_then(|n| n.utf8_text(source.as_bytes()).ok());
                                let alias = child
                                    .child_by_field_name("alias")
                                    .and_then(|n| n.utf8_text(source.as_bytes()).ok());
                                if let (Some(path), Some(alias)) = (path, alias) {
                                    map.entry(alias.to_string())
                                        .or_insert_with(|| path.to_string());
                                    imports.push(path.to_string());
                                }
                            }
                            _ => {}
                        }
                    }
                }
                "import_from_statement" => {
                    let Some(module) = node
                        .child_by_field_name("module_name")
                        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                    else {
                        continue;
                    };
                    imports.push(module.to_string());

                    let mut inner = node.walk();
                    for name in node.children_by_field_name("name", &mut inner) {
                        match name.kind() {
                            "dotted_name" => {
                                if let Ok(symbol) = name.utf8_text(source.as_bytes()) {
                                    map.entry(symbol.to_string())
                                        .or_insert_with(|| format!("{module}.{symbol}"));
                                }
                            }
                            "aliased_import" => {
                                let symbol = name
                                    .child_by_field_name("name")
                                    .and_then(|n| n.utf8_text(source.as_bytes()).ok());
                                let alias = name
                                    .child_by_field_name("alias")
                                    .and_then(|n| n.utf8_text(source.as_bytes()).ok());
                                if let (Some(symbol), Some(alias)) = (symbol, alias) {
                                    map.entry(alias.to_string())
                                        .or_insert_with(|| format!("{module}.{symbol}"));
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
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
}

/// Module name from the repo-relative path: `/` becomes `.`, the extension
/// drops, and a trailing `.__init__` is stripped.
pub fn module_name(rel_path: &str) -> String {
    let without_ext = rel_path
        .strip_suffix(".py")
        .or_else(|| rel_path.strip_suffix(".pyi"))
        .unwrap_or(rel_path);
    let dotted = without_ext.replace('/', ".");
    dotted
        .strip_suffix(".__init__")
        .unwrap_or(&dotted)
        .to_string()
}

/// The module or body docstring: a first-statement string literal.
fn docstring(scope: Node, source: &str) -> Option<String> {
    let first = scope.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0).filter(|n| n.kind() == "string")?;
    let text = string.utf8_text(source.as_bytes()).ok()?;
    let trimmed = text
        .trim_start_matches("r\"\"\"")
        .trim_start_matches("\"\"\"")
        .trim_start_matches("'''")
        .trim_end_matches("\"\"\"")
        .trim_end_matches("'''")
        .trim();
    Some(trimmed.to_string())
}

fn compose_doc(is_async: bool, decorators: &[String], body_doc: Option<String>) -> String {
    let mut parts = Vec::new();
    if is_async {
        parts.push("async".to_string());
    }
    parts.extend(decorators.iter().cloned());
    if let Some(doc) = body_doc {
        if !doc.is_empty() {
            parts.push(doc);
        }
    }
    parts.join("\n")
}

/// Leading underscore marks a private symbol.
fn python_visibility(name: &str) -> Visibility {
    if name.starts_with('_') {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

/// Module-level all-caps identifiers are constants.
fn is_const_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && !name.chars().any(|c| c.is_ascii_lowercase())
}

#[async_trait]
impl FileParser for PythonParser {
    fn language(&self) -> &'static str {
        "python"
    }

    async fn parse_file(&mut self, ctx: &CancellationToken, path: &Path) -> Result<ParseResult> {
        let bytes = read_source(ctx, "python", path).await?;
        let hash = content_hash(&bytes);
        let source = String::from_utf8_lossy(&bytes);
        let rel_path = repo_relative(&self.repo_root, path);
        self.parse_source(&source, &rel_path, &hash)
    }
}

#[cfg(test)]
#[path = "python_tests.rs"]
mod tests;
