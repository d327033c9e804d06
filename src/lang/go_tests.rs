use super::*;
use crate::core::entity::EntityKind;

fn parse(source: &str) -> ParseResult {
    let mut parser = GoParser::new("acme", "demo", Path::new("/repo")).unwrap();
    parser.parse_source(source, "main.go", "deadbeefdeadbeef").unwrap()
}

fn entity<'a>(result: &'a ParseResult, name: &str) -> &'a CodeEntity {
    result
        .entities
        .iter()
        .find(|e| e.name == name)
        .unwrap_or_else(|| panic!("entity '{name}' not found"))
}

const USER_SOURCE: &str = r#"package main

// User represents a user.
type User struct {
	Name string
}

// NewUser creates a new user.
func NewUser(name string) *User {
	return &User{Name: name}
}
"#;

#[test]
fn test_struct_and_constructor() {
    let result = parse(USER_SOURCE);

    assert_eq!(result.package, "main");
    assert_eq!(result.entities.len(), 4, "package, file, struct, function");

    let package = &result.entities[0];
    assert_eq!(package.kind, EntityKind::Package);
    assert_eq!(package.id, "acme.semspec.code.package.demo.main-go");

    let file = result.file_entity().unwrap();
    assert_eq!(file.id, "acme.semspec.code.file.demo.main-go");
    assert_eq!(file.hash, "deadbeefdeadbeef");
    assert_eq!(file.contained_by, package.id);

    let user = entity(&result, "User");
    assert_eq!(user.kind, EntityKind::Struct);
    assert_eq!(user.id, "acme.semspec.code.struct.demo.main-go-User");
    assert_eq!(user.doc_comment, "User represents a user.");
    assert_eq!(user.references, vec!["builtin:string"]);
    assert_eq!(user.contained_by, file.id);

    let ctor = entity(&result, "NewUser");
    assert_eq!(ctor.kind, EntityKind::Function);
    assert_eq!(ctor.id, "acme.semspec.code.function.demo.main-go-NewUser");
    assert_eq!(ctor.returns, vec!["acme.semspec.code.type.demo.main-go-User"]);
    assert_eq!(ctor.parameters, vec!["builtin:string"]);

    assert_eq!(file.contains, vec![user.id.clone(), ctor.id.clone()]);
}

#[test]
fn test_parent_first_ordering() {
    let result = parse(USER_SOURCE);
    for (i, e) in result.entities.iter().enumerate() {
        if e.contained_by.is_empty() {
            continue;
        }
        let parent_idx = result
            .entities
            .iter()
            .position(|p| p.id == e.contained_by)
            .expect("parent present");
        assert!(parent_idx < i, "{} must follow its parent", e.name);
    }
}

#[test]
fn test_method_receiver() {
    let source = r#"package main

type Server struct{}

// Run starts the server.
func (s *Server) Run(port int) error {
	return nil
}
"#;
    let result = parse(source);
    let run = entity(&result, "Run");
    assert_eq!(run.kind, EntityKind::Method);
    assert_eq!(run.receiver, "acme.semspec.code.type.demo.main-go-Server");
    assert_eq!(run.parameters, vec!["builtin:int"]);
    assert_eq!(run.returns, vec!["builtin:error"]);
    assert_eq!(run.doc_comment, "Run starts the server.");
}

#[test]
fn test_visibility() {
    let source = "package main\n\nfunc Exported() {}\n\nfunc internal() {}\n";
    let result = parse(source);
    assert_eq!(entity(&result, "Exported").visibility, Visibility::Public);
    assert_eq!(entity(&result, "internal").visibility, Visibility::Private);
}

#[test]
fn test_imports_and_external_refs() {
    let source = r#"package main

import (
	"fmt"
	tu "internal/timeutil"
	_ "embed"
)

func Greet(name string) string {
	return fmt.Sprintf("hello %s at %v", name, tu.Now())
}
"#;
    let result = parse(source);
    assert_eq!(result.imports, vec!["fmt", "internal/timeutil", "embed"]);

    let greet = entity(&result, "Greet");
    assert!(greet.calls.contains(&"external:fmt.Sprintf".to_string()));
    assert!(greet.calls.contains(&"external:internal/timeutil.Now".to_string()));
}

#[test]
fn test_builtin_calls_and_dedup() {
    let source = r#"package main

func Fill() []int {
	out := make([]int, 0)
	out = append(out, len(out))
	out = append(out, cap(out))
	return out
}
"#;
    let result = parse(source);
    let fill = entity(&result, "Fill");
    // Distinct callee names: append appears once despite two call sites.
    assert_eq!(
        fill.calls,
        vec!["builtin:append", "builtin:cap", "builtin:len", "builtin:make"]
    );
    assert_eq!(fill.returns, vec!["builtin:int"]);
}

#[test]
fn test_struct_embeds_and_references() {
    let source = r#"package main

import "sync"

type Registry struct {
	sync.Mutex
	Base
	entries map[string]int
	name    string
}

type Base struct{}
"#;
    let result = parse(source);
    let registry = entity(&result, "Registry");
    assert_eq!(
        registry.embeds,
        vec![
            "external:sync.Mutex",
            "acme.semspec.code.type.demo.main-go-Base"
        ]
    );
    assert_eq!(registry.references, vec!["builtin:map", "builtin:string"]);
}

#[test]
fn test_interface_embeds() {
    let source = r#"package main

import "io"

type ReadCloser interface {
	io.Reader
	Closer
	Close() error
}

type Closer interface{}
"#;
    let result = parse(source);
    let rc = entity(&result, "ReadCloser");
    assert_eq!(rc.kind, EntityKind::Interface);
    assert!(rc.embeds.contains(&"external:io.Reader".to_string()));
    assert!(rc
        .embeds
        .contains(&"acme.semspec.code.type.demo.main-go-Closer".to_string()));
}

#[test]
fn test_type_alias_references() {
    let source = r#"package main

type ID = string

type Handler func(msg []byte) error
"#;
    let result = parse(source);

    let id = entity(&result, "ID");
    assert_eq!(id.kind, EntityKind::Type);
    assert_eq!(id.references, vec!["builtin:string"]);

    let handler = entity(&result, "Handler");
    assert_eq!(handler.kind, EntityKind::Type);
    assert_eq!(handler.references, vec!["builtin:func"]);
}

#[test]
fn test_grouped_consts_and_vars() {
    let source = r#"package main

// Limits for the queue.
const (
	MaxDepth int = 128
	minDepth     = 1
)

var Registry, backup map[string]string
"#;
    let result = parse(source);

    let max = entity(&result, "MaxDepth");
    assert_eq!(max.kind, EntityKind::Const);
    assert_eq!(max.visibility, Visibility::Public);
    assert_eq!(max.references, vec!["builtin:int"]);

    let min = entity(&result, "minDepth");
    assert_eq!(min.kind, EntityKind::Const);
    assert_eq!(min.visibility, Visibility::Private);
    assert!(min.references.is_empty());

    let registry = entity(&result, "Registry");
    assert_eq!(registry.kind, EntityKind::Var);
    assert_eq!(registry.references, vec!["builtin:map"]);
    let backup = entity(&result, "backup");
    assert_eq!(backup.kind, EntityKind::Var);
}

#[test]
fn test_package_doc_on_file_entity() {
    let source = "// Package main does indexing.\npackage main\n";
    let result = parse(source);
    let file = result.file_entity().unwrap();
    assert_eq!(file.doc_comment, "Package main does indexing.");
    assert_eq!(file.start_line, 1);
    assert_eq!(file.end_line, 2);
}

#[test]
fn test_capability_annotation() {
    let source = r#"package main

// Capability: user-indexing
// Tools: nats, sqlite
func IndexUsers() {}
"#;
    let result = parse(source);
    let cap = entity(&result, "IndexUsers").capability.as_ref().unwrap();
    assert_eq!(cap.name, "user-indexing");
    assert_eq!(cap.tools, vec!["nats", "sqlite"]);
}

#[test]
fn test_no_package_clause() {
    let result = parse("func f() {}\n");
    assert!(result.package.is_empty());
    assert_eq!(result.entities[0].kind, EntityKind::File);
}

#[tokio::test]
async fn test_parse_file_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.go");
    std::fs::write(&path, "package main\n").unwrap();

    let mut parser = GoParser::new("acme", "demo", dir.path()).unwrap();
    let ctx = CancellationToken::new();
    ctx.cancel();
    let err = parser.parse_file(&ctx, &path).await.unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_parse_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.go");
    std::fs::write(&path, USER_SOURCE).unwrap();

    let mut parser = GoParser::new("acme", "demo", dir.path()).unwrap();
    let ctx = CancellationToken::new();
    let result = parser.parse_file(&ctx, &path).await.unwrap();

    assert_eq!(result.path, "main.go");
    assert_eq!(result.hash, content_hash(USER_SOURCE.as_bytes()));
    assert_eq!(result.file_entity().unwrap().hash, result.hash);
}

#[tokio::test]
async fn test_parse_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let mut parser = GoParser::new("acme", "demo", dir.path()).unwrap();
    let ctx = CancellationToken::new();
    let err = parser
        .parse_file(&ctx, &dir.path().join("missing.go"))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::Parse { .. }));
}
