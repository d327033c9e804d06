use super::*;
use crate::core::entity::EntityKind;

fn parse(source: &str) -> ParseResult {
    let mut parser = JavaParser::new("acme", "demo", Path::new("/repo")).unwrap();
    parser
        .parse_source(source, "src/main/java/App.java", "feedfacefeedface")
        .unwrap()
}

fn entity<'a>(result: &'a ParseResult, name: &str) -> &'a CodeEntity {
    result
        .entities
        .iter()
        .find(|e| e.name == name)
        .unwrap_or_else(|| panic!("entity '{name}' not found"))
}

#[test]
fn test_class_with_package() {
    let source = r#"package com.acme.app;

public class App {
}
"#;
    let result = parse(source);
    assert_eq!(result.package, "com.acme.app");

    let package = &result.entities[0];
    assert_eq!(package.kind, EntityKind::Package);
    assert_eq!(package.name, "com.acme.app");

    let file = result.file_entity().unwrap();
    assert_eq!(file.contained_by, package.id);
    assert_eq!(file.language, "java");

    let app = entity(&result, "App");
    assert_eq!(app.kind, EntityKind::Class);
    assert_eq!(app.visibility, Visibility::Public);
    assert_eq!(app.contained_by, file.id);
}

#[test]
fn test_extends_and_implements() {
    let source = r#"package com.acme;

import com.acme.base.Service;

public class UserService extends Service implements Runnable, AutoCloseable {
}
"#;
    let result = parse(source);
    let svc = entity(&result, "UserService");
    assert_eq!(svc.extends, vec!["external:com.acme.base.Service"]);
    assert_eq!(svc.implements.len(), 2);
    assert_eq!(svc.implements[0], "builtin:Runnable");
}

#[test]
fn test_interface_extends() {
    let source = "public interface Closer extends AutoCloseable, Flushable {}\n";
    let result = parse(source);
    let closer = entity(&result, "Closer");
    assert_eq!(closer.kind, EntityKind::Interface);
    assert_eq!(closer.extends.len(), 2);
}

#[test]
fn test_record_maps_to_struct() {
    let source = "public record Point(int x, int y) {}\n";
    let result = parse(source);
    let point = entity(&result, "Point");
    assert_eq!(point.kind, EntityKind::Struct);
    assert_eq!(point.references, vec!["builtin:int", "builtin:int"]);
}

#[test]
fn test_methods_and_void_returns() {
    let source = r#"public class Calc {
    public int add(int a, int b) {
        return Math.addExact(a, b);
    }

    void reset() {
    }
}
"#;
    let result = parse(source);

    let add = entity(&result, "add");
    assert_eq!(add.kind, EntityKind::Method);
    assert_eq!(add.visibility, Visibility::Public);
    assert_eq!(add.returns, vec!["builtin:int"]);
    assert_eq!(add.parameters, vec!["builtin:int", "builtin:int"]);
    assert_eq!(add.calls, vec!["Math.addExact"]);

    // void methods emit no returns; package-private is private.
    let reset = entity(&result, "reset");
    assert!(reset.returns.is_empty());
    assert_eq!(reset.visibility, Visibility::Private);

    let calc = entity(&result, "Calc");
    assert!(calc.contains.contains(&add.id));
    assert_eq!(add.contained_by, calc.id);
}

#[test]
fn test_constructor_maps_to_method_with_receiver() {
    let source = r#"public class User {
    private final String name;

    public User(String name) {
        this.name = name;
    }
}
"#;
    let result = parse(source);
    let user_class = entity(&result, "User");

    let ctor = result
        .entities
        .iter()
        .find(|e| e.kind == EntityKind::Method && e.name == "User")
        .expect("constructor entity");
    assert_eq!(ctor.receiver, user_class.id);
    assert_eq!(ctor.parameters, vec!["builtin:String"]);
}

#[test]
fn test_fields_one_entity_per_declarator() {
    let source = r#"public class Config {
    public static final int MAX = 10, MIN = 1;
    private List<String> names;
}
"#;
    let result = parse(source);

    let max = entity(&result, "MAX");
    assert_eq!(max.kind, EntityKind::Const);
    assert_eq!(max.references, vec!["builtin:int"]);
    assert!(max.doc_comment.contains("static"));
    assert!(max.doc_comment.contains("final"));

    let min = entity(&result, "MIN");
    assert_eq!(min.kind, EntityKind::Const);

    // Generic parameters strip to the base type.
    let names = entity(&result, "names");
    assert_eq!(names.kind, EntityKind::Var);
    assert_eq!(names.references, vec!["builtin:List"]);
    assert_eq!(names.visibility, Visibility::Private);
}

#[test]
fn test_annotations_collapse_into_doc() {
    let source = r#"public class Api {
    @Override
    @Deprecated
    public synchronized String toString() {
        return "api";
    }
}
"#;
    let result = parse(source);
    let to_string = entity(&result, "toString");
    assert!(to_string.doc_comment.contains("@Override"));
    assert!(to_string.doc_comment.contains("@Deprecated"));
    assert!(to_string.doc_comment.contains("synchronized"));
}

#[test]
fn test_javadoc_preserved() {
    let source = r#"public class Doc {
    /**
     * Adds two numbers.
     */
    public int add(int a, int b) { return a + b; }
}
"#;
    let result = parse(source);
    assert!(entity(&result, "add").doc_comment.contains("Adds two numbers."));
}

#[test]
fn test_protected_is_private() {
    let source = r#"public class Base {
    protected void hook() {}
}
"#;
    let result = parse(source);
    assert_eq!(entity(&result, "hook").visibility, Visibility::Private);
}

#[test]
fn test_nested_class_containment() {
    let source = r#"public class Outer {
    public static class Inner {
        public void ping() {}
    }
}
"#;
    let result = parse(source);
    let outer = entity(&result, "Outer");
    let inner = entity(&result, "Inner");
    let ping = entity(&result, "ping");

    assert_eq!(inner.contained_by, outer.id);
    assert_eq!(ping.contained_by, inner.id);

    let file = result.file_entity().unwrap();
    assert!(file.contains.contains(&outer.id));
    assert!(!file.contains.contains(&inner.id));
}

#[test]
fn test_imports_wildcard_and_static() {
    let source = r#"package com.acme;

import java.util.concurrent.ConcurrentHashMap;
import java.io.*;
import static org.junit.Assert.assertTrue;

public class T {
    ConcurrentHashMap<String, Integer> cache;
}
"#;
    let result = parse(source);
    assert_eq!(
        result.imports,
        vec![
            "java.util.concurrent.ConcurrentHashMap",
            "java.io.*",
            "org.junit.Assert.assertTrue"
        ]
    );

    let cache = entity(&result, "cache");
    assert_eq!(
        cache.references,
        vec!["external:java.util.concurrent.ConcurrentHashMap"]
    );
}

#[test]
fn test_parent_first_ordering() {
    let source = r#"package com.acme;

public class A {
    public void m() {}
}
"#;
    let result = parse(source);
    for (i, e) in result.entities.iter().enumerate() {
        if e.contained_by.is_empty() {
            continue;
        }
        let parent_idx = result
            .entities
            .iter()
            .position(|p| p.id == e.contained_by)
            .expect("parent present");
        assert!(parent_idx < i);
    }
}

#[tokio::test]
async fn test_parse_file_hash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("App.java");
    let source = "public class App {}\n";
    std::fs::write(&path, source).unwrap();

    let mut parser = JavaParser::new("acme", "demo", dir.path()).unwrap();
    let result = parser
        .parse_file(&CancellationToken::new(), &path)
        .await
        .unwrap();
    assert_eq!(result.hash, content_hash(source.as_bytes()));
    assert_eq!(result.path, "App.java");
}
