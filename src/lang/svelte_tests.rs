use super::*;
use crate::core::entity::EntityKind;

fn parse(source: &str) -> ParseResult {
    parse_at(source, "Card.svelte")
}

fn parse_at(source: &str, rel_path: &str) -> ParseResult {
    let mut parser = SvelteParser::new("acme", "demo", Path::new("/repo")).unwrap();
    parser.parse_source(source, rel_path, "abad1deaabad1dea").unwrap()
}

fn entity<'a>(result: &'a ParseResult, name: &str) -> &'a CodeEntity {
    result
        .entities
        .iter()
        .find(|e| e.name == name)
        .unwrap_or_else(|| panic!("entity '{name}' not found"))
}

const CARD_SOURCE: &str = r#"<script lang="ts">
    import Button from "./Button.svelte";

    let { title, onClose = () => {} } = $props();
    let expanded = $state(false);
    let label = $derived(expanded ? "collapse" : "expand");

    $effect(() => {
        console.log(title);
    });

    export function reset(): void {
        expanded = false;
    }
</script>

<div class="card">
    <h2>{title}</h2>
    <Button onclick={onClose}>{label}</Button>
    <Icon name="close" />
</div>
"#;

#[test]
fn test_component_entity() {
    let result = parse(CARD_SOURCE);

    let file = result.file_entity().unwrap();
    assert_eq!(file.language, "typescript");
    assert_eq!(file.framework, "svelte");

    let card = entity(&result, "Card");
    assert_eq!(card.kind, EntityKind::Component);
    assert_eq!(card.framework, "svelte");
    assert_eq!(card.contained_by, file.id);
    assert!(file.contains.contains(&card.id));
}

#[test]
fn test_rune_metadata_in_doc_comment() {
    let result = parse(CARD_SOURCE);
    let card = entity(&result, "Card");
    assert_eq!(
        card.doc_comment,
        "Props: title, onClose; State: expanded; Derived: label; Effects: 1"
    );
}

#[test]
fn test_template_component_references() {
    let result = parse(CARD_SOURCE);
    let card = entity(&result, "Card");

    // Imported components resolve through the script import map; unknown
    // PascalCase tags resolve to local type references.
    assert!(card
        .references
        .contains(&"external:./Button.svelte".to_string()));
    assert!(card
        .references
        .contains(&"acme.semspec.code.type.demo.Card-svelte-Icon".to_string()));
    // Lowercase HTML tags never surface.
    assert!(!card.references.iter().any(|r| r.contains("div")));
}

#[test]
fn test_script_entities_harvested() {
    let result = parse(CARD_SOURCE);

    let reset = entity(&result, "reset");
    assert_eq!(reset.kind, EntityKind::Function);
    assert_eq!(reset.framework, "svelte");
    assert_eq!(reset.language, "typescript");
    // Line numbers are offset into the .svelte file.
    assert!(reset.start_line >= 12, "start_line = {}", reset.start_line);

    let expanded = entity(&result, "expanded");
    assert_eq!(expanded.kind, EntityKind::Var);
    assert_eq!(expanded.framework, "svelte");
}

#[test]
fn test_javascript_lang_attribute() {
    let source = r#"<script lang="js">
    let count = $state(0);
</script>

<p>{count}</p>
"#;
    let result = parse_at(source, "Counter.svelte");
    let file = result.file_entity().unwrap();
    assert_eq!(file.language, "javascript");

    let counter = entity(&result, "Counter");
    assert_eq!(counter.language, "javascript");
    assert_eq!(counter.doc_comment, "State: count");
}

#[test]
fn test_script_imports_on_file_entity() {
    let result = parse(CARD_SOURCE);
    assert_eq!(result.imports, vec!["./Button.svelte"]);
    let file = result.file_entity().unwrap();
    assert_eq!(file.imports, vec!["./Button.svelte"]);
}

#[test]
fn test_template_only_component() {
    let source = "<h1>Static</h1>\n";
    let result = parse_at(source, "Banner.svelte");

    let banner = entity(&result, "Banner");
    assert_eq!(banner.kind, EntityKind::Component);
    assert!(banner.doc_comment.is_empty());
    assert!(banner.references.is_empty());
    // Defaults to TypeScript when no script block declares a language.
    assert_eq!(result.file_entity().unwrap().language, "typescript");
}

#[test]
fn test_rune_helpers() {
    assert_eq!(
        destructured_names("let { a, b = 1, c = $bindable() } = $props();"),
        vec!["a", "b", "c"]
    );
    assert_eq!(binding_name("let total = $derived(a + b);").unwrap(), "total");
    assert_eq!(binding_name("const n: number = $state(0)").unwrap(), "n");
    assert!(binding_name("$effect(() => {})").is_none());
}

#[test]
fn test_parent_first_ordering() {
    let result = parse(CARD_SOURCE);
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
    let path = dir.path().join("Card.svelte");
    std::fs::write(&path, CARD_SOURCE).unwrap();

    let mut parser = SvelteParser::new("acme", "demo", dir.path()).unwrap();
    let result = parser
        .parse_file(&CancellationToken::new(), &path)
        .await
        .unwrap();
    assert_eq!(result.hash, content_hash(CARD_SOURCE.as_bytes()));
}
