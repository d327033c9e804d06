//! Parser registry: language name → factory, file extension → language.
//!
//! The process exposes one shared default registry to which the built-in
//! language modules are registered during startup. Registration is explicit
//! rather than side-effectful: [`register_builtin_parsers`] wires every known
//! factory, and [`default_registry`] returns the shared instance.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::core::errors::{IndexerError, Result};
use crate::lang::common::{FileParser, ParserFactory};
use crate::lang::go::GoParser;
use crate::lang::java::JavaParser;
use crate::lang::python::PythonParser;
use crate::lang::svelte::SvelteParser;
use crate::lang::typescript::{TypeScriptParser, TsDialect};

struct Registration {
    factory: ParserFactory,
    extensions: Vec<String>,
}

#[derive(Default)]
struct RegistryInner {
    parsers: HashMap<String, Registration>,
    extensions: HashMap<String, String>,
}

/// Thread-safe mapping from language names to parser factories and from file
/// extensions to language names.
#[derive(Default)]
pub struct ParserRegistry {
    inner: RwLock<RegistryInner>,
}

impl ParserRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parser factory under `name` owning `extensions`.
    ///
    /// The first extension→name binding wins: a conflicting later
    /// registration still registers its factory under `name` but does not
    /// rebind the extension.
    pub fn register(&self, name: &str, extensions: &[&str], factory: ParserFactory) {
        let mut inner = self.inner.write();
        let mut owned = Vec::new();
        for ext in extensions {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            if !inner.extensions.contains_key(&ext) {
                inner.extensions.insert(ext.clone(), name.to_string());
                owned.push(ext);
            }
        }
        inner.parsers.insert(
            name.to_string(),
            Registration {
                factory,
                extensions: owned,
            },
        );
    }

    /// Language name owning a file extension, if any.
    pub fn parser_name_for_extension(&self, ext: &str) -> Option<String> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        self.inner.read().extensions.get(&ext).cloned()
    }

    /// Construct a parser for `name` bound to `(org, project, repo_root)`.
    pub fn create_parser(
        &self,
        name: &str,
        org: &str,
        project: &str,
        repo_root: &Path,
    ) -> Result<Box<dyn FileParser>> {
        let factory = {
            let inner = self.inner.read();
            inner
                .parsers
                .get(name)
                .map(|registration| Arc::clone(&registration.factory))
        };
        // The factory runs outside the lock; parser construction may be slow.
        match factory {
            Some(factory) => factory(org, project, repo_root),
            None => Err(IndexerError::ParserNotRegistered {
                language: name.to_string(),
            }),
        }
    }

    /// All registered language names, sorted.
    pub fn list_parsers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().parsers.keys().cloned().collect();
        names.sort();
        names
    }

    /// All bound extensions, sorted.
    pub fn list_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.inner.read().extensions.keys().cloned().collect();
        exts.sort();
        exts
    }

    /// Extensions owned by a language (those it won at registration).
    pub fn extensions_for(&self, name: &str) -> Vec<String> {
        self.inner
            .read()
            .parsers
            .get(name)
            .map(|registration| registration.extensions.clone())
            .unwrap_or_default()
    }

    /// Whether a language name is registered.
    pub fn has_parser(&self, name: &str) -> bool {
        self.inner.read().parsers.contains_key(name)
    }
}

/// Register every built-in language parser.
///
/// Extension ownership note: `ts/tsx/js/jsx/mjs/cjs` are owned by the
/// tree-sitter backed TypeScript/JavaScript parser; no regex-based variant
/// exists.
pub fn register_builtin_parsers(registry: &ParserRegistry) {
    registry.register(
        "go",
        &["go"],
        Arc::new(|org, project, root| Ok(Box::new(GoParser::new(org, project, root)?))),
    );
    registry.register(
        "java",
        &["java"],
        Arc::new(|org, project, root| Ok(Box::new(JavaParser::new(org, project, root)?))),
    );
    registry.register(
        "python",
        &["py", "pyi"],
        Arc::new(|org, project, root| Ok(Box::new(PythonParser::new(org, project, root)?))),
    );
    registry.register(
        "typescript",
        &["ts", "tsx"],
        Arc::new(|org, project, root| {
            Ok(Box::new(TypeScriptParser::new(
                org,
                project,
                root,
                TsDialect::TypeScript,
            )?))
        }),
    );
    registry.register(
        "javascript",
        &["js", "jsx", "mjs", "cjs"],
        Arc::new(|org, project, root| {
            Ok(Box::new(TypeScriptParser::new(
                org,
                project,
                root,
                TsDialect::JavaScript,
            )?))
        }),
    );
    registry.register(
        "svelte",
        &["svelte"],
        Arc::new(|org, project, root| Ok(Box::new(SvelteParser::new(org, project, root)?))),
    );
}

static DEFAULT_REGISTRY: Lazy<ParserRegistry> = Lazy::new(|| {
    let registry = ParserRegistry::new();
    register_builtin_parsers(&registry);
    registry
});

/// The process-wide default registry with all built-in parsers registered.
pub fn default_registry() -> &'static ParserRegistry {
    &DEFAULT_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registration() {
        let registry = default_registry();
        for lang in ["go", "java", "python", "typescript", "javascript", "svelte"] {
            assert!(registry.has_parser(lang), "parser for {lang} should exist");
        }
        assert!(!registry.has_parser("cobol"));
    }

    #[test]
    fn test_extension_lookup() {
        let registry = default_registry();
        assert_eq!(registry.parser_name_for_extension("go").unwrap(), "go");
        assert_eq!(registry.parser_name_for_extension(".py").unwrap(), "python");
        assert_eq!(registry.parser_name_for_extension("TSX").unwrap(), "typescript");
        assert_eq!(registry.parser_name_for_extension("mjs").unwrap(), "javascript");
        assert!(registry.parser_name_for_extension("md").is_none());
    }

    #[test]
    fn test_create_parser() {
        let registry = default_registry();
        let parser = registry.create_parser("go", "acme", "demo", Path::new("/tmp"));
        assert!(parser.is_ok());
        assert_eq!(parser.unwrap().language(), "go");

        let missing = registry.create_parser("cobol", "acme", "demo", Path::new("/tmp"));
        assert!(matches!(
            missing,
            Err(IndexerError::ParserNotRegistered { .. })
        ));
    }

    #[test]
    fn test_first_extension_binding_wins() {
        let registry = ParserRegistry::new();
        registry.register(
            "first",
            &["zz"],
            Arc::new(|org, project, root| {
                Ok(Box::new(GoParser::new(org, project, root)?))
            }),
        );
        registry.register(
            "second",
            &["zz", "yy"],
            Arc::new(|org, project, root| {
                Ok(Box::new(GoParser::new(org, project, root)?))
            }),
        );

        // Extension stays with the first registrant; the factory still lands.
        assert_eq!(registry.parser_name_for_extension("zz").unwrap(), "first");
        assert_eq!(registry.parser_name_for_extension("yy").unwrap(), "second");
        assert!(registry.has_parser("second"));
        assert_eq!(registry.extensions_for("second"), vec!["yy"]);
    }

    #[test]
    fn test_listings() {
        let registry = default_registry();
        let parsers = registry.list_parsers();
        assert!(parsers.contains(&"go".to_string()));
        assert!(parsers.windows(2).all(|w| w[0] <= w[1]));

        let exts = registry.list_extensions();
        assert!(exts.contains(&"svelte".to_string()));
        assert_eq!(registry.extensions_for("python"), vec!["py", "pyi"]);
    }
}
