//! Triple encoding of code entities.
//!
//! Every entity serializes to a deterministic sequence of
//! `(subject, predicate, object)` triples under a fixed vocabulary. Integer
//! predicates (line numbers) keep their numeric type through serialization.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::core::entity::CodeEntity;
use crate::core::errors::Result;

/// Fixed predicate vocabulary.
pub mod vocab {
    /// Artifact kind token
    pub const TYPE: &str = "code.artifact.type";
    /// Display name
    pub const TITLE: &str = "dc.terms.title";
    /// Repo-relative path
    pub const PATH: &str = "code.artifact.path";
    /// Package or module name
    pub const PACKAGE: &str = "code.structure.package";
    /// Content hash
    pub const HASH: &str = "code.artifact.hash";
    /// Source language
    pub const LANGUAGE: &str = "code.artifact.language";
    /// Framework tag
    pub const FRAMEWORK: &str = "code.artifact.framework";
    /// Visibility token
    pub const VISIBILITY: &str = "code.artifact.visibility";
    /// 1-based start line
    pub const START_LINE: &str = "code.metric.start_line";
    /// 1-based end line
    pub const END_LINE: &str = "code.metric.end_line";
    /// Derived line count
    pub const LINES: &str = "code.metric.lines";
    /// Doc comment
    pub const DOC_COMMENT: &str = "code.doc.comment";

    /// Capability name
    pub const CAPABILITY_NAME: &str = "code.capability.name";
    /// Capability description
    pub const CAPABILITY_DESCRIPTION: &str = "code.capability.description";
    /// One per capability tool
    pub const CAPABILITY_TOOL: &str = "code.capability.tool";
    /// One per capability input
    pub const CAPABILITY_INPUT: &str = "code.capability.input";
    /// One per capability output
    pub const CAPABILITY_OUTPUT: &str = "code.capability.output";

    /// Parent containment
    pub const BELONGS_TO: &str = "code.relationship.belongs_to";
    /// Child containment
    pub const CONTAINS: &str = "code.relationship.contains";
    /// Opaque import path
    pub const IMPORTS: &str = "code.relationship.imports";
    /// Implemented interface
    pub const IMPLEMENTS: &str = "code.relationship.implements";
    /// Supertype
    pub const EXTENDS: &str = "code.relationship.extends";
    /// Embedded type
    pub const EMBEDS: &str = "code.relationship.embeds";
    /// Callee
    pub const CALLS: &str = "code.relationship.calls";
    /// Referenced type
    pub const REFERENCES: &str = "code.relationship.references";
    /// Return type
    pub const RETURNS: &str = "code.relationship.returns";
    /// Method receiver
    pub const RECEIVER: &str = "code.relationship.receiver";
    /// Parameter type
    pub const PARAMETERS: &str = "code.relationship.parameters";

    /// RFC-3339 creation timestamp
    pub const CREATED: &str = "dc.terms.created";
}

/// Language recorded when an entity carries none, kept for compatibility
/// with the earliest indexed corpus.
const DEFAULT_LANGUAGE: &str = "go";

/// A typed triple object: strings for text and references, integers for
/// line metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TripleValue {
    /// Integer-typed object (serializes as a JSON number)
    Integer(i64),
    /// Text or reference object
    Text(String),
}

impl From<&str> for TripleValue {
    fn from(value: &str) -> Self {
        TripleValue::Text(value.to_string())
    }
}

impl From<String> for TripleValue {
    fn from(value: String) -> Self {
        TripleValue::Text(value)
    }
}

impl From<i64> for TripleValue {
    fn from(value: i64) -> Self {
        TripleValue::Integer(value)
    }
}

/// One `(subject, predicate, object)` fact about an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triple {
    /// Entity ID the fact is about
    pub subject: String,
    /// Predicate from the fixed vocabulary
    pub predicate: String,
    /// Typed object
    pub object: TripleValue,
}

/// Emit the deterministic triple sequence for one entity.
///
/// Order: identity block, capability block, relationship block, `created`
/// timestamp. Conditional fields are omitted when empty; relationship
/// objects are never the empty string.
pub fn entity_triples(entity: &CodeEntity) -> Vec<Triple> {
    let mut out = TripleWriter::new(&entity.id);

    // Identity block.
    out.text(vocab::TYPE, entity.kind.as_str());
    out.text(vocab::TITLE, &entity.name);
    out.text_opt(vocab::PATH, &entity.path);
    out.text_opt(vocab::PACKAGE, &entity.package);
    out.text_opt(vocab::HASH, &entity.hash);
    if entity.language.is_empty() {
        out.text(vocab::LANGUAGE, DEFAULT_LANGUAGE);
    } else {
        out.text(vocab::LANGUAGE, &entity.language);
    }
    out.text_opt(vocab::FRAMEWORK, &entity.framework);
    out.text(vocab::VISIBILITY, entity.visibility.as_str());
    if entity.start_line > 0 {
        out.integer(vocab::START_LINE, entity.start_line as i64);
    }
    if entity.end_line > 0 {
        out.integer(vocab::END_LINE, entity.end_line as i64);
    }
    if let Some(lines) = entity.line_count() {
        out.integer(vocab::LINES, lines as i64);
    }
    out.text_opt(vocab::DOC_COMMENT, &entity.doc_comment);

    // Capability block.
    if let Some(cap) = &entity.capability {
        out.text(vocab::CAPABILITY_NAME, &cap.name);
        out.text_opt(vocab::CAPABILITY_DESCRIPTION, &cap.description);
        out.list(vocab::CAPABILITY_TOOL, &cap.tools);
        out.list(vocab::CAPABILITY_INPUT, &cap.inputs);
        out.list(vocab::CAPABILITY_OUTPUT, &cap.outputs);
    }

    // Relationship block, fixed order.
    out.text_opt(vocab::BELONGS_TO, &entity.contained_by);
    out.list(vocab::CONTAINS, &entity.contains);
    out.list(vocab::IMPORTS, &entity.imports);
    out.list(vocab::IMPLEMENTS, &entity.implements);
    out.list(vocab::EXTENDS, &entity.extends);
    out.list(vocab::EMBEDS, &entity.embeds);
    out.list(vocab::CALLS, &entity.calls);
    out.list(vocab::REFERENCES, &entity.references);
    out.list(vocab::RETURNS, &entity.returns);
    out.text_opt(vocab::RECEIVER, &entity.receiver);
    out.list(vocab::PARAMETERS, &entity.parameters);

    out.text(
        vocab::CREATED,
        entity
            .indexed_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    out.into_inner()
}

struct TripleWriter<'a> {
    subject: &'a str,
    triples: Vec<Triple>,
}

impl<'a> TripleWriter<'a> {
    fn new(subject: &'a str) -> Self {
        Self {
            subject,
            triples: Vec::with_capacity(16),
        }
    }

    fn text(&mut self, predicate: &str, object: impl Into<String>) {
        self.triples.push(Triple {
            subject: self.subject.to_string(),
            predicate: predicate.to_string(),
            object: TripleValue::Text(object.into()),
        });
    }

    fn text_opt(&mut self, predicate: &str, object: &str) {
        if !object.is_empty() {
            self.text(predicate, object);
        }
    }

    fn integer(&mut self, predicate: &str, object: i64) {
        self.triples.push(Triple {
            subject: self.subject.to_string(),
            predicate: predicate.to_string(),
            object: TripleValue::Integer(object),
        });
    }

    fn list(&mut self, predicate: &str, objects: &[String]) {
        for object in objects {
            self.text_opt(predicate, object);
        }
    }

    fn into_inner(self) -> Vec<Triple> {
        self.triples
    }
}

/// Wire payload for one published entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPayload {
    /// Entity ID
    pub id: String,
    /// Full triple sequence
    pub triples: Vec<Triple>,
    /// RFC-3339 publication timestamp
    pub updated_at: String,
}

impl EntityPayload {
    /// Build the payload for an entity.
    pub fn from_entity(entity: &CodeEntity) -> Self {
        Self {
            id: entity.id.clone(),
            triples: entity_triples(entity),
            updated_at: entity
                .indexed_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Into::into)
    }
}
