//! Knowledge-base document model and lineage resolution.
//!
//! Documents are owned by the persistence collaborator; the engine treats
//! them as immutable values for the duration of one computation pass.
//!
//! Lineage can be expressed two ways:
//! - legacy fields: `framework_ids` + `source_id`
//! - generalized lists: `upstream` / `downstream` of `{doc, relation}` refs
//!
//! [`resolve_lineage`] is the single place where the precedence rule lives:
//! a non-empty `upstream` list wins over the legacy fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use strum::{AsRefStr, Display, EnumString};

// =============================================================================
// ENUMS
// =============================================================================

/// Document type tag.
///
/// The five built-in types drive relationship semantics; any other tag is a
/// domain-specific extension and is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentType {
    Framework,
    Instance,
    Note,
    Source,
    Index,
    Extension(String),
}

impl DocumentType {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentType::Framework => "framework",
            DocumentType::Instance => "instance",
            DocumentType::Note => "note",
            DocumentType::Source => "source",
            DocumentType::Index => "index",
            DocumentType::Extension(tag) => tag,
        }
    }

    /// Built-in types, in directory scan order.
    pub const BUILT_IN: [DocumentType; 5] = [
        DocumentType::Framework,
        DocumentType::Instance,
        DocumentType::Note,
        DocumentType::Source,
        DocumentType::Index,
    ];
}

impl From<String> for DocumentType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "framework" => DocumentType::Framework,
            "instance" => DocumentType::Instance,
            "note" => DocumentType::Note,
            "source" => DocumentType::Source,
            "index" => DocumentType::Index,
            other => DocumentType::Extension(other.to_string()),
        }
    }
}

impl From<&str> for DocumentType {
    fn from(value: &str) -> Self {
        DocumentType::from(value.to_string())
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Framework subtype.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FrameworkKind {
    Toolkit,
    Domain,
}

/// Lifecycle status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Incubating,
    Draft,
    Verified,
    Captured,
}

/// Kind of a generalized lineage reference.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RelationKind {
    Informs,
    Method,
    Source,
    Prior,
    Defines,
}

/// One entry of an `upstream` / `downstream` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageRef {
    pub doc: String,
    pub relation: RelationKind,
}

impl LineageRef {
    pub fn new(doc: impl Into<String>, relation: RelationKind) -> Self {
        Self {
            doc: doc.into(),
            relation,
        }
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// A knowledge-base document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    #[serde(default)]
    pub framework_kind: Option<FrameworkKind>,
    #[serde(default)]
    pub perspective: Option<String>,
    #[serde(default)]
    pub framework_ids: Vec<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    /// Output channel label.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub upstream: Vec<LineageRef>,
    #[serde(default)]
    pub downstream: Vec<LineageRef>,
}

impl Document {
    /// Create a document with empty relationship fields, stamped now.
    pub fn new(id: impl Into<String>, title: impl Into<String>, doc_type: DocumentType) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            doc_type,
            framework_kind: None,
            perspective: None,
            framework_ids: Vec::new(),
            source_id: None,
            output: None,
            domain: None,
            status: DocumentStatus::default(),
            tags: Vec::new(),
            created_at: now,
            modified_at: now,
            upstream: Vec::new(),
            downstream: Vec::new(),
        }
    }

    /// Builder: set framework subtype
    pub fn with_framework_kind(mut self, kind: FrameworkKind) -> Self {
        self.framework_kind = Some(kind);
        self
    }

    /// Builder: set legacy parent frameworks
    pub fn with_frameworks<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.framework_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set legacy source parent
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Builder: set output channel
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Builder: set perspective
    pub fn with_perspective(mut self, perspective: impl Into<String>) -> Self {
        self.perspective = Some(perspective.into());
        self
    }

    /// Builder: set status
    pub fn with_status(mut self, status: DocumentStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder: set creation timestamp
    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Builder: set modification timestamp
    pub fn modified(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = at;
        self
    }

    /// Builder: set generalized upstream refs
    pub fn with_upstream(mut self, refs: Vec<LineageRef>) -> Self {
        self.upstream = refs;
        self
    }

    /// Builder: set generalized downstream refs
    pub fn with_downstream(mut self, refs: Vec<LineageRef>) -> Self {
        self.downstream = refs;
        self
    }

    pub fn is_framework(&self) -> bool {
        self.doc_type == DocumentType::Framework
    }

    /// Whether this document declares `other_id` in its downstream list.
    pub fn lists_downstream(&self, other_id: &str) -> bool {
        self.downstream.iter().any(|r| r.doc == other_id)
    }

    /// True when both lineage representations are present and disagree.
    pub fn has_lineage_drift(&self) -> bool {
        if self.upstream.is_empty() {
            return false;
        }
        if self.framework_ids.is_empty() && self.source_id.is_none() {
            return false;
        }
        let resolved = resolve_lineage(self);
        let legacy = Lineage::legacy(self);
        resolved.framework_set() != legacy.framework_set() || resolved.source != legacy.source
    }
}

// =============================================================================
// LINEAGE RESOLUTION
// =============================================================================

/// Resolved parents of a document, split by role.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lineage<'a> {
    /// Parent frameworks, in declaration order.
    pub frameworks: Vec<&'a str>,
    /// Single source parent.
    pub source: Option<&'a str>,
}

impl<'a> Lineage<'a> {
    fn legacy(doc: &'a Document) -> Self {
        Self {
            frameworks: doc.framework_ids.iter().map(String::as_str).collect(),
            source: doc.source_id.as_deref(),
        }
    }

    fn generalized(refs: &'a [LineageRef]) -> Self {
        let mut lineage = Lineage::default();
        for r in refs {
            match r.relation {
                RelationKind::Source if lineage.source.is_none() => {
                    lineage.source = Some(r.doc.as_str())
                }
                RelationKind::Source => {}
                _ => lineage.frameworks.push(r.doc.as_str()),
            }
        }
        lineage
    }

    /// All parent ids: frameworks first, then the source, without duplicates.
    pub fn parents(&self) -> Vec<&'a str> {
        let mut out: Vec<&'a str> = Vec::with_capacity(self.frameworks.len() + 1);
        for id in self.frameworks.iter().copied().chain(self.source) {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    pub fn has_framework(&self, id: &str) -> bool {
        self.frameworks.iter().any(|f| *f == id)
    }

    pub fn is_source(&self, id: &str) -> bool {
        self.source == Some(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.has_framework(id) || self.is_source(id)
    }

    /// Framework ids as a set (the "production formula").
    pub fn framework_set(&self) -> BTreeSet<&'a str> {
        self.frameworks.iter().copied().collect()
    }
}

/// Resolve a document's lineage; a non-empty `upstream` list wins.
pub fn resolve_lineage(doc: &Document) -> Lineage<'_> {
    if doc.upstream.is_empty() {
        Lineage::legacy(doc)
    } else {
        Lineage::generalized(&doc.upstream)
    }
}

/// Resolved parent ids of a document, regardless of representation.
pub fn resolve_parents(doc: &Document) -> Vec<&str> {
    resolve_lineage(doc).parents()
}

/// Serialize a list of document references as their ids.
pub(crate) fn serialize_doc_ids<S: serde::Serializer>(
    docs: &[&Document],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(docs.iter().map(|d| d.id.as_str()))
}

/// Serialize an optional document reference as its id.
pub(crate) fn serialize_doc_id<S: serde::Serializer>(
    doc: &Option<&Document>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match doc {
        Some(d) => serializer.serialize_some(d.id.as_str()),
        None => serializer.serialize_none(),
    }
}
