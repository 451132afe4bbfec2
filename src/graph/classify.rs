//! Relationship classification relative to a focus document.
//!
//! Priority (first match wins):
//!
//! ```text
//! toolkitParent ─► domainParent ─► sourceParent ─► child
//!        ─► formulaSibling ─► channelSibling ─► perspectiveSibling ─► distant
//! ```
//!
//! Structural lineage dominates attribute equality, and an exact formula
//! match is tested before the coarser channel/perspective checks.
//!
//! Every function accepts any iterator of document references, so the same
//! code runs over a full corpus (`&[Document]`) or a lens-filtered view
//! (`Vec<&Document>`).

use super::category::{Categorized, DepthLayer, RelationshipCategory, SemanticCategory};
use crate::document::{
    resolve_lineage, serialize_doc_id, serialize_doc_ids, Document, FrameworkKind, Lineage,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use strum::AsRefStr;
use tracing::debug;

/// Directed lineage edge: `source` references `target` as a parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

/// The parents of a focus document, grouped by role.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductionFormula<'a> {
    #[serde(serialize_with = "serialize_doc_ids")]
    pub toolkits: Vec<&'a Document>,
    #[serde(serialize_with = "serialize_doc_ids")]
    pub domains: Vec<&'a Document>,
    #[serde(serialize_with = "serialize_doc_id")]
    pub source: Option<&'a Document>,
}

impl ProductionFormula<'_> {
    pub fn is_empty(&self) -> bool {
        self.toolkits.is_empty() && self.domains.is_empty() && self.source.is_none()
    }
}

/// Precomputed facts about the focus used by every predicate.
struct FocusContext<'a> {
    focus: &'a Document,
    lineage: Lineage<'a>,
    formula: BTreeSet<&'a str>,
}

impl<'a> FocusContext<'a> {
    fn new(focus: &'a Document) -> Self {
        let lineage = resolve_lineage(focus);
        let formula = lineage.framework_set();
        Self {
            focus,
            lineage,
            formula,
        }
    }

    fn is_child(&self, other: &Document) -> bool {
        resolve_lineage(other).contains(&self.focus.id) || self.focus.lists_downstream(&other.id)
    }

    fn is_formula_sibling(&self, other: &Document) -> bool {
        !self.formula.is_empty() && resolve_lineage(other).framework_set() == self.formula
    }

    fn same_channel(&self, other: &Document) -> bool {
        self.focus.output.is_some() && other.output == self.focus.output
    }

    fn same_perspective(&self, other: &Document) -> bool {
        self.focus.perspective.is_some() && other.perspective == self.focus.perspective
    }

    fn semantic(&self, other: &Document) -> SemanticCategory {
        if self.lineage.has_framework(&other.id) {
            match other.framework_kind {
                Some(FrameworkKind::Toolkit) => return SemanticCategory::ToolkitParent,
                Some(FrameworkKind::Domain) => return SemanticCategory::DomainParent,
                None => {}
            }
        }
        if self.lineage.is_source(&other.id) {
            return SemanticCategory::SourceParent;
        }
        if self.is_child(other) {
            return SemanticCategory::Child;
        }
        if self.is_formula_sibling(other) {
            return SemanticCategory::FormulaSibling;
        }
        if self.same_channel(other) {
            return SemanticCategory::ChannelSibling;
        }
        if self.same_perspective(other) {
            return SemanticCategory::PerspectiveSibling;
        }
        SemanticCategory::Distant
    }

    fn legacy(&self, other: &Document) -> RelationshipCategory {
        if self.lineage.contains(&other.id) {
            RelationshipCategory::Parent
        } else if self.is_child(other) {
            RelationshipCategory::Child
        } else if self.same_perspective(other) || self.same_channel(other) {
            RelationshipCategory::Sibling
        } else {
            RelationshipCategory::Distant
        }
    }
}

pub(crate) fn find_focus<'a, I>(docs: I, focus_id: Option<&str>) -> Option<&'a Document>
where
    I: IntoIterator<Item = &'a Document>,
{
    let focus_id = focus_id?;
    docs.into_iter().find(|d| d.id == focus_id)
}

/// Partition every non-focus document into one of eight categories.
///
/// Without a (known) focus every document lands in `distant`, in input order.
pub fn classify<'a, I>(docs: I, focus_id: Option<&str>) -> Categorized<'a, SemanticCategory>
where
    I: IntoIterator<Item = &'a Document>,
    I::IntoIter: Clone,
{
    let docs = docs.into_iter();
    let mut result = Categorized::new();

    let Some(focus) = find_focus(docs.clone(), focus_id) else {
        result.set(SemanticCategory::Distant, docs.collect());
        return result;
    };

    if focus.has_lineage_drift() {
        debug!(focus = %focus.id, "upstream list disagrees with legacy lineage fields");
    }

    let ctx = FocusContext::new(focus);
    for doc in docs.filter(|d| d.id != focus.id) {
        result.push(ctx.semantic(doc), doc);
    }

    result.sort_by_modified_desc();
    result
}

/// Four-way classification used by the simplified constellation.
pub fn classify_legacy<'a, I>(
    docs: I,
    focus_id: Option<&str>,
) -> Categorized<'a, RelationshipCategory>
where
    I: IntoIterator<Item = &'a Document>,
    I::IntoIter: Clone,
{
    let docs = docs.into_iter();
    let mut result = Categorized::new();

    let Some(focus) = find_focus(docs.clone(), focus_id) else {
        result.set(RelationshipCategory::Distant, docs.collect());
        return result;
    };

    let ctx = FocusContext::new(focus);
    for doc in docs.filter(|d| d.id != focus.id) {
        result.push(ctx.legacy(doc), doc);
    }

    result.sort_by_modified_desc();
    result
}

/// Depth layer of every document (focus / context / distant).
///
/// Without a focus, or with an unknown focus, every document is `context`.
pub fn compute_layers<'a, I>(docs: I, focus_id: Option<&str>) -> HashMap<String, DepthLayer>
where
    I: IntoIterator<Item = &'a Document>,
    I::IntoIter: Clone,
{
    let docs = docs.into_iter();
    let Some(focus) = find_focus(docs.clone(), focus_id) else {
        return docs.map(|d| (d.id.clone(), DepthLayer::Context)).collect();
    };

    let ctx = FocusContext::new(focus);
    docs.map(|doc| {
        let layer = if doc.id == focus.id {
            DepthLayer::Focus
        } else if ctx.legacy(doc) == RelationshipCategory::Distant {
            DepthLayer::Distant
        } else {
            DepthLayer::Context
        };
        (doc.id.clone(), layer)
    })
    .collect()
}

/// Collect the focus's resolved parents, split by role.
pub fn production_formula<'a, I>(docs: I, focus_id: &str) -> ProductionFormula<'a>
where
    I: IntoIterator<Item = &'a Document>,
    I::IntoIter: Clone,
{
    let docs = docs.into_iter();
    let Some(focus) = find_focus(docs.clone(), Some(focus_id)) else {
        return ProductionFormula::default();
    };

    let lineage = resolve_lineage(focus);
    let mut formula = ProductionFormula::default();
    for doc in docs {
        if lineage.has_framework(&doc.id) {
            match doc.framework_kind {
                Some(FrameworkKind::Toolkit) => formula.toolkits.push(doc),
                Some(FrameworkKind::Domain) => formula.domains.push(doc),
                None => {}
            }
        }
        if lineage.is_source(&doc.id) {
            formula.source = Some(doc);
        }
    }
    formula
}

/// One edge per resolved lineage reference whose target is in `docs`.
///
/// Dangling references are dropped silently.
pub fn compute_edges<'a, I>(docs: I) -> Vec<Edge>
where
    I: IntoIterator<Item = &'a Document>,
    I::IntoIter: Clone,
{
    let docs = docs.into_iter();
    let ids: HashSet<&str> = docs.clone().map(|d| d.id.as_str()).collect();
    let mut edges = Vec::new();
    for doc in docs {
        for parent in resolve_lineage(doc).parents() {
            if ids.contains(parent) {
                edges.push(Edge {
                    source: doc.id.clone(),
                    target: parent.to_string(),
                });
            }
        }
    }
    edges
}

// =============================================================================
// TETHERS
// =============================================================================

/// Colour class of a tether between the focus and another document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TetherKind {
    Source,
    Toolkit,
    Domain,
    Child,
    Perspective,
    Channel,
}

/// Relationship class of `other` as seen from `focus`, for edge colouring.
pub fn tether_relation(focus: &Document, other: &Document) -> Option<TetherKind> {
    let lineage = resolve_lineage(focus);
    if lineage.contains(&other.id) {
        if lineage.is_source(&other.id) {
            return Some(TetherKind::Source);
        }
        return Some(match other.framework_kind {
            Some(FrameworkKind::Domain) => TetherKind::Domain,
            _ => TetherKind::Toolkit,
        });
    }
    if resolve_lineage(other).contains(&focus.id) {
        return Some(TetherKind::Child);
    }
    if focus.perspective.is_some() && other.perspective == focus.perspective {
        return Some(TetherKind::Perspective);
    }
    if focus.output.is_some() && other.output == focus.output {
        return Some(TetherKind::Channel);
    }
    None
}

/// An edge selected for drawing, with its colour class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tether {
    #[serde(flatten)]
    pub edge: Edge,
    pub kind: Option<TetherKind>,
}

/// Edges touching the focus, each tagged with the other endpoint's class.
pub fn focus_tethers<'a, I>(docs: I, edges: &[Edge], focus_id: &str) -> Vec<Tether>
where
    I: IntoIterator<Item = &'a Document>,
{
    let by_id: HashMap<&str, &Document> = docs.into_iter().map(|d| (d.id.as_str(), d)).collect();
    let Some(focus) = by_id.get(focus_id).copied() else {
        return Vec::new();
    };

    edges
        .iter()
        .filter(|e| e.source == focus_id || e.target == focus_id)
        .filter_map(|edge| {
            let other_id = if edge.source == focus_id {
                &edge.target
            } else {
                &edge.source
            };
            let other = by_id.get(other_id.as_str())?;
            Some(Tether {
                edge: edge.clone(),
                kind: tether_relation(focus, other),
            })
        })
        .collect()
}
