//! Relationship categories ("slots") and the per-category document buckets.

use crate::document::Document;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use strum::{AsRefStr, Display as StrumDisplay, EnumString};

/// A mutually exclusive relationship bucket.
pub trait Category: Copy + Ord + Hash + Debug + Display + 'static {
    /// All categories in navigation order.
    const ORDER: &'static [Self];

    /// Category to cycle to from `self` (`direction` is +1 or -1).
    fn cycle(self, direction: i32) -> Self {
        let order = Self::ORDER;
        let len = order.len() as i32;
        let idx = order.iter().position(|c| *c == self).unwrap_or(0) as i32;
        order[((idx + direction).rem_euclid(len)) as usize]
    }
}

/// Eight-way relationship of a document to the focus.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SemanticCategory {
    ToolkitParent,
    DomainParent,
    SourceParent,
    Child,
    FormulaSibling,
    ChannelSibling,
    PerspectiveSibling,
    Distant,
}

impl Category for SemanticCategory {
    const ORDER: &'static [Self] = &[
        SemanticCategory::ToolkitParent,
        SemanticCategory::DomainParent,
        SemanticCategory::SourceParent,
        SemanticCategory::Child,
        SemanticCategory::FormulaSibling,
        SemanticCategory::ChannelSibling,
        SemanticCategory::PerspectiveSibling,
        SemanticCategory::Distant,
    ];
}

impl SemanticCategory {
    /// Collapse to the four-way legacy category.
    pub fn collapse(self) -> RelationshipCategory {
        match self {
            SemanticCategory::ToolkitParent
            | SemanticCategory::DomainParent
            | SemanticCategory::SourceParent => RelationshipCategory::Parent,
            SemanticCategory::Child => RelationshipCategory::Child,
            SemanticCategory::FormulaSibling
            | SemanticCategory::ChannelSibling
            | SemanticCategory::PerspectiveSibling => RelationshipCategory::Sibling,
            SemanticCategory::Distant => RelationshipCategory::Distant,
        }
    }

    pub fn is_parent(self) -> bool {
        self.collapse() == RelationshipCategory::Parent
    }
}

/// Four-way (legacy) relationship of a document to the focus.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RelationshipCategory {
    Parent,
    Child,
    Sibling,
    Distant,
}

impl Category for RelationshipCategory {
    const ORDER: &'static [Self] = &[
        RelationshipCategory::Parent,
        RelationshipCategory::Child,
        RelationshipCategory::Sibling,
        RelationshipCategory::Distant,
    ];
}

/// Depth layer of a node in the constellation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DepthLayer {
    Focus,
    Context,
    Distant,
}

// =============================================================================
// BUCKETS
// =============================================================================

/// Documents partitioned into categories relative to a focus.
///
/// Every category key is always present (possibly empty). The focus document
/// never appears in any bucket.
#[derive(Debug, Clone)]
pub struct Categorized<'a, C: Category> {
    buckets: BTreeMap<C, Vec<&'a Document>>,
}

impl<'a, C: Category> Default for Categorized<'a, C> {
    fn default() -> Self {
        Self {
            buckets: C::ORDER.iter().map(|c| (*c, Vec::new())).collect(),
        }
    }
}

impl<'a, C: Category> Categorized<'a, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, category: C, doc: &'a Document) {
        self.buckets.entry(category).or_default().push(doc);
    }

    pub(crate) fn set(&mut self, category: C, docs: Vec<&'a Document>) {
        self.buckets.insert(category, docs);
    }

    /// Documents in one category.
    pub fn get(&self, category: C) -> &[&'a Document] {
        self.buckets.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of documents in one category.
    pub fn count(&self, category: C) -> usize {
        self.get(category).len()
    }

    /// Total number of categorized documents.
    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Iterate `(category, docs)` in navigation order.
    pub fn iter(&self) -> impl Iterator<Item = (C, &[&'a Document])> + '_ {
        C::ORDER.iter().map(move |c| (*c, self.get(*c)))
    }

    /// All documents in navigation order of their categories.
    pub fn documents(&self) -> impl Iterator<Item = &'a Document> + '_ {
        self.iter().flat_map(|(_, docs)| docs.iter().copied())
    }

    /// Category of a document id, if categorized.
    pub fn category_of(&self, id: &str) -> Option<C> {
        self.iter()
            .find(|(_, docs)| docs.iter().any(|d| d.id == id))
            .map(|(c, _)| c)
    }

    /// Document id -> category mapping.
    pub fn assignments(&self) -> BTreeMap<&'a str, C> {
        let mut out = BTreeMap::new();
        for (category, docs) in self.iter() {
            for doc in docs {
                out.insert(doc.id.as_str(), category);
            }
        }
        out
    }

    /// Stable sort of every bucket, most recently modified first.
    pub(crate) fn sort_by_modified_desc(&mut self) {
        for docs in self.buckets.values_mut() {
            docs.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        }
    }
}

impl<'a, C: Category + Serialize> Serialize for Categorized<'a, C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(C::ORDER.len()))?;
        for (category, docs) in self.iter() {
            let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
            map.serialize_entry(&category, &ids)?;
        }
        map.end()
    }
}
