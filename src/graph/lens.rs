//! Lenses: named (filter, sort) pairs applied before classification.
//!
//! The registry is a fixed, ordered table of value objects. Predicates and
//! comparators are plain function pointers that receive a [`LensContext`]
//! carrying the focus, the clock and (optionally) the embedding map.

use crate::document::{resolve_lineage, Document, DocumentStatus, DocumentType, FrameworkKind};
use crate::similarity::{cosine_similarity, EmbeddingMap};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum::{AsRefStr, Display, EnumString};

/// Window of the `recent` lens.
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Lens identifier.
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
pub enum LensId {
    #[default]
    Default,
    Formula,
    Production,
    Lineage,
    Channel,
    Perspective,
    Incubating,
    Recent,
    Framework,
    Semantic,
}

/// Inputs shared by every predicate and comparator of one lens pass.
#[derive(Debug, Clone, Copy)]
pub struct LensContext<'a> {
    pub focus: &'a Document,
    pub now: DateTime<Utc>,
    pub embeddings: Option<&'a EmbeddingMap>,
}

impl<'a> LensContext<'a> {
    pub fn new(focus: &'a Document) -> Self {
        Self {
            focus,
            now: Utc::now(),
            embeddings: None,
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_embeddings(mut self, embeddings: &'a EmbeddingMap) -> Self {
        self.embeddings = Some(embeddings);
        self
    }
}

pub type LensFilter = fn(&Document, &LensContext<'_>) -> bool;
pub type LensSort = fn(&Document, &Document, &LensContext<'_>) -> Ordering;

/// A named filter/sort pair.
#[derive(Debug, Clone, Serialize)]
pub struct Lens {
    pub id: LensId,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub filter: LensFilter,
    #[serde(skip)]
    pub sort: LensSort,
    pub available: bool,
}

// =============================================================================
// PREDICATES
// =============================================================================

fn accept_all(_: &Document, _: &LensContext<'_>) -> bool {
    true
}

fn newest_first(a: &Document, b: &Document, _: &LensContext<'_>) -> Ordering {
    b.modified_at.cmp(&a.modified_at)
}

fn is_parent_of_focus(doc: &Document, ctx: &LensContext<'_>) -> bool {
    resolve_lineage(ctx.focus).contains(&doc.id)
}

fn is_child_of_focus(doc: &Document, ctx: &LensContext<'_>) -> bool {
    resolve_lineage(doc).contains(&ctx.focus.id)
}

fn shares_formula(doc: &Document, ctx: &LensContext<'_>) -> bool {
    let focus = resolve_lineage(ctx.focus).framework_set();
    !focus.is_empty() && resolve_lineage(doc).framework_set() == focus
}

fn formula_filter(doc: &Document, ctx: &LensContext<'_>) -> bool {
    is_parent_of_focus(doc, ctx) || shares_formula(doc, ctx)
}

fn parents_then_newest(a: &Document, b: &Document, ctx: &LensContext<'_>) -> Ordering {
    is_parent_of_focus(b, ctx)
        .cmp(&is_parent_of_focus(a, ctx))
        .then_with(|| newest_first(a, b, ctx))
}

fn lineage_filter(doc: &Document, ctx: &LensContext<'_>) -> bool {
    is_parent_of_focus(doc, ctx) || is_child_of_focus(doc, ctx)
}

fn channel_filter(doc: &Document, ctx: &LensContext<'_>) -> bool {
    ctx.focus.output.is_some() && doc.output == ctx.focus.output
}

fn perspective_filter(doc: &Document, ctx: &LensContext<'_>) -> bool {
    ctx.focus.perspective.is_some() && doc.perspective == ctx.focus.perspective
}

fn incubating_filter(doc: &Document, _: &LensContext<'_>) -> bool {
    doc.status == DocumentStatus::Incubating
}

fn oldest_created_first(a: &Document, b: &Document, _: &LensContext<'_>) -> Ordering {
    a.created_at.cmp(&b.created_at)
}

fn recent_filter(doc: &Document, ctx: &LensContext<'_>) -> bool {
    doc.modified_at > ctx.now - Duration::days(RECENT_WINDOW_DAYS)
}

fn framework_filter(doc: &Document, _: &LensContext<'_>) -> bool {
    doc.doc_type == DocumentType::Framework
}

fn toolkit_then_title(a: &Document, b: &Document, _: &LensContext<'_>) -> Ordering {
    let rank = |d: &Document| match d.framework_kind {
        Some(FrameworkKind::Toolkit) => 0,
        _ => 1,
    };
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
}

fn similarity_to_focus(doc: &Document, ctx: &LensContext<'_>) -> Option<f64> {
    let embeddings = ctx.embeddings?;
    let target = embeddings.get(&ctx.focus.id)?;
    let vector = embeddings.get(&doc.id)?;
    Some(cosine_similarity(target, vector))
}

/// Most similar first; documents without an embedding sink to the end.
fn most_similar_first(a: &Document, b: &Document, ctx: &LensContext<'_>) -> Ordering {
    match (similarity_to_focus(a, ctx), similarity_to_focus(b, ctx)) {
        (Some(sa), Some(sb)) => sb.total_cmp(&sa),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => newest_first(a, b, ctx),
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Ordered lens table.
#[derive(Debug, Clone)]
pub struct LensRegistry {
    lenses: Vec<Lens>,
}

impl Default for LensRegistry {
    fn default() -> Self {
        let lens = |id, name, description, filter: LensFilter, sort: LensSort| Lens {
            id,
            name,
            description,
            filter,
            sort,
            available: true,
        };

        let mut semantic = lens(
            LensId::Semantic,
            "Semantic",
            "Embedding similarity",
            accept_all,
            most_similar_first,
        );
        semantic.available = false;

        Self {
            lenses: vec![
                lens(
                    LensId::Default,
                    "Default",
                    "All relationships",
                    accept_all,
                    newest_first,
                ),
                lens(
                    LensId::Formula,
                    "Formula",
                    "Production lineage only",
                    formula_filter,
                    parents_then_newest,
                ),
                lens(
                    LensId::Production,
                    "Production",
                    "What this produced",
                    is_child_of_focus,
                    newest_first,
                ),
                lens(
                    LensId::Lineage,
                    "Lineage",
                    "Parents and children",
                    lineage_filter,
                    newest_first,
                ),
                lens(
                    LensId::Channel,
                    "Channel",
                    "Same output channel",
                    channel_filter,
                    newest_first,
                ),
                lens(
                    LensId::Perspective,
                    "Perspective",
                    "Same perspective cluster",
                    perspective_filter,
                    newest_first,
                ),
                lens(
                    LensId::Incubating,
                    "Incubating",
                    "Status = incubating",
                    incubating_filter,
                    oldest_created_first,
                ),
                lens(
                    LensId::Recent,
                    "Recent",
                    "Modified in last 7 days",
                    recent_filter,
                    newest_first,
                ),
                lens(
                    LensId::Framework,
                    "Frameworks",
                    "Framework documents only",
                    framework_filter,
                    toolkit_then_title,
                ),
                semantic,
            ],
        }
    }
}

impl LensRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[Lens] {
        &self.lenses
    }

    /// Look up a lens by id, including unavailable ones.
    pub fn get(&self, id: LensId) -> Option<&Lens> {
        self.lenses.iter().find(|l| l.id == id)
    }

    /// Resolve a lens name for use, falling back to the default lens when the
    /// name is unknown or the lens is unavailable.
    pub fn lens_by_id(&self, id: &str) -> &Lens {
        id.parse::<LensId>()
            .ok()
            .and_then(|id| self.get(id))
            .filter(|l| l.available)
            .unwrap_or_else(|| self.default_lens())
    }

    pub fn default_lens(&self) -> &Lens {
        &self.lenses[0]
    }

    pub fn set_available(&mut self, id: LensId, available: bool) {
        if let Some(lens) = self.lenses.iter_mut().find(|l| l.id == id) {
            lens.available = available;
        }
    }

    /// Enable the semantic lens when any embeddings exist.
    pub fn with_embeddings(mut self, embeddings: &EmbeddingMap) -> Self {
        self.set_available(LensId::Semantic, !embeddings.is_empty());
        self
    }

    /// Next available lens from `current` in registry order (`direction` ±1).
    pub fn cycle(&self, current: LensId, direction: i32) -> LensId {
        let len = self.lenses.len() as i32;
        let start = self
            .lenses
            .iter()
            .position(|l| l.id == current)
            .unwrap_or(0) as i32;
        let step = if direction < 0 { -1 } else { 1 };

        (1..=len)
            .map(|k| &self.lenses[(start + step * k).rem_euclid(len) as usize])
            .find(|l| l.available)
            .map(|l| l.id)
            .unwrap_or(current)
    }
}

/// Apply a lens: focus first, then the filtered survivors in lens order.
///
/// Without a (known) focus the input order is returned untouched.
pub fn apply_lens<'a>(
    docs: &'a [Document],
    focus_id: Option<&str>,
    lens: &Lens,
    now: DateTime<Utc>,
    embeddings: Option<&EmbeddingMap>,
) -> Vec<&'a Document> {
    let focus = focus_id.and_then(|id| docs.iter().find(|d| d.id == id));
    let Some(focus) = focus else {
        return docs.iter().collect();
    };

    let ctx = LensContext {
        focus,
        now,
        embeddings,
    };

    let mut rest: Vec<&Document> = docs
        .iter()
        .filter(|d| d.id != focus.id)
        .filter(|d| (lens.filter)(d, &ctx))
        .collect();
    rest.sort_by(|a, b| (lens.sort)(a, b, &ctx));

    let mut out = Vec::with_capacity(rest.len() + 1);
    out.push(focus);
    out.extend(rest);
    out
}
