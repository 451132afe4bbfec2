//! Adaptive per-category display budgets and windowed pagination.
//!
//! Band selection by total document count:
//!
//! ```text
//!   total <  small_below            -> Small
//!   small_below <= total < large_from -> Medium
//!   total >= large_from             -> Large   (distant may be zeroed)
//! ```

use super::category::{Categorized, Category, RelationshipCategory, SemanticCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display};

pub const SMALL_BELOW: usize = 20;
pub const LARGE_FROM: usize = 50;

/// Size band of a document set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CapacityBand {
    Small,
    Medium,
    Large,
}

impl CapacityBand {
    pub fn for_total(total: usize, small_below: usize, large_from: usize) -> Self {
        if total < small_below {
            CapacityBand::Small
        } else if total < large_from {
            CapacityBand::Medium
        } else {
            CapacityBand::Large
        }
    }
}

// =============================================================================
// LIMIT TABLES
// =============================================================================

/// Visible-item limit per category. Categories missing from the table get 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotLimits<C: Category> {
    limits: BTreeMap<C, usize>,
}

impl<C: Category> SlotLimits<C> {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (C, usize)>) -> Self {
        Self {
            limits: pairs.into_iter().collect(),
        }
    }

    pub fn limit(&self, category: C) -> usize {
        self.limits.get(&category).copied().unwrap_or(0)
    }

    pub fn set(&mut self, category: C, limit: usize) {
        self.limits.insert(category, limit);
    }

    /// Sum of all limits: an upper bound on rendered nodes.
    pub fn budget(&self) -> usize {
        self.limits.values().sum()
    }
}

fn semantic(values: [usize; 8]) -> SlotLimits<SemanticCategory> {
    SlotLimits::from_pairs(SemanticCategory::ORDER.iter().copied().zip(values))
}

fn legacy(values: [usize; 4]) -> SlotLimits<RelationshipCategory> {
    SlotLimits::from_pairs(RelationshipCategory::ORDER.iter().copied().zip(values))
}

/// One limit table per band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandLimits<C: Category> {
    pub small: SlotLimits<C>,
    pub medium: SlotLimits<C>,
    pub large: SlotLimits<C>,
}

impl<C: Category> BandLimits<C> {
    pub fn for_band(&self, band: CapacityBand) -> &SlotLimits<C> {
        match band {
            CapacityBand::Small => &self.small,
            CapacityBand::Medium => &self.medium,
            CapacityBand::Large => &self.large,
        }
    }
}

impl Default for BandLimits<SemanticCategory> {
    fn default() -> Self {
        // toolkit, domain, source, child, formula, channel, perspective, distant
        Self {
            small: semantic([4, 4, 1, 6, 5, 4, 4, 6]),
            medium: semantic([3, 3, 1, 4, 4, 3, 3, 4]),
            large: semantic([2, 2, 1, 3, 3, 2, 2, 0]),
        }
    }
}

impl Default for BandLimits<RelationshipCategory> {
    fn default() -> Self {
        // parent, child, sibling, distant
        Self {
            small: legacy([6, 6, 6, 8]),
            medium: legacy([4, 4, 4, 4]),
            large: legacy([2, 2, 2, 0]),
        }
    }
}

/// Band thresholds plus limit tables for both classification modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    pub small_below: usize,
    pub large_from: usize,
    pub semantic: BandLimits<SemanticCategory>,
    pub legacy: BandLimits<RelationshipCategory>,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            small_below: SMALL_BELOW,
            large_from: LARGE_FROM,
            semantic: BandLimits::default(),
            legacy: BandLimits::default(),
        }
    }
}

impl CapacityConfig {
    pub fn band(&self, total: usize) -> CapacityBand {
        CapacityBand::for_total(total, self.small_below, self.large_from)
    }

    /// Eight-category limits adapted to `total`.
    pub fn semantic_limits(&self, total: usize) -> &SlotLimits<SemanticCategory> {
        self.semantic.for_band(self.band(total))
    }

    /// Four-category limits adapted to `total`.
    pub fn legacy_limits(&self, total: usize) -> &SlotLimits<RelationshipCategory> {
        self.legacy.for_band(self.band(total))
    }
}

// =============================================================================
// PAGINATION
// =============================================================================

/// Scroll offsets per category. Absent categories are at offset 0.
pub type Offsets<C> = BTreeMap<C, usize>;

fn max_offset(total: usize, limit: usize) -> usize {
    total.saturating_sub(limit)
}

/// Clamp an offset into `[0, max(0, total - limit)]`.
pub fn clamp_offset(offset: usize, total: usize, limit: usize) -> usize {
    offset.min(max_offset(total, limit))
}

/// Move an offset by one step in `direction`, clamped at both ends.
pub fn scroll_offset(current: usize, direction: i32, total: usize, limit: usize) -> usize {
    let moved = if direction < 0 {
        current.saturating_sub(1)
    } else if direction > 0 {
        current.saturating_add(1)
    } else {
        current
    };
    clamp_offset(moved, total, limit)
}

/// Slice every category to its `[offset, offset + limit)` window.
pub fn compute_visible<'a, C: Category>(
    categorized: &Categorized<'a, C>,
    limits: &SlotLimits<C>,
    offsets: &Offsets<C>,
) -> Categorized<'a, C> {
    let mut visible = Categorized::new();
    for (category, docs) in categorized.iter() {
        let limit = limits.limit(category);
        let offset = clamp_offset(
            offsets.get(&category).copied().unwrap_or(0),
            docs.len(),
            limit,
        );
        let end = (offset + limit).min(docs.len());
        visible.set(category, docs[offset..end].to_vec());
    }
    visible
}

/// Overflow indicator state for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Zero-based index of the first visible item.
    pub visible_start: usize,
    /// Exclusive end of the visible window.
    pub visible_end: usize,
    pub max_visible: usize,
    pub total_count: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl PageInfo {
    pub fn overflows(&self) -> bool {
        self.total_count > self.max_visible
    }
}

pub fn page_info(offset: usize, total: usize, limit: usize) -> PageInfo {
    let offset = clamp_offset(offset, total, limit);
    PageInfo {
        visible_start: offset,
        visible_end: (offset + limit).min(total),
        max_visible: limit,
        total_count: total,
        has_prev: offset > 0,
        has_next: offset + limit < total,
    }
}

/// Page info for every category, in navigation order.
pub fn page_infos<C: Category>(
    categorized: &Categorized<'_, C>,
    limits: &SlotLimits<C>,
    offsets: &Offsets<C>,
) -> BTreeMap<C, PageInfo> {
    categorized
        .iter()
        .map(|(category, docs)| {
            let offset = offsets.get(&category).copied().unwrap_or(0);
            (
                category,
                page_info(offset, docs.len(), limits.limit(category)),
            )
        })
        .collect()
}
