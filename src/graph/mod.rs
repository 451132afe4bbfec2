//! Relationship graph: classification, lenses, capacity and layout.

pub mod capacity;
pub mod category;
pub mod classify;
pub mod constellation;
pub mod lens;

pub use capacity::{
    compute_visible, page_info, page_infos, scroll_offset, BandLimits, CapacityBand,
    CapacityConfig, Offsets, PageInfo, SlotLimits,
};
pub use category::{Categorized, Category, DepthLayer, RelationshipCategory, SemanticCategory};
pub use classify::{
    classify, classify_legacy, compute_edges, compute_layers, focus_tethers, production_formula,
    tether_relation, Edge, ProductionFormula, Tether, TetherKind,
};
pub use constellation::{
    compose_constellation, layout, layout_with, Arrangement, Constellation, LayoutConfig, Node,
    Position, SlotAnchor, ViewRequest,
};
pub use lens::{apply_lens, Lens, LensContext, LensId, LensRegistry};
