//! Constellation layout: classified documents placed around a focus.
//!
//! Angles are screen angles in degrees (0 = right, 90 = down, 180 = left,
//! 270 = up). Radial distances are fractions of half the smaller canvas
//! dimension, so the layout scales with the canvas.
//!
//! ```text
//!   toolkit <- toolkit <- toolkit    domain -> domain -> domain
//!                              source
//!                              FOCUS
//!   perspective              children                 channel
//!     perspective         formula siblings          channel
//!
//!        (distant documents on the outer ring)
//! ```
//!
//! Parent rows start at their inner edge and grow away from the centre line,
//! so toolkits stay in the left half and domains in the right half however
//! many there are. Rows are squeezed to fit the canvas width.

use super::capacity::{compute_visible, page_infos, CapacityBand, CapacityConfig, Offsets, PageInfo};
use super::category::{Categorized, DepthLayer, SemanticCategory};
use super::classify::{
    classify, compute_edges, compute_layers, find_focus, focus_tethers, production_formula, Edge,
    ProductionFormula, Tether,
};
use super::lens::{apply_lens, LensId, LensRegistry};
use crate::document::Document;
use crate::similarity::EmbeddingMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;
use tracing::debug;

// =============================================================================
// SLOT TEMPLATE
// =============================================================================

/// How members of one category are spread around its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arrangement {
    /// Horizontal line centred on the anchor.
    Row,
    /// Horizontal line starting at the anchor and growing leftward.
    RowLeft,
    /// Horizontal line starting at the anchor and growing rightward.
    RowRight,
    /// Even angular steps centred on the anchor angle.
    Arc,
    /// Full circle, first member at the anchor angle.
    Ring,
}

/// Anchor of one category relative to the canvas centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotAnchor {
    /// Degrees, screen orientation.
    pub angle: f64,
    /// Fraction of half the smaller canvas dimension.
    pub distance: f64,
    pub arrangement: Arrangement,
}

impl SlotAnchor {
    pub const fn new(angle: f64, distance: f64, arrangement: Arrangement) -> Self {
        Self {
            angle,
            distance,
            arrangement,
        }
    }
}

/// Built-in anchor for a category.
pub fn default_anchor(category: SemanticCategory) -> SlotAnchor {
    use Arrangement::*;
    match category {
        SemanticCategory::ToolkitParent => SlotAnchor::new(240.0, 0.60, RowLeft),
        SemanticCategory::DomainParent => SlotAnchor::new(300.0, 0.60, RowRight),
        SemanticCategory::SourceParent => SlotAnchor::new(270.0, 0.25, Row),
        SemanticCategory::Child => SlotAnchor::new(90.0, 0.30, Row),
        SemanticCategory::FormulaSibling => SlotAnchor::new(90.0, 0.60, Row),
        SemanticCategory::ChannelSibling => SlotAnchor::new(22.0, 1.10, Arc),
        SemanticCategory::PerspectiveSibling => SlotAnchor::new(158.0, 1.10, Arc),
        SemanticCategory::Distant => SlotAnchor::new(0.0, 0.80, Ring),
    }
}

/// Layout parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Per-category overrides; categories not listed use [`default_anchor`].
    pub slots: BTreeMap<SemanticCategory, SlotAnchor>,
    /// Maximum gap between members of a row.
    pub row_spacing: f64,
    /// Row gap cap as a fraction of the canvas width.
    pub row_spacing_fraction: f64,
    /// Angular step between members of an arc, in degrees.
    pub arc_step: f64,
    /// Radius of the no-focus circle as a fraction of the smaller dimension.
    pub unfocused_radius: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
            row_spacing: 110.0,
            row_spacing_fraction: 0.15,
            arc_step: 12.0,
            unfocused_radius: 0.35,
        }
    }
}

impl LayoutConfig {
    pub fn anchor(&self, category: SemanticCategory) -> SlotAnchor {
        self.slots
            .get(&category)
            .copied()
            .unwrap_or_else(|| default_anchor(category))
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Canvas position in caller units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn polar(self, angle_deg: f64, radius: f64) -> Self {
        let theta = angle_deg.to_radians();
        Self::new(self.x + radius * theta.cos(), self.y + radius * theta.sin())
    }
}

/// Offset of member `i` of `n` from the centre of a symmetric spread.
fn centred(i: usize, n: usize) -> f64 {
    i as f64 - (n as f64 - 1.0) / 2.0
}

/// Row gap that keeps `count` members inside `room` horizontal units.
fn fit_spacing(row_spacing: f64, room: f64, count: usize) -> f64 {
    row_spacing.min(room.max(0.0) / count as f64)
}

fn place_slot(
    anchor: SlotAnchor,
    count: usize,
    center: Position,
    radius: f64,
    row_spacing: f64,
    arc_step: f64,
) -> Vec<Position> {
    let reach = anchor.distance * radius;
    let base = center.polar(anchor.angle, reach);
    let width = center.x * 2.0;
    (0..count)
        .map(|i| match anchor.arrangement {
            Arrangement::Row => {
                let room = 2.0 * base.x.min(width - base.x);
                let gap = fit_spacing(row_spacing, room, count);
                Position::new(base.x + centred(i, count) * gap, base.y)
            }
            Arrangement::RowLeft => {
                let gap = fit_spacing(row_spacing, base.x, count);
                Position::new(base.x - i as f64 * gap, base.y)
            }
            Arrangement::RowRight => {
                let gap = fit_spacing(row_spacing, width - base.x, count);
                Position::new(base.x + i as f64 * gap, base.y)
            }
            Arrangement::Arc => center.polar(anchor.angle + centred(i, count) * arc_step, reach),
            Arrangement::Ring => {
                center.polar(anchor.angle + 360.0 * i as f64 / count as f64, reach)
            }
        })
        .collect()
}

/// Evenly around a circle, first at -90 degrees, clockwise on screen.
fn place_circle(count: usize, center: Position, radius: f64) -> Vec<Position> {
    (0..count)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / count as f64 - PI / 2.0;
            Position::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}

// =============================================================================
// LAYOUT
// =============================================================================

/// A positioned document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    pub x: f64,
    pub y: f64,
    /// `None` for the focus and in no-focus mode.
    pub category: Option<SemanticCategory>,
    pub layer: DepthLayer,
}

/// Positioned nodes plus all resolvable lineage edges.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Layout {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Layout {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Lay out `docs` on a `width` x `height` canvas with the built-in template.
pub fn layout<'a, I>(docs: I, focus_id: Option<&str>, width: f64, height: f64) -> Layout
where
    I: IntoIterator<Item = &'a Document>,
{
    layout_with(&LayoutConfig::default(), docs, focus_id, width, height)
}

/// Lay out `docs` with an explicit template.
///
/// Nodes come back in input order. With a known focus, the focus sits
/// exactly at the canvas centre.
pub fn layout_with<'a, I>(
    config: &LayoutConfig,
    docs: I,
    focus_id: Option<&str>,
    width: f64,
    height: f64,
) -> Layout
where
    I: IntoIterator<Item = &'a Document>,
{
    let docs: Vec<&'a Document> = docs.into_iter().collect();
    if docs.is_empty() {
        return Layout::default();
    }

    let center = Position::new(width / 2.0, height / 2.0);
    let min_dim = width.min(height);
    let edges = compute_edges(docs.iter().copied());
    let layers = compute_layers(docs.iter().copied(), focus_id);

    let mut positions: HashMap<&str, Position> = HashMap::with_capacity(docs.len());
    let mut categories: BTreeMap<&str, SemanticCategory> = BTreeMap::new();

    match find_focus(docs.iter().copied(), focus_id) {
        None => {
            let ring = place_circle(docs.len(), center, min_dim * config.unfocused_radius);
            for (doc, position) in docs.iter().zip(ring) {
                positions.insert(doc.id.as_str(), position);
            }
        }
        Some(focus) => {
            positions.insert(focus.id.as_str(), center);

            let categorized = classify(docs.iter().copied(), Some(focus.id.as_str()));
            let radius = min_dim / 2.0;
            let row_spacing = config
                .row_spacing
                .min(width * config.row_spacing_fraction);

            for (category, members) in categorized.iter() {
                let placed = place_slot(
                    config.anchor(category),
                    members.len(),
                    center,
                    radius,
                    row_spacing,
                    config.arc_step,
                );
                for (doc, position) in members.iter().zip(placed) {
                    positions.insert(doc.id.as_str(), position);
                    categories.insert(doc.id.as_str(), category);
                }
            }
        }
    }

    let nodes = docs
        .iter()
        .map(|doc| {
            let position = positions.get(doc.id.as_str()).copied().unwrap_or(center);
            Node {
                id: doc.id.clone(),
                x: position.x,
                y: position.y,
                category: categories.get(doc.id.as_str()).copied(),
                layer: layers
                    .get(&doc.id)
                    .copied()
                    .unwrap_or(DepthLayer::Distant),
            }
        })
        .collect();

    Layout { nodes, edges }
}

// =============================================================================
// COMPOSED VIEW
// =============================================================================

/// Inputs of one constellation render pass.
#[derive(Debug, Clone)]
pub struct ViewRequest<'a> {
    pub focus: Option<&'a str>,
    pub lens: LensId,
    pub offsets: Offsets<SemanticCategory>,
    pub width: f64,
    pub height: f64,
    pub now: DateTime<Utc>,
    pub embeddings: Option<&'a EmbeddingMap>,
}

impl<'a> ViewRequest<'a> {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            focus: None,
            lens: LensId::Default,
            offsets: Offsets::new(),
            width,
            height,
            now: Utc::now(),
            embeddings: None,
        }
    }

    pub fn focus(mut self, id: &'a str) -> Self {
        self.focus = Some(id);
        self
    }

    pub fn lens(mut self, lens: LensId) -> Self {
        self.lens = lens;
        self
    }

    pub fn offset(mut self, category: SemanticCategory, offset: usize) -> Self {
        self.offsets.insert(category, offset);
        self
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

/// Everything a view needs to render one constellation frame.
#[derive(Debug, Clone, Serialize)]
pub struct Constellation<'a> {
    pub focus: Option<String>,
    /// Lens actually applied (unknown or unavailable lenses fall back).
    pub lens: LensId,
    pub band: CapacityBand,
    /// Full classification of the lens-filtered set, before pagination.
    pub categories: Categorized<'a, SemanticCategory>,
    pub pages: BTreeMap<SemanticCategory, PageInfo>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Edges touching the focus, coloured by relationship.
    pub tethers: Vec<Tether>,
    pub formula: Option<ProductionFormula<'a>>,
}

/// Run the full pipeline: lens, adaptive limits, classification,
/// pagination, layout, tethers and the focus's production formula.
pub fn compose_constellation<'a>(
    docs: &'a [Document],
    request: &ViewRequest<'_>,
    capacity: &CapacityConfig,
    layout_config: &LayoutConfig,
) -> Constellation<'a> {
    let focus = find_focus(docs, request.focus);
    let focus_id = focus.map(|f| f.id.as_str());

    let mut registry = LensRegistry::new();
    if let Some(embeddings) = request.embeddings {
        registry = registry.with_embeddings(embeddings);
    }
    let lens = registry.lens_by_id(request.lens.as_ref());

    let filtered = apply_lens(docs, focus_id, lens, request.now, request.embeddings);
    let band = capacity.band(filtered.len());
    let limits = capacity.semantic_limits(filtered.len());

    let categories = classify(filtered.iter().copied(), focus_id);
    let visible = compute_visible(&categories, limits, &request.offsets);
    let pages = page_infos(&categories, limits, &request.offsets);

    let visible_docs: Vec<&'a Document> = focus.into_iter().chain(visible.documents()).collect();
    let Layout { nodes, edges } = layout_with(
        layout_config,
        visible_docs.iter().copied(),
        focus_id,
        request.width,
        request.height,
    );

    let tethers = focus_id
        .map(|id| focus_tethers(visible_docs.iter().copied(), &edges, id))
        .unwrap_or_default();
    let formula = focus_id.map(|id| production_formula(docs, id));

    debug!(
        focus = ?focus_id,
        lens = %lens.id,
        %band,
        filtered = filtered.len(),
        visible = nodes.len(),
        "composed constellation"
    );

    Constellation {
        focus: focus_id.map(str::to_string),
        lens: lens.id,
        band,
        categories,
        pages,
        nodes,
        edges,
        tethers,
        formula,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentType, FrameworkKind};
    use pretty_assertions::assert_eq;

    const W: f64 = 800.0;
    const H: f64 = 600.0;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new("tk", "Toolkit", DocumentType::Framework)
                .with_framework_kind(FrameworkKind::Toolkit),
            Document::new("dm", "Domain", DocumentType::Framework)
                .with_framework_kind(FrameworkKind::Domain),
            Document::new("src", "Source", DocumentType::Source),
            Document::new("focus", "Focus", DocumentType::Instance)
                .with_frameworks(["tk", "dm"])
                .with_source("src")
                .with_output("essay"),
            Document::new("kid", "Kid", DocumentType::Note).with_source("focus"),
            Document::new("twin", "Twin", DocumentType::Instance).with_frameworks(["dm", "tk"]),
            Document::new("chan", "Channel", DocumentType::Note).with_output("essay"),
            Document::new("far", "Far", DocumentType::Note),
        ]
    }

    #[test]
    fn test_focus_at_exact_centre() {
        let docs = corpus();
        let result = layout(&docs, Some("focus"), W, H);
        let focus = result.node("focus").unwrap();
        assert_eq!((focus.x, focus.y), (W / 2.0, H / 2.0));
        assert_eq!(focus.layer, DepthLayer::Focus);
        assert_eq!(focus.category, None);
    }

    #[test]
    fn test_slot_directions() {
        let docs = corpus();
        let result = layout(&docs, Some("focus"), W, H);
        let (cx, cy) = (W / 2.0, H / 2.0);
        let node = |id: &str| result.node(id).unwrap().clone();

        let tk = node("tk");
        assert!(tk.x < cx && tk.y < cy, "toolkit upper-left");
        let dm = node("dm");
        assert!(dm.x > cx && dm.y < cy, "domain upper-right");
        let src = node("src");
        assert!(close(src.x, cx) && src.y < cy, "source straight above");
        let kid = node("kid");
        let twin = node("twin");
        assert!(close(kid.x, cx) && kid.y > cy, "child straight below");
        assert!(twin.y > kid.y, "formula siblings below children");
        let chan = node("chan");
        assert!(chan.x > cx && chan.y > cy, "channel lower-right");
        assert_eq!(node("far").category, Some(SemanticCategory::Distant));
    }

    #[test]
    fn test_parent_rows_grow_outward_from_centre_line() {
        let mut docs = Vec::new();
        let mut parents = Vec::new();
        for i in 0..4 {
            let tk = format!("tk{i}");
            let dm = format!("dm{i}");
            docs.push(
                Document::new(tk.clone(), "Toolkit", DocumentType::Framework)
                    .with_framework_kind(FrameworkKind::Toolkit),
            );
            docs.push(
                Document::new(dm.clone(), "Domain", DocumentType::Framework)
                    .with_framework_kind(FrameworkKind::Domain),
            );
            parents.push(tk);
            parents.push(dm);
        }
        docs.push(Document::new("src", "Source", DocumentType::Source));
        docs.push(
            Document::new("focus", "Focus", DocumentType::Instance)
                .with_frameworks(parents)
                .with_source("src"),
        );

        let result = layout(&docs, Some("focus"), W, H);
        let cx = W / 2.0;
        let xs = |category: SemanticCategory| -> Vec<f64> {
            result
                .nodes
                .iter()
                .filter(|n| n.category == Some(category))
                .map(|n| n.x)
                .collect()
        };
        let toolkit = xs(SemanticCategory::ToolkitParent);
        let domain = xs(SemanticCategory::DomainParent);
        assert_eq!((toolkit.len(), domain.len()), (4, 4));

        let max_toolkit = toolkit.iter().copied().fold(f64::MIN, f64::max);
        let min_domain = domain.iter().copied().fold(f64::MAX, f64::min);
        assert!(max_toolkit < cx, "toolkit row crosses the centre line");
        assert!(cx < min_domain, "domain row crosses the centre line");
        assert!(toolkit.iter().chain(&domain).all(|x| (0.0..=W).contains(x)));

        // Source sits between the inner edges, above the focus.
        let src = result.node("src").unwrap();
        assert!(max_toolkit < src.x && src.x < min_domain);
        let parent_y = result.node("tk0").unwrap().y;
        assert!(parent_y < src.y && src.y < H / 2.0);
    }

    #[test]
    fn test_row_squeezed_to_canvas() {
        let mut docs = vec![Document::new("f", "F", DocumentType::Note)];
        for i in 0..6 {
            docs.push(Document::new(format!("k{i}"), "Kid", DocumentType::Note).with_source("f"));
        }
        let narrow = 300.0;
        let result = layout(&docs, Some("f"), narrow, H);
        for node in result.nodes.iter().filter(|n| n.id != "f") {
            assert!(node.x >= 0.0 && node.x <= narrow, "{} off canvas", node.id);
        }
    }

    #[test]
    fn test_row_spread_is_symmetric() {
        let docs = vec![
            Document::new("f", "F", DocumentType::Note),
            Document::new("a", "A", DocumentType::Note).with_source("f"),
            Document::new("b", "B", DocumentType::Note).with_source("f"),
            Document::new("c", "C", DocumentType::Note).with_source("f"),
        ];
        let result = layout(&docs, Some("f"), W, H);
        let xs: Vec<f64> = ["a", "b", "c"]
            .iter()
            .map(|id| result.node(id).unwrap().x)
            .collect();
        let mean = xs.iter().sum::<f64>() / 3.0;
        assert!(close(mean, W / 2.0));
        let ys: Vec<f64> = ["a", "b", "c"]
            .iter()
            .map(|id| result.node(id).unwrap().y)
            .collect();
        assert!(ys.iter().all(|y| close(*y, ys[0])));
    }

    #[test]
    fn test_no_focus_circle_starts_at_top() {
        let docs = corpus();
        let result = layout(&docs, None, W, H);
        let radius = H * 0.35;
        let first = &result.nodes[0];
        assert!(close(first.x, W / 2.0));
        assert!(close(first.y, H / 2.0 - radius));
        // Second node is clockwise on screen: to the right of the first.
        assert!(result.nodes[1].x > first.x);
        assert!(result.nodes.iter().all(|n| n.layer == DepthLayer::Context));
    }

    #[test]
    fn test_unknown_focus_behaves_like_no_focus() {
        let docs = corpus();
        let a = layout(&docs, None, W, H);
        let b = layout(&docs, Some("missing"), W, H);
        assert_eq!(a.nodes, b.nodes);
    }

    #[test]
    fn test_empty_input() {
        let docs: Vec<Document> = Vec::new();
        let result = layout(&docs, Some("x"), W, H);
        assert!(result.nodes.is_empty());
        assert!(result.edges.is_empty());
    }

    #[test]
    fn test_compose_pipeline() {
        let docs = corpus();
        let request = ViewRequest::new(W, H).focus("focus");
        let view = compose_constellation(
            &docs,
            &request,
            &CapacityConfig::default(),
            &LayoutConfig::default(),
        );

        assert_eq!(view.focus.as_deref(), Some("focus"));
        assert_eq!(view.band, CapacityBand::Small);
        assert_eq!(view.nodes.len(), docs.len());
        assert_eq!(view.nodes[0].id, "focus");

        let formula = view.formula.as_ref().unwrap();
        assert_eq!(formula.toolkits[0].id, "tk");
        assert_eq!(formula.domains[0].id, "dm");

        // focus -> tk, focus -> dm, focus -> src, kid -> focus
        assert_eq!(view.tethers.len(), 4);
        assert!(view
            .tethers
            .iter()
            .all(|t| t.edge.source == "focus" || t.edge.target == "focus"));
    }

    #[test]
    fn test_compose_paginates_and_reports_overflow() {
        let mut docs = vec![Document::new("f", "F", DocumentType::Note)];
        for i in 0..9 {
            docs.push(Document::new(format!("k{i}"), "Kid", DocumentType::Note).with_source("f"));
        }
        let request = ViewRequest::new(W, H)
            .focus("f")
            .offset(SemanticCategory::Child, 100);
        let view = compose_constellation(
            &docs,
            &request,
            &CapacityConfig::default(),
            &LayoutConfig::default(),
        );

        assert_eq!(view.categories.count(SemanticCategory::Child), 9);
        let page = view.pages[&SemanticCategory::Child];
        assert_eq!(page.max_visible, 6);
        assert_eq!(page.visible_start, 3);
        assert!(page.has_prev && !page.has_next);
        // Focus plus one window of children.
        assert_eq!(view.nodes.len(), 7);
    }

    #[test]
    fn test_compose_unavailable_lens_falls_back() {
        let docs = corpus();
        let request = ViewRequest::new(W, H).focus("focus").lens(LensId::Semantic);
        let view = compose_constellation(
            &docs,
            &request,
            &CapacityConfig::default(),
            &LayoutConfig::default(),
        );
        assert_eq!(view.lens, LensId::Default);
    }

    #[test]
    fn test_snapshot_serializes() {
        let docs = corpus();
        let request = ViewRequest::new(W, H).focus("focus");
        let view = compose_constellation(
            &docs,
            &request,
            &CapacityConfig::default(),
            &LayoutConfig::default(),
        );
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["categories"]["sourceParent"], serde_json::json!(["src"]));
        assert_eq!(json["formula"]["source"], "src");
        assert_eq!(json["lens"], "default");
    }
}
