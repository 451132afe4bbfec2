//! End-to-end constellation scenarios: classification, capacity, pagination
//! and layout through the public API.

use loomlib::{
    classify, compose_constellation, embeddings_or_empty, layout, CapacityBand, CapacityConfig,
    Document, DocumentType, FrameworkKind, KnowledgeStore, LayoutConfig, LensId, MarkdownStore,
    SemanticCategory, ViewRequest,
};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

const W: f64 = 1200.0;
const H: f64 = 800.0;

fn toolkit(id: &str) -> Document {
    Document::new(id, id.to_uppercase(), DocumentType::Framework)
        .with_framework_kind(FrameworkKind::Toolkit)
}

fn instance(id: &str, frameworks: &[&str]) -> Document {
    Document::new(id, id.to_uppercase(), DocumentType::Instance)
        .with_frameworks(frameworks.iter().copied())
}

#[test]
fn toolkit_parent_and_child_are_symmetric() {
    let docs = vec![toolkit("f"), instance("i", &["f"])];

    let from_instance = classify(&docs, Some("i"));
    assert_eq!(
        from_instance.category_of("f"),
        Some(SemanticCategory::ToolkitParent)
    );

    let from_framework = classify(&docs, Some("f"));
    assert_eq!(from_framework.category_of("i"), Some(SemanticCategory::Child));
}

#[test]
fn shared_formula_makes_siblings() {
    let docs = vec![
        toolkit("f"),
        toolkit("g"),
        instance("a", &["f", "g"]),
        instance("b", &["g", "f"]),
    ];

    let from_a = classify(&docs, Some("a"));
    assert_eq!(
        from_a.category_of("b"),
        Some(SemanticCategory::FormulaSibling)
    );
    let from_b = classify(&docs, Some("b"));
    assert_eq!(
        from_b.category_of("a"),
        Some(SemanticCategory::FormulaSibling)
    );
}

#[test]
fn capacity_bands_follow_total() {
    let capacity = CapacityConfig::default();
    assert_eq!(capacity.band(15), CapacityBand::Small);
    assert_eq!(capacity.band(35), CapacityBand::Medium);
    assert_eq!(capacity.band(75), CapacityBand::Large);
    assert_eq!(
        capacity
            .semantic_limits(75)
            .limit(SemanticCategory::Distant),
        0
    );
}

#[test]
fn overflowing_children_page_and_clamp() {
    let mut docs = vec![toolkit("f")];
    docs.extend((0..12).map(|i| instance(&format!("i{i:02}"), &["f"])));

    let capacity = CapacityConfig::default();
    let layout = LayoutConfig::default();

    let request = ViewRequest::new(W, H).focus("f");
    let view = compose_constellation(&docs, &request, &capacity, &layout);
    assert_eq!(view.band, CapacityBand::Small);
    assert_eq!(view.categories.count(SemanticCategory::Child), 12);

    let page = view.pages[&SemanticCategory::Child];
    assert_eq!(page.total_count, 12);
    assert_eq!(page.max_visible, 6);
    assert_eq!((page.visible_start, page.visible_end), (0, 6));
    assert!(!page.has_prev);
    assert!(page.has_next);
    assert_eq!(view.nodes.len(), 7);

    let scrolled = ViewRequest::new(W, H)
        .focus("f")
        .offset(SemanticCategory::Child, 100);
    let view = compose_constellation(&docs, &scrolled, &capacity, &layout);
    let page = view.pages[&SemanticCategory::Child];
    assert_eq!((page.visible_start, page.visible_end), (6, 12));
    assert!(page.has_prev);
    assert!(!page.has_next);
    assert_eq!(view.nodes.len(), 7);
}

#[test]
fn focus_sits_at_canvas_centre_with_tethers() {
    let docs = vec![
        toolkit("f"),
        instance("i", &["f"]),
        instance("j", &["f"]),
        Document::new("n", "Note", DocumentType::Note),
    ];
    let request = ViewRequest::new(W, H).focus("i");
    let view = compose_constellation(
        &docs,
        &request,
        &CapacityConfig::default(),
        &LayoutConfig::default(),
    );

    let focus = view.nodes.iter().find(|n| n.id == "i").unwrap();
    assert_eq!((focus.x, focus.y), (W / 2.0, H / 2.0));
    assert_eq!(focus.category, None);
    assert_eq!(view.focus.as_deref(), Some("i"));

    assert_eq!(view.tethers.len(), 1);
    assert_eq!(view.tethers[0].edge.target, "f");

    let formula = view.formula.as_ref().unwrap();
    assert_eq!(formula.toolkits.len(), 1);
    assert!(formula.domains.is_empty());
}

fn domain(id: &str) -> Document {
    Document::new(id, id.to_uppercase(), DocumentType::Framework)
        .with_framework_kind(FrameworkKind::Domain)
}

/// A focus with every slot filled to its small-band limit.
fn full_small_band() -> Vec<Document> {
    let toolkits: Vec<String> = (0..4).map(|i| format!("t{i}")).collect();
    let domains: Vec<String> = (0..4).map(|i| format!("d{i}")).collect();
    let formula: Vec<&str> = toolkits.iter().chain(&domains).map(String::as_str).collect();

    let mut docs: Vec<Document> = toolkits.iter().map(|id| toolkit(id)).collect();
    docs.extend(domains.iter().map(|id| domain(id)));
    docs.push(Document::new("s", "Source", DocumentType::Source));
    docs.push(
        instance("focus", &formula)
            .with_source("s")
            .with_output("essay")
            .with_perspective("craft"),
    );
    for i in 0..6 {
        docs.push(Document::new(format!("c{i}"), "Child", DocumentType::Note).with_source("focus"));
    }
    for i in 0..5 {
        docs.push(instance(&format!("f{i}"), &formula));
    }
    for i in 0..4 {
        docs.push(Document::new(format!("ch{i}"), "Channel", DocumentType::Note).with_output("essay"));
        docs.push(
            Document::new(format!("p{i}"), "Perspective", DocumentType::Note)
                .with_perspective("craft"),
        );
    }
    docs
}

#[test]
fn full_small_band_keeps_every_slot_in_its_sector() {
    let docs = full_small_band();
    let view = layout(&docs, Some("focus"), W, H);
    assert_eq!(view.nodes.len(), docs.len());

    let (cx, cy) = (W / 2.0, H / 2.0);
    let members = |category: SemanticCategory| -> Vec<(f64, f64)> {
        view.nodes
            .iter()
            .filter(|n| n.category == Some(category))
            .map(|n| (n.x, n.y))
            .collect()
    };
    let expected = [
        (SemanticCategory::ToolkitParent, 4),
        (SemanticCategory::DomainParent, 4),
        (SemanticCategory::SourceParent, 1),
        (SemanticCategory::Child, 6),
        (SemanticCategory::FormulaSibling, 5),
        (SemanticCategory::ChannelSibling, 4),
        (SemanticCategory::PerspectiveSibling, 4),
    ];
    for (category, count) in expected {
        assert_eq!(members(category).len(), count, "{category:?}");
    }

    assert!(members(SemanticCategory::ToolkitParent)
        .iter()
        .all(|&(x, y)| x < cx && y < cy));
    assert!(members(SemanticCategory::DomainParent)
        .iter()
        .all(|&(x, y)| x > cx && y < cy));
    assert!(members(SemanticCategory::SourceParent)
        .iter()
        .all(|&(_, y)| y < cy));
    let child_y = members(SemanticCategory::Child)[0].1;
    assert!(child_y > cy);
    assert!(members(SemanticCategory::FormulaSibling)
        .iter()
        .all(|&(_, y)| y > child_y));
    assert!(members(SemanticCategory::ChannelSibling)
        .iter()
        .all(|&(x, y)| x > cx && y > cy));
    assert!(members(SemanticCategory::PerspectiveSibling)
        .iter()
        .all(|&(x, y)| x < cx && y > cy));

    // Cards of different categories (the focus included) never overlap.
    const CARD_W: f64 = 100.0;
    const CARD_H: f64 = 30.0;
    for (i, a) in view.nodes.iter().enumerate() {
        for b in &view.nodes[i + 1..] {
            if a.category == b.category {
                continue;
            }
            let overlaps = (a.x - b.x).abs() < CARD_W && (a.y - b.y).abs() < CARD_H;
            assert!(!overlaps, "{} overlaps {}", a.id, b.id);
        }
    }
}

#[test]
fn unavailable_lens_falls_back_to_default() {
    let docs = vec![toolkit("f"), instance("i", &["f"])];
    let request = ViewRequest::new(W, H).focus("i").lens(LensId::Semantic);
    let view = compose_constellation(
        &docs,
        &request,
        &CapacityConfig::default(),
        &LayoutConfig::default(),
    );
    assert_eq!(view.lens, LensId::Default);
}

#[test]
fn unknown_focus_lays_out_a_circle() {
    let docs = vec![toolkit("f"), instance("i", &["f"])];
    let request = ViewRequest::new(W, H).focus("missing");
    let view = compose_constellation(
        &docs,
        &request,
        &CapacityConfig::default(),
        &LayoutConfig::default(),
    );
    assert_eq!(view.focus, None);
    assert!(view.tethers.is_empty());
    assert!(view.nodes.iter().all(|n| n.category.is_none()));
    assert_eq!(view.nodes.len(), 2);
}

#[tokio::test]
async fn markdown_knowledge_base_to_constellation() {
    let temp = TempDir::new().unwrap();
    let write = |dir: &str, name: &str, text: &str| {
        let dir = temp.path().join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), text).unwrap();
    };

    write(
        "framework",
        "tacit.md",
        "---\nid: fw-tacit\ntitle: Tacit knowledge\ntype: framework\nstatus: verified\nframework_kind: toolkit\n---\n",
    );
    write(
        "framework",
        "ops.md",
        "---\nid: fw-ops\ntitle: Operations\ntype: framework\nstatus: verified\nframework_kind: domain\n---\n",
    );
    write(
        "source",
        "talk.md",
        "---\nid: src-talk\ntitle: A talk\ntype: source\nstatus: captured\n---\n",
    );
    write(
        "instance",
        "essay.md",
        "---\nid: inst-essay\ntitle: Essay\ntype: instance\nstatus: draft\noutput: essay\nframework_ids: [fw-tacit, fw-ops]\nsource_id: src-talk\n---\nBody\n",
    );
    write(
        "note",
        "other.md",
        "---\nid: note-other\ntitle: Other essay\ntype: note\nstatus: incubating\noutput: essay\n---\n",
    );

    let store = MarkdownStore::new(temp.path());
    let docs = store.all_documents().await.unwrap();
    assert_eq!(docs.len(), 5);

    let request = ViewRequest::new(W, H).focus("inst-essay");
    let view = compose_constellation(
        &docs,
        &request,
        &CapacityConfig::default(),
        &LayoutConfig::default(),
    );

    let assigned: Vec<(&str, SemanticCategory)> = view
        .categories
        .assignments()
        .into_iter()
        .collect();
    assert_eq!(
        assigned,
        vec![
            ("fw-ops", SemanticCategory::DomainParent),
            ("fw-tacit", SemanticCategory::ToolkitParent),
            ("note-other", SemanticCategory::ChannelSibling),
            ("src-talk", SemanticCategory::SourceParent),
        ]
    );
}

#[tokio::test]
async fn corrupt_embeddings_still_lay_out_structurally() {
    let temp = TempDir::new().unwrap();
    let write = |dir: &str, name: &str, text: &str| {
        let dir = temp.path().join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), text).unwrap();
    };
    write(
        "framework",
        "tacit.md",
        "---\nid: fw-tacit\ntitle: Tacit\ntype: framework\nstatus: verified\nframework_kind: toolkit\n---\n",
    );
    write(
        "instance",
        "essay.md",
        "---\nid: inst-essay\ntitle: Essay\ntype: instance\nstatus: draft\nframework_ids: [fw-tacit]\n---\n",
    );
    write(".loom", "embeddings.json", "{\"inst-essay\": [0.1, 0.");

    let store = MarkdownStore::new(temp.path());
    let docs = store.all_documents().await.unwrap();
    let embeddings = embeddings_or_empty(&store).await;
    assert!(embeddings.is_empty());

    let request = ViewRequest::new(W, H)
        .focus("inst-essay")
        .with_embeddings(&embeddings);
    let view = compose_constellation(
        &docs,
        &request,
        &CapacityConfig::default(),
        &LayoutConfig::default(),
    );
    assert_eq!(
        view.categories.category_of("fw-tacit"),
        Some(SemanticCategory::ToolkitParent)
    );
    assert_eq!(view.nodes.len(), 2);
}
