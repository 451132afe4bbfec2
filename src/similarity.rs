//! Cosine similarity and nearest-neighbour ranking over document embeddings.

use crate::document::{resolve_lineage, serialize_doc_ids, Document};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Document id -> embedding vector.
///
/// Ordered so that iteration (and therefore tie-breaking) is deterministic.
pub type EmbeddingMap = BTreeMap<String, Vec<f32>>;

/// Default number of neighbours returned by [`find_most_similar`] callers.
pub const DEFAULT_SIMILAR_LIMIT: usize = 6;

/// Cosine similarity in `[-1, 1]`.
///
/// Returns 0 for mismatched lengths, empty vectors, zero vectors and vectors
/// holding NaN or infinite components.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() || !dot.is_finite() {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

/// One ranked neighbour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredId {
    pub id: String,
    pub score: f64,
}

/// Top `limit` neighbours of `target` by descending cosine similarity.
///
/// Never returns `target_id` or any id in `exclude`. Ties keep map order.
pub fn find_most_similar(
    target_id: &str,
    target: &[f32],
    all: &EmbeddingMap,
    exclude: &HashSet<&str>,
    limit: usize,
) -> Vec<ScoredId> {
    let mut scores: Vec<ScoredId> = all
        .iter()
        .filter(|(id, _)| id.as_str() != target_id && !exclude.contains(id.as_str()))
        .map(|(id, vector)| ScoredId {
            id: id.clone(),
            score: cosine_similarity(target, vector),
        })
        .collect();

    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores.truncate(limit);
    scores
}

// =============================================================================
// RELATED DOCUMENTS
// =============================================================================

/// How a sibling list was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SiblingMode {
    Semantic,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct Siblings<'a> {
    pub mode: SiblingMode,
    #[serde(serialize_with = "serialize_doc_ids")]
    pub documents: Vec<&'a Document>,
}

/// "Related documents" for a focus, independent of the structural classifier.
///
/// Excludes the focus and its direct lineage in both directions. Uses
/// embedding similarity when the focus has a vector; otherwise (or when no
/// neighbour resolves to a known document) matches on output channel or
/// perspective.
pub fn semantic_siblings<'a>(
    docs: &'a [Document],
    focus: &Document,
    embeddings: &EmbeddingMap,
    limit: usize,
) -> Siblings<'a> {
    let mut exclude: HashSet<&str> = resolve_lineage(focus).parents().into_iter().collect();
    exclude.insert(focus.id.as_str());
    for doc in docs {
        if resolve_lineage(doc).contains(&focus.id) || focus.lists_downstream(&doc.id) {
            exclude.insert(doc.id.as_str());
        }
    }

    if let Some(target) = embeddings.get(&focus.id) {
        if embeddings.len() > 1 {
            let ranked = find_most_similar(&focus.id, target, embeddings, &exclude, limit);
            let found: Vec<&Document> = ranked
                .iter()
                .filter_map(|s| docs.iter().find(|d| d.id == s.id))
                .collect();
            if !found.is_empty() {
                return Siblings {
                    mode: SiblingMode::Semantic,
                    documents: found,
                };
            }
        }
    }

    let documents = docs
        .iter()
        .filter(|d| !exclude.contains(d.id.as_str()))
        .filter(|d| {
            let same_output = focus.output.is_some() && d.output == focus.output;
            let same_perspective = focus.perspective.is_some() && d.perspective == focus.perspective;
            same_output || same_perspective
        })
        .take(limit)
        .collect();

    Siblings {
        mode: SiblingMode::Fallback,
        documents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentType;
    use proptest::prelude::*;

    fn map(entries: &[(&str, &[f32])]) -> EmbeddingMap {
        entries
            .iter()
            .map(|(id, v)| (id.to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn test_cosine_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[3.0, 4.0], &[3.0, 4.0]) - 1.0).abs() < 1e-9);
        assert!((cosine_similarity(&[3.0, 4.0], &[-3.0, -4.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_non_finite_components_score_zero() {
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::INFINITY, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[f32::NEG_INFINITY, 2.0]), 0.0);
    }

    #[test]
    fn test_find_most_similar_ranks_corrupt_vectors_last() {
        let all = map(&[
            ("bad", &[f32::NAN, 1.0]),
            ("big", &[f32::INFINITY, 0.0]),
            ("near", &[0.9, 0.1]),
            ("side", &[0.5, 0.5]),
        ]);
        let ranked = find_most_similar("x", &[1.0, 0.0], &all, &HashSet::new(), 4);
        let ids: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "side", "bad", "big"]);
        assert!(ranked.iter().all(|s| s.score.is_finite()));
    }

    #[test]
    fn test_find_most_similar_ranks_and_excludes() {
        let all = map(&[
            ("a", &[1.0, 0.0]),
            ("b", &[0.9, 0.1]),
            ("c", &[0.0, 1.0]),
            ("d", &[0.7, 0.7]),
            ("e", &[1.0, 0.0]),
        ]);
        let exclude: HashSet<&str> = ["e"].into_iter().collect();
        let ranked = find_most_similar("a", &[1.0, 0.0], &all, &exclude, 2);
        let ids: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);
    }

    #[test]
    fn test_find_most_similar_ties_keep_map_order() {
        let all = map(&[("z", &[1.0]), ("m", &[1.0]), ("a", &[1.0])]);
        let ranked = find_most_similar("x", &[2.0], &all, &HashSet::new(), 10);
        let ids: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_semantic_siblings_excludes_lineage() {
        let docs = vec![
            Document::new("fw", "Fw", DocumentType::Framework),
            Document::new("focus", "Focus", DocumentType::Instance).with_frameworks(["fw"]),
            Document::new("kid", "Kid", DocumentType::Note).with_source("focus"),
            Document::new("near", "Near", DocumentType::Note),
            Document::new("far", "Far", DocumentType::Note),
        ];
        let embeddings = map(&[
            ("fw", &[1.0, 0.0]),
            ("focus", &[1.0, 0.0]),
            ("kid", &[1.0, 0.0]),
            ("near", &[0.8, 0.2]),
            ("far", &[0.0, 1.0]),
        ]);
        let siblings = semantic_siblings(&docs, &docs[1], &embeddings, 6);
        assert_eq!(siblings.mode, SiblingMode::Semantic);
        let ids: Vec<&str> = siblings.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
    }

    #[test]
    fn test_semantic_siblings_structural_fallback() {
        let docs = vec![
            Document::new("focus", "Focus", DocumentType::Note).with_output("essay"),
            Document::new("same", "Same", DocumentType::Note).with_output("essay"),
            Document::new("other", "Other", DocumentType::Note).with_output("talk"),
        ];
        let siblings = semantic_siblings(&docs, &docs[0], &EmbeddingMap::new(), 6);
        assert_eq!(siblings.mode, SiblingMode::Fallback);
        assert_eq!(siblings.documents.len(), 1);
        assert_eq!(siblings.documents[0].id, "same");
    }

    fn non_zero_vector() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-100.0f32..100.0, 1..16)
            .prop_filter("needs a usable norm", |v| {
                v.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>() > 1e-6
            })
    }

    proptest! {
        #[test]
        fn prop_cosine_with_itself_is_one(v in non_zero_vector()) {
            prop_assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        }

        #[test]
        fn prop_cosine_with_negation_is_minus_one(v in non_zero_vector()) {
            let negated: Vec<f32> = v.iter().map(|x| -x).collect();
            prop_assert!((cosine_similarity(&v, &negated) + 1.0).abs() < 1e-6);
        }

        #[test]
        fn prop_cosine_symmetric(
            a in prop::collection::vec(-100.0f32..100.0, 1..16),
            b in prop::collection::vec(-100.0f32..100.0, 1..16),
        ) {
            prop_assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
            let s = cosine_similarity(&a, &b);
            prop_assert!((-1.0..=1.0).contains(&s));
        }

        #[test]
        fn prop_most_similar_sorted_and_exclusive(
            vectors in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 3), 2..20),
            limit in 0usize..10,
        ) {
            let all: EmbeddingMap = vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("d{i:02}"), v.clone()))
                .collect();
            let exclude: HashSet<&str> = ["d01"].into_iter().collect();
            let ranked = find_most_similar("d00", &vectors[0], &all, &exclude, limit);

            prop_assert!(ranked.len() <= limit);
            prop_assert!(ranked.iter().all(|s| s.id != "d00" && s.id != "d01"));
            prop_assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }
}
