//! Fingerprint-keyed cache of projected coordinates.

use super::fingerprint::Fingerprint;
use super::ProjectedPoint;
use std::collections::BTreeMap;

/// Coordinates from the last projection plus the fingerprint of the
/// embedding set they were computed from.
///
/// One cache per independent document graph; the projector owns it.
#[derive(Debug, Clone, Default)]
pub struct ProjectionCache {
    fingerprint: Option<Fingerprint>,
    coords: BTreeMap<String, ProjectedPoint>,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn has_fingerprint(&self) -> bool {
        self.fingerprint.is_some()
    }

    /// True when no computation has been recorded, or when `current` differs
    /// in count or content hash from the recorded fingerprint.
    pub fn is_stale(&self, current: &Fingerprint) -> bool {
        match &self.fingerprint {
            None => true,
            Some(recorded) => recorded.count() != current.count() || recorded != current,
        }
    }

    /// Cached coordinates, if any are recorded.
    pub fn coords(&self) -> Option<&BTreeMap<String, ProjectedPoint>> {
        self.fingerprint.as_ref().map(|_| &self.coords)
    }

    pub fn store(&mut self, fingerprint: Fingerprint, coords: BTreeMap<String, ProjectedPoint>) {
        self.fingerprint = Some(fingerprint);
        self.coords = coords;
    }

    /// Forget the fingerprint and coordinates.
    pub fn clear(&mut self) {
        self.fingerprint = None;
        self.coords.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::EmbeddingMap;

    fn fingerprint(first: f32, count: usize) -> Fingerprint {
        let embeddings: EmbeddingMap = (0..count)
            .map(|i| (format!("d{i}"), vec![if i == 0 { first } else { 0.0 }]))
            .collect();
        Fingerprint::of(&embeddings)
    }

    #[test]
    fn test_empty_cache_is_stale() {
        let cache = ProjectionCache::new();
        assert!(cache.is_stale(&fingerprint(0.5, 2)));
        assert!(cache.coords().is_none());
    }

    #[test]
    fn test_store_then_fresh() {
        let mut cache = ProjectionCache::new();
        let coords = BTreeMap::from([("d0".to_string(), ProjectedPoint { x: 0.1, y: 0.2 })]);
        cache.store(fingerprint(0.5, 2), coords.clone());

        assert!(!cache.is_stale(&fingerprint(0.5, 2)));
        assert!(cache.is_stale(&fingerprint(0.6, 2)));
        assert!(cache.is_stale(&fingerprint(0.5, 3)));
        assert_eq!(cache.coords(), Some(&coords));

        cache.clear();
        assert!(!cache.has_fingerprint());
        assert!(cache.is_stale(&fingerprint(0.5, 2)));
    }
}
