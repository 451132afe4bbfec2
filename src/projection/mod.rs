//! Spatial projection of document embeddings.
//!
//! ```text
//! embeddings ──► fingerprint ──► stale? ──no──► cached coords
//!                                  │
//!                                 yes
//!                                  ▼
//!             umap::project ─► normalize ─► relax ─► renormalize ─► cache
//! ```
//!
//! Output coordinates are normalized to the unit square; callers scale them
//! to their own canvas.

pub mod cache;
pub mod fingerprint;
pub mod relax;
pub mod umap;

pub use cache::ProjectionCache;
pub use fingerprint::Fingerprint;
pub use relax::RelaxConfig;
pub use umap::ManifoldConfig;

use crate::similarity::EmbeddingMap;
use crate::store::{embeddings_or_empty, CachedCoordinate, KnowledgeStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// A projected position in the unit square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl From<&CachedCoordinate> for ProjectedPoint {
    fn from(coord: &CachedCoordinate) -> Self {
        Self {
            x: coord.x,
            y: coord.y,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub manifold: ManifoldConfig,
    pub relaxation: RelaxConfig,
}

/// Counters for observing cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectorStats {
    /// Full projections run.
    pub computed: usize,
    /// Calls answered from the in-memory cache.
    pub cache_hits: usize,
    /// Times persisted coordinates were adopted instead of computing.
    pub adopted: usize,
}

/// Embedding → 2D projector with an owned staleness cache.
///
/// Not safe for concurrent use; callers serialize access (`&mut self`).
#[derive(Debug, Clone, Default)]
pub struct SpatialProjector {
    config: ProjectionConfig,
    cache: ProjectionCache,
    stats: ProjectorStats,
}

impl SpatialProjector {
    pub fn new(config: ProjectionConfig) -> Self {
        Self::with_cache(config, ProjectionCache::new())
    }

    /// Projector over an existing cache, e.g. one per knowledge domain.
    pub fn with_cache(config: ProjectionConfig, cache: ProjectionCache) -> Self {
        Self {
            config,
            cache,
            stats: ProjectorStats::default(),
        }
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    pub fn cache(&self) -> &ProjectionCache {
        &self.cache
    }

    pub fn into_cache(self) -> ProjectionCache {
        self.cache
    }

    pub fn stats(&self) -> ProjectorStats {
        self.stats
    }

    pub fn is_stale(&self, embeddings: &EmbeddingMap) -> bool {
        self.cache.is_stale(&Fingerprint::of(embeddings))
    }

    /// Project `embeddings` to the unit square, reusing the cached result
    /// while the fingerprint is unchanged.
    ///
    /// Fewer than two embeddings yield an empty map and leave the cache as
    /// it was.
    pub fn project(&mut self, embeddings: &EmbeddingMap) -> BTreeMap<String, ProjectedPoint> {
        let fingerprint = Fingerprint::of(embeddings);
        if !self.cache.is_stale(&fingerprint) {
            if let Some(coords) = self.cache.coords() {
                debug!(%fingerprint, "projection cache hit");
                self.stats.cache_hits += 1;
                return coords.clone();
            }
        }

        if embeddings.len() < 2 {
            warn!(
                count = embeddings.len(),
                "need at least 2 embeddings for a spatial projection"
            );
            return BTreeMap::new();
        }

        let started = Instant::now();
        let ids: Vec<&String> = embeddings.keys().collect();
        let vectors: Vec<Vec<f32>> = embeddings.values().cloned().collect();

        let mut points = umap::project(&vectors, &self.config.manifold);
        relax::renormalize(&mut points, 0.0);

        let relaxation = &self.config.relaxation;
        let (width, height) = relaxation.virtual_canvas(points.len());
        relax::relax(&mut points, width, height, relaxation);
        relax::renormalize(&mut points, relaxation.edge_padding);

        let coords: BTreeMap<String, ProjectedPoint> = ids
            .into_iter()
            .zip(points)
            .map(|(id, [x, y])| (id.clone(), ProjectedPoint { x, y }))
            .collect();

        info!(
            nodes = coords.len(),
            canvas_width = width.round(),
            canvas_height = height.round(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "computed spatial projection"
        );

        self.cache.store(fingerprint, coords.clone());
        self.stats.computed += 1;
        coords
    }

    /// Coordinates for everything `store` holds embeddings for.
    ///
    /// Store failures degrade to an empty map. When this projector has not
    /// computed anything yet, persisted coordinates are adopted if their
    /// count matches the embedding count and there are at least two
    /// embeddings to project.
    #[instrument(skip(self, store))]
    pub async fn coordinates<S>(&mut self, store: &S) -> BTreeMap<String, ProjectedPoint>
    where
        S: KnowledgeStore + ?Sized,
    {
        let embeddings = embeddings_or_empty(store).await;

        if !self.cache.has_fingerprint() {
            if let Some(adopted) = self.adopt_persisted(store, &embeddings).await {
                return adopted;
            }
        }

        self.project_and_persist(store, &embeddings).await
    }

    /// Drop the cache and project from scratch, ignoring persisted
    /// coordinates.
    #[instrument(skip(self, store))]
    pub async fn recompute<S>(&mut self, store: &S) -> BTreeMap<String, ProjectedPoint>
    where
        S: KnowledgeStore + ?Sized,
    {
        self.cache.clear();
        let embeddings = embeddings_or_empty(store).await;
        self.project_and_persist(store, &embeddings).await
    }

    async fn adopt_persisted<S>(
        &mut self,
        store: &S,
        embeddings: &EmbeddingMap,
    ) -> Option<BTreeMap<String, ProjectedPoint>>
    where
        S: KnowledgeStore + ?Sized,
    {
        let persisted = match store.cached_coordinates().await {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(error = %e, "cached coordinates unavailable");
                return None;
            }
        };
        if embeddings.len() < 2 || persisted.len() != embeddings.len() {
            return None;
        }

        let coords: BTreeMap<String, ProjectedPoint> = persisted
            .iter()
            .map(|(id, coord)| (id.clone(), ProjectedPoint::from(coord)))
            .collect();
        debug!(count = coords.len(), "adopted persisted coordinates");
        self.cache.store(Fingerprint::of(embeddings), coords.clone());
        self.stats.adopted += 1;
        Some(coords)
    }

    async fn project_and_persist<S>(
        &mut self,
        store: &S,
        embeddings: &EmbeddingMap,
    ) -> BTreeMap<String, ProjectedPoint>
    where
        S: KnowledgeStore + ?Sized,
    {
        let computed_before = self.stats.computed;
        let coords = self.project(embeddings);
        if self.stats.computed == computed_before || coords.is_empty() {
            return coords;
        }

        let updated_at = Utc::now();
        let rows = coords
            .iter()
            .map(|(id, p)| CachedCoordinate {
                doc_id: id.clone(),
                x: p.x,
                y: p.y,
                updated_at,
            })
            .collect();
        if let Err(e) = store.replace_cached_coordinates(rows).await {
            warn!(error = %e, "failed to persist coordinates");
        }
        coords
    }
}
