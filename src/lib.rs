//! Relationship graph and spatial layout engine for a typed knowledge base.
//!
//! Given a set of documents (frameworks, instances, notes, sources, indexes)
//! linked by lineage references, this crate answers "what is this document
//! related to, and where should it sit on screen".
//!
//! # Architecture
//!
//! ```text
//! KnowledgeStore ──► Documents ──► Lens ──► Classifier ──► Capacity ──► Layout
//!       │                                        │                         │
//!       │                                        └── tethers, formula ─────┤
//!       │                                                                  ▼
//!       │                                                           Constellation
//!       │
//!       └──────────► Embeddings ──► Similarity index (related documents)
//!                        │
//!                        └──► SpatialProjector (UMAP + collision relax, cached)
//! ```
//!
//! # Key Concepts
//!
//! - **Focus**: the document being viewed; every category is relative to it
//! - **Lens**: a named filter/sort pair applied before classification
//! - **Category**: one of eight mutually exclusive relationship buckets
//! - **Capacity band**: small/medium/large sizing of per-category limits
//! - **Fingerprint**: cheap staleness hash over the embedding set
//!
//! # Example
//!
//! ```ignore
//! use loomlib::{compose_constellation, LoomConfig, ViewRequest};
//!
//! let config = LoomConfig::default();
//! let request = ViewRequest::new(1200.0, 800.0).focus("inst-1");
//! let view = compose_constellation(&docs, &request, &config.capacity, &config.layout);
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod projection;
pub mod similarity;
pub mod store;

pub use config::{LoomConfig, SimilarityConfig};
pub use document::{
    resolve_lineage, resolve_parents, Document, DocumentStatus, DocumentType, FrameworkKind,
    Lineage, LineageRef, RelationKind,
};
pub use error::{ConfigError, LoomError, StoreError};
pub use graph::{
    apply_lens, classify, classify_legacy, compose_constellation, compute_edges, compute_layers,
    compute_visible, layout, layout_with, page_info, scroll_offset, CapacityBand, CapacityConfig,
    Categorized, Category, Constellation, DepthLayer, Edge, LayoutConfig, Lens, LensId,
    LensRegistry, PageInfo, RelationshipCategory, SemanticCategory, ViewRequest,
};
pub use projection::{
    Fingerprint, ProjectedPoint, ProjectionCache, ProjectionConfig, ProjectorStats,
    SpatialProjector,
};
pub use similarity::{
    cosine_similarity, find_most_similar, semantic_siblings, EmbeddingMap, ScoredId, SiblingMode,
    Siblings,
};
pub use store::{
    embeddings_or_empty, CachedCoordinate, InMemoryStore, KnowledgeStore, MarkdownStore,
};
