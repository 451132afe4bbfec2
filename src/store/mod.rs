//! Persistence port.
//!
//! The engine only reads documents, embeddings and cached coordinates, and
//! writes back a freshly computed coordinate set. Everything else about
//! storage (document CRUD, the embedding service) lives behind this trait.

mod markdown;
mod memory;

pub use markdown::MarkdownStore;
pub use memory::InMemoryStore;

use crate::document::Document;
use crate::error::StoreError;
use crate::similarity::EmbeddingMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub type Result<T> = std::result::Result<T, StoreError>;

/// A persisted projected coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedCoordinate {
    pub doc_id: String,
    pub x: f64,
    pub y: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Read/write access to a knowledge base.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Every document, in a stable order.
    async fn all_documents(&self) -> Result<Vec<Document>>;

    /// Document id -> embedding vector. Documents without one are absent.
    async fn all_embeddings(&self) -> Result<EmbeddingMap>;

    /// Coordinates persisted by the last projection.
    async fn cached_coordinates(&self) -> Result<BTreeMap<String, CachedCoordinate>>;

    /// Replace the whole persisted coordinate set.
    async fn replace_cached_coordinates(&self, coords: Vec<CachedCoordinate>) -> Result<()>;
}

/// Embeddings held by `store`, or an empty map when they cannot be read.
///
/// For callers where embeddings only add to structural results. The read
/// error is logged at `warn`.
pub async fn embeddings_or_empty<S>(store: &S) -> EmbeddingMap
where
    S: KnowledgeStore + ?Sized,
{
    match store.all_embeddings().await {
        Ok(embeddings) => embeddings,
        Err(e) => {
            warn!(error = %e, "embeddings unavailable, continuing without them");
            EmbeddingMap::new()
        }
    }
}
