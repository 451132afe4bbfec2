//! In-memory knowledge store (tests and embedders).

use super::{CachedCoordinate, KnowledgeStore, Result};
use crate::document::Document;
use crate::error::StoreError;
use crate::similarity::EmbeddingMap;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    documents: Vec<Document>,
    embeddings: EmbeddingMap,
    coords: BTreeMap<String, CachedCoordinate>,
}

/// Cloneable handle; clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
    embeddings_unsupported: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    coordinate_writes: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        let store = Self::default();
        if let Ok(mut inner) = store.inner.try_write() {
            inner.documents = documents;
        }
        store
    }

    pub async fn put_document(&self, document: Document) {
        let mut inner = self.inner.write().await;
        match inner.documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => inner.documents.push(document),
        }
    }

    pub async fn put_embedding(&self, doc_id: impl Into<String>, vector: Vec<f32>) {
        self.inner
            .write()
            .await
            .embeddings
            .insert(doc_id.into(), vector);
    }

    /// Simulate a backing store that predates embedding support.
    pub fn set_embeddings_unsupported(&self, unsupported: bool) {
        self.embeddings_unsupported
            .store(unsupported, Ordering::SeqCst);
    }

    /// Make coordinate writes fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of coordinate replacement attempts.
    pub fn coordinate_writes(&self) -> usize {
        self.coordinate_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn all_documents(&self) -> Result<Vec<Document>> {
        Ok(self.inner.read().await.documents.clone())
    }

    async fn all_embeddings(&self) -> Result<EmbeddingMap> {
        if self.embeddings_unsupported.load(Ordering::SeqCst) {
            return Err(StoreError::Unsupported("embeddings"));
        }
        Ok(self.inner.read().await.embeddings.clone())
    }

    async fn cached_coordinates(&self) -> Result<BTreeMap<String, CachedCoordinate>> {
        if self.embeddings_unsupported.load(Ordering::SeqCst) {
            return Err(StoreError::Unsupported("coordinates"));
        }
        Ok(self.inner.read().await.coords.clone())
    }

    async fn replace_cached_coordinates(&self, coords: Vec<CachedCoordinate>) -> Result<()> {
        self.coordinate_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("coordinate write rejected".into()));
        }
        let mut inner = self.inner.write().await;
        inner.coords = coords.into_iter().map(|c| (c.doc_id.clone(), c)).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentType;
    use chrono::Utc;

    #[tokio::test]
    async fn test_documents_and_embeddings() {
        let store = InMemoryStore::with_documents(vec![Document::new(
            "a",
            "A",
            DocumentType::Note,
        )]);
        store
            .put_document(Document::new("b", "B", DocumentType::Note))
            .await;
        store.put_embedding("a", vec![1.0, 0.0]).await;

        let docs = store.all_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        let embeddings = store.all_embeddings().await.unwrap();
        assert_eq!(embeddings["a"], vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_replace_coordinates() {
        let store = InMemoryStore::new();
        let coord = CachedCoordinate {
            doc_id: "a".into(),
            x: 0.5,
            y: 0.25,
            updated_at: Utc::now(),
        };
        store
            .replace_cached_coordinates(vec![coord.clone()])
            .await
            .unwrap();
        assert_eq!(store.cached_coordinates().await.unwrap()["a"], coord);

        store.replace_cached_coordinates(Vec::new()).await.unwrap();
        assert!(store.cached_coordinates().await.unwrap().is_empty());
        assert_eq!(store.coordinate_writes(), 2);
    }

    #[tokio::test]
    async fn test_failure_toggles() {
        let store = InMemoryStore::new();
        store.set_embeddings_unsupported(true);
        assert!(matches!(
            store.all_embeddings().await,
            Err(StoreError::Unsupported(_))
        ));

        store.set_fail_writes(true);
        assert!(store.replace_cached_coordinates(Vec::new()).await.is_err());
    }
}
