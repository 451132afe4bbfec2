//! Markdown knowledge base on the local filesystem.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   framework/*.md        one directory per document type
//!   instance/*.md
//!   ...
//!   .loom/embeddings.json { "<doc id>": [f32, ...] }
//!   .loom/coords.json     [CachedCoordinate, ...]
//! ```
//!
//! Each document is a markdown file opening with a YAML frontmatter block.
//! `id`, `title`, `type` and `status` are required; files without them are
//! skipped with a warning rather than failing the whole scan.

use super::{CachedCoordinate, KnowledgeStore, Result};
use crate::document::{
    Document, DocumentStatus, DocumentType, FrameworkKind, LineageRef,
};
use crate::error::StoreError;
use crate::similarity::EmbeddingMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

const STATE_DIR: &str = ".loom";
const EMBEDDINGS_FILE: &str = "embeddings.json";
const COORDS_FILE: &str = "coords.json";
const FRONTMATTER_FENCE: &str = "---";

#[derive(Debug, Deserialize)]
struct Frontmatter {
    id: Option<String>,
    title: Option<String>,
    #[serde(rename = "type")]
    doc_type: Option<DocumentType>,
    status: Option<DocumentStatus>,
    #[serde(default)]
    framework_kind: Option<FrameworkKind>,
    #[serde(default)]
    perspective: Option<String>,
    #[serde(default)]
    framework_ids: Vec<String>,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    created: Option<DateTime<Utc>>,
    #[serde(default)]
    modified: Option<DateTime<Utc>>,
    #[serde(default)]
    upstream: Vec<LineageRef>,
    #[serde(default)]
    downstream: Vec<LineageRef>,
}

/// Split `text` into (frontmatter YAML, body).
fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let rest = text
        .strip_prefix(FRONTMATTER_FENCE)?
        .trim_start_matches([' ', '\t'])
        .strip_prefix('\n')
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONTMATTER_FENCE {
            let body = &rest[offset + line.len()..];
            return Some((&rest[..offset], body.trim_start_matches(['\r', '\n'])));
        }
        offset += line.len();
    }
    None
}

fn invalid(path: &Path, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidDocument {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Parse one markdown document. `fallback` stamps documents whose
/// frontmatter carries no `created` / `modified` timestamps.
pub(crate) fn parse_document(
    path: &Path,
    text: &str,
    fallback: (DateTime<Utc>, DateTime<Utc>),
) -> Result<Document> {
    let (yaml, body) =
        split_frontmatter(text).ok_or_else(|| invalid(path, "missing frontmatter block"))?;
    let fm: Frontmatter = serde_yaml::from_str(yaml)?;

    let id = fm.id.ok_or_else(|| invalid(path, "missing `id`"))?;
    let title = fm.title.ok_or_else(|| invalid(path, "missing `title`"))?;
    let doc_type = fm.doc_type.ok_or_else(|| invalid(path, "missing `type`"))?;
    let status = fm.status.ok_or_else(|| invalid(path, "missing `status`"))?;

    let (created_fallback, modified_fallback) = fallback;
    let created_at = fm.created.unwrap_or(created_fallback);
    let modified_at = fm.modified.unwrap_or(modified_fallback);

    Ok(Document {
        id,
        title,
        content: body.to_string(),
        doc_type,
        framework_kind: fm.framework_kind,
        perspective: fm.perspective,
        framework_ids: fm.framework_ids,
        source_id: fm.source_id,
        output: fm.output,
        domain: fm.domain,
        status,
        tags: fm.tags,
        created_at,
        modified_at,
        upstream: fm.upstream,
        downstream: fm.downstream,
    })
}

/// Markdown directory store.
#[derive(Debug, Clone)]
pub struct MarkdownStore {
    root: PathBuf,
}

impl MarkdownStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn state_path(&self, file: &str) -> PathBuf {
        self.root.join(STATE_DIR).join(file)
    }

    /// Type directories in name order, hidden directories excluded.
    async fn type_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !hidden && entry.file_type().await?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    async fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") && entry.file_type().await?.is_file()
            {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn load_document(path: &Path) -> Result<Document> {
        let text = fs::read_to_string(path).await?;
        let metadata = fs::metadata(path).await?;
        let modified: DateTime<Utc> = metadata.modified()?.into();
        let created: DateTime<Utc> = metadata.created().map(Into::into).unwrap_or(modified);
        parse_document(path, &text, (created, modified))
    }

    async fn read_json_or_default<T>(&self, file: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        let path = self.state_path(file);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "state file absent");
                Ok(T::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KnowledgeStore for MarkdownStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn all_documents(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for dir in self.type_dirs().await? {
            for path in Self::markdown_files(&dir).await? {
                match Self::load_document(&path).await {
                    Ok(doc) => documents.push(doc),
                    Err(e) => warn!(path = %path.display(), error = %e, "skipping document"),
                }
            }
        }
        debug!(count = documents.len(), "loaded documents");
        Ok(documents)
    }

    async fn all_embeddings(&self) -> Result<EmbeddingMap> {
        self.read_json_or_default(EMBEDDINGS_FILE).await
    }

    async fn cached_coordinates(&self) -> Result<BTreeMap<String, CachedCoordinate>> {
        let coords: Vec<CachedCoordinate> = self.read_json_or_default(COORDS_FILE).await?;
        Ok(coords.into_iter().map(|c| (c.doc_id.clone(), c)).collect())
    }

    #[instrument(skip(self, coords), fields(count = coords.len()))]
    async fn replace_cached_coordinates(&self, coords: Vec<CachedCoordinate>) -> Result<()> {
        let path = self.state_path(COORDS_FILE);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&coords)?;
        fs::write(&path, json).await?;
        Ok(())
    }
}
