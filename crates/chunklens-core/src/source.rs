//! Rendered-document sources.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// HTML of a rendered document and the fully-qualified URLs of its images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    pub html: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("document {0:?} not found")]
    NotFound(String),

    #[error("invalid document id {0:?}")]
    InvalidId(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid image list {path}: {source}")]
    Images {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub trait ContentSource: Send + Sync {
    /// Fetch the rendered document for `document_id`.
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<RenderedDocument, SourceError>>;
}

/// Reads `<root>/<id>.html` and, when present, `<root>/<id>.images.json` (a JSON array of URLs).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, document_id: &str, suffix: &str) -> Result<PathBuf, SourceError> {
        let valid = !document_id.is_empty()
            && !document_id.contains(['/', '\\'])
            && document_id != "."
            && document_id != "..";
        if !valid {
            return Err(SourceError::InvalidId(document_id.to_owned()));
        }
        Ok(self.root.join(format!("{document_id}{suffix}")))
    }

    async fn read(&self, document_id: &str) -> Result<RenderedDocument, SourceError> {
        let html_path = self.path_for(document_id, ".html")?;
        let html = match tokio::fs::read_to_string(&html_path).await {
            Ok(html) => html,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(document_id.to_owned()));
            }
            Err(source) => {
                return Err(SourceError::Io {
                    path: html_path,
                    source,
                });
            }
        };

        let images_path = self.path_for(document_id, ".images.json")?;
        let images = match tokio::fs::read_to_string(&images_path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| SourceError::Images {
                path: images_path,
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(SourceError::Io {
                    path: images_path,
                    source,
                });
            }
        };

        tracing::debug!(document_id, bytes = html.len(), images = images.len(), "read document");
        Ok(RenderedDocument { html, images })
    }
}

impl ContentSource for DirectorySource {
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<RenderedDocument, SourceError>> {
        Box::pin(self.read(document_id))
    }
}

/// Process-local source, mostly for tests.
#[derive(Debug, Default)]
pub struct MemorySource {
    documents: RwLock<HashMap<String, RenderedDocument>>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, document_id: impl Into<String>, document: RenderedDocument) {
        let mut documents = self
            .documents
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        documents.insert(document_id.into(), document);
    }
}

impl ContentSource for MemorySource {
    fn fetch<'a>(&'a self, document_id: &'a str) -> BoxFuture<'a, Result<RenderedDocument, SourceError>> {
        let found = self
            .documents
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(document_id)
            .cloned();
        Box::pin(async move { found.ok_or_else(|| SourceError::NotFound(document_id.to_owned())) })
    }
}
