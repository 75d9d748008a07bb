//! Persistent on-disk document cache.
//!
//! One JSON file per document under `<dir>/<collection>/<doc_id>.json`.
//! Writes go to a uniquely named temp file and are renamed into place, so
//! several processes of the same app can share one cache directory without
//! ever observing a torn file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::{FirestoreError, FirestoreResult};
use crate::types::Document;

/// File-backed cache of the last known server state of documents.
#[derive(Debug)]
pub struct PersistentCache {
    dir: PathBuf,
    seq: AtomicU64,
}

impl PersistentCache {
    /// Open (and create if needed) a cache rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> FirestoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| FirestoreError::Cache(format!("{}: {}", dir.display(), e)))?;

        debug!(dir = %dir.display(), "Opened persistent document cache");
        Ok(Self {
            dir,
            seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, collection: &str, doc_id: &str) -> PathBuf {
        self.dir
            .join(urlencoding::encode(collection).as_ref())
            .join(format!("{}.json", urlencoding::encode(doc_id)))
    }

    /// Cached copy of a document, if any.
    ///
    /// Unreadable or corrupt entries count as misses.
    pub async fn get(&self, collection: &str, doc_id: &str) -> Option<Document> {
        let path = self.entry_path(collection, doc_id);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(doc) => Some(doc),
            Err(e) => {
                debug!(path = %path.display(), "Ignoring corrupt cache entry: {}", e);
                None
            }
        }
    }

    /// Store the server copy of a document.
    pub async fn put(&self, collection: &str, doc_id: &str, doc: &Document) -> FirestoreResult<()> {
        let path = self.entry_path(collection, doc_id);
        let parent = path
            .parent()
            .ok_or_else(|| FirestoreError::Cache(format!("{} has no parent", path.display())))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FirestoreError::Cache(e.to_string()))?;

        let tmp = parent.join(format!(
            ".{}.{}.{}.tmp",
            std::process::id(),
            self.seq.fetch_add(1, Ordering::Relaxed),
            urlencoding::encode(doc_id)
        ));

        let bytes = serde_json::to_vec(doc)?;
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| FirestoreError::Cache(e.to_string()))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(FirestoreError::Cache(e.to_string()));
        }
        Ok(())
    }

    /// Forget a document. Missing entries are fine.
    pub async fn remove(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        match tokio::fs::remove_file(self.entry_path(collection, doc_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FirestoreError::Cache(e.to_string())),
        }
    }
}
