//! Disk-backed store: one JSON document file per collection.
//!
//! Collections are loaded whole at open and written through on every
//! mutation, via a temp file and rename so a crash cannot truncate a
//! collection file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use biji_core::{Error, Result};

use crate::collection::Collection;
use crate::store::{Document, RecordStore};

/// Disk-backed [`RecordStore`] rooted at a data directory.
pub struct DiskStore {
    dir: PathBuf,
    collections: RwLock<HashMap<String, Collection>>,
}

fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::Store(format!("invalid collection name: {name:?}")));
    }
    Ok(())
}

impl DiskStore {
    /// Open (or create) a store directory, loading every `*.json` collection.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let mut collections = HashMap::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match Self::load_collection(&path).await {
                Ok(docs) => {
                    debug!(collection = name, count = docs.len(), "store: loaded collection");
                    collections.insert(name.to_string(), Collection::from_docs(docs));
                }
                Err(e) => {
                    warn!(collection = name, error = %e, "store: skipping unreadable collection file");
                }
            }
        }

        Ok(Self {
            dir,
            collections: RwLock::new(collections),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn load_collection(path: &Path) -> Result<Vec<Document>> {
        let bytes = fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn persist(&self, name: &str, collection: &Collection) -> Result<()> {
        let path = self.dir.join(format!("{name}.json"));
        let tmp = self.dir.join(format!("{name}.json.tmp"));
        let bytes = serde_json::to_vec(collection.docs())?;
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for DiskStore {
    async fn upsert(
        &self,
        collection: &str,
        note_id: &str,
        doc: Document,
        observed_at: i64,
    ) -> Result<()> {
        validate_collection_name(collection)?;
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        entry.upsert(note_id, doc, observed_at);
        self.persist(collection, entry).await
    }

    async fn append(&self, collection: &str, doc: Document, observed_at: i64) -> Result<()> {
        validate_collection_name(collection)?;
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        entry.append(doc, observed_at);
        self.persist(collection, entry).await
    }

    async fn find(&self, collection: &str, note_id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.find(note_id))
            .cloned())
    }

    async fn all(&self, collection: &str) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| c.docs().to_vec())
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, Collection::len))
    }
}
