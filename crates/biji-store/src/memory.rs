//! In-memory store for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use biji_core::Result;

use crate::collection::Collection;
use crate::store::{Document, RecordStore};

/// In-memory [`RecordStore`].
///
/// The collection map lock is held only for the duration of the in-memory
/// mutation, which is what enforces single-writer access per identity key.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert(
        &self,
        collection: &str,
        note_id: &str,
        doc: Document,
        observed_at: i64,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .upsert(note_id, doc, observed_at);
        Ok(())
    }

    async fn append(&self, collection: &str, doc: Document, observed_at: i64) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .append(doc, observed_at);
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(title: &str) -> Document {
        let mut map = Document::new();
        map.insert("title".to_string(), json!(title));
        map
    }

    #[tokio::test]
    async fn test_upsert_then_update() {
        let store = MemoryStore::new();
        store.upsert("notes", "n1", doc("A"), 100).await.unwrap();
        store.upsert("notes", "n1", doc("B"), 200).await.unwrap();

        let stored = store.find("notes", "n1").await.unwrap().unwrap();
        assert_eq!(stored["title"], "B");
        assert_eq!(stored["_created_at"], 100);
        assert_eq!(stored["_ts"], 200);
        assert_eq!(store.count("notes").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_collection_reads_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.count("nope").await.unwrap(), 0);
        assert!(store.all("nope").await.unwrap().is_empty());
        assert!(store.find("nope", "n1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_upserts_distinct_keys() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..32 {
            let store = store.clone();
            tasks.spawn(async move {
                let id = format!("n{i}");
                store.upsert("notes", &id, doc(&id), 100).await.unwrap();
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap();
        }
        assert_eq!(store.count("notes").await.unwrap(), 32);
    }
}
