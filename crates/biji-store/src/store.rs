//! Store trait and record routing.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use biji_core::{now_epoch, CollectionNames, Error, Record, RecordKind, RecordSink, Result};

/// A stored document: one flat JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Idempotent document store keyed by `(collection, note_id)`.
///
/// Upserts to the same identity key serialize inside the implementation;
/// repeated crawls converge on one document per identity instead of
/// duplicating.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert-if-absent-else-update-in-place by identity key.
    ///
    /// On insert both `_created_at` and `_ts` are set to `observed_at`; on
    /// update the incoming fields replace the stored ones, `_ts` becomes
    /// `observed_at`, and the original `_created_at` is preserved.
    async fn upsert(
        &self,
        collection: &str,
        note_id: &str,
        doc: Document,
        observed_at: i64,
    ) -> Result<()>;

    /// Insert-only, for documents without an identity.
    async fn append(&self, collection: &str, doc: Document, observed_at: i64) -> Result<()>;

    /// Look up a document by identity key.
    async fn find(&self, collection: &str, note_id: &str) -> Result<Option<Document>>;

    /// All documents of a collection, in insertion order.
    async fn all(&self, collection: &str) -> Result<Vec<Document>>;

    /// Number of documents in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Routes crawl records into store collections.
///
/// `kind=note` and `kind=link_detail` records with a non-empty identity are
/// upserted into their dedicated collections; everything else is appended to
/// the catch-all collection.
pub struct StoreSink {
    store: Arc<dyn RecordStore>,
    collections: CollectionNames,
}

impl StoreSink {
    pub fn new(store: Arc<dyn RecordStore>, collections: CollectionNames) -> Self {
        Self { store, collections }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }
}

fn to_document(record: &Record) -> Result<Document> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Store(format!(
            "record serialized to non-object: {other}"
        ))),
    }
}

#[async_trait]
impl RecordSink for StoreSink {
    async fn emit(&self, record: Record) -> Result<()> {
        let now = now_epoch();
        let doc = to_document(&record)?;

        let note_id = record.note_id().filter(|id| !id.is_empty());
        let collection = match (record.kind(), note_id) {
            (RecordKind::Note, Some(id)) => {
                trace!(note_id = id, "store: upsert note");
                return self.store.upsert(&self.collections.notes, id, doc, now).await;
            }
            (RecordKind::LinkDetail, Some(id)) => {
                trace!(note_id = id, "store: upsert link detail");
                return self
                    .store
                    .upsert(&self.collections.details, id, doc, now)
                    .await;
            }
            _ => &self.collections.misc,
        };

        trace!(collection = %collection, "store: append record without identity");
        self.store.append(collection, doc, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use serde_json::json;

    fn sink(store: Arc<MemoryStore>) -> StoreSink {
        StoreSink::new(store, CollectionNames::default())
    }

    #[tokio::test]
    async fn test_routing_three_kinds_three_collections() {
        let store = Arc::new(MemoryStore::new());
        let sink = sink(store.clone());

        sink.emit(Record::Note {
            note_id: Some("n1".to_string()),
            raw: json!({"id": "n1"}),
        })
        .await
        .unwrap();
        sink.emit(Record::LinkDetail {
            note_id: Some("n1".to_string()),
            title: "t".to_string(),
            web_title: String::new(),
            url: String::new(),
            has_content: false,
            raw: json!({}),
        })
        .await
        .unwrap();
        sink.emit(Record::Other {
            note_id: None,
            raw: json!({"x": 1}),
        })
        .await
        .unwrap();

        assert_eq!(store.count("notes").await.unwrap(), 1);
        assert_eq!(store.count("details").await.unwrap(), 1);
        assert_eq!(store.count("misc").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_note_without_identity_goes_to_misc() {
        let store = Arc::new(MemoryStore::new());
        let sink = sink(store.clone());

        sink.emit(Record::Note {
            note_id: None,
            raw: json!({"body": "orphan"}),
        })
        .await
        .unwrap();
        sink.emit(Record::Note {
            note_id: Some(String::new()),
            raw: json!({"body": "empty id"}),
        })
        .await
        .unwrap();

        assert_eq!(store.count("notes").await.unwrap(), 0);
        assert_eq!(store.count("misc").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_repeated_emit_converges() {
        let store = Arc::new(MemoryStore::new());
        let sink = sink(store.clone());

        for body in ["first", "second"] {
            sink.emit(Record::Note {
                note_id: Some("n1".to_string()),
                raw: json!({"id": "n1", "body": body}),
            })
            .await
            .unwrap();
        }

        assert_eq!(store.count("notes").await.unwrap(), 1);
        let doc = store.find("notes", "n1").await.unwrap().unwrap();
        assert_eq!(doc["raw"]["body"], "second");
    }
}
