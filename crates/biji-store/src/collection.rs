//! In-memory collection with upsert-by-identity semantics.

use std::collections::HashMap;

use serde_json::Value;

use crate::store::Document;

/// Ordered set of documents with an identity index for keyed upserts.
///
/// Documents keep insertion order; keyed documents are additionally indexed
/// by their `note_id` so an upsert updates in place instead of appending.
#[derive(Debug, Default)]
pub(crate) struct Collection {
    docs: Vec<Document>,
    index: HashMap<String, usize>,
}

impl Collection {
    /// Rebuild a collection (and its identity index) from loaded documents.
    pub fn from_docs(docs: Vec<Document>) -> Self {
        let mut index = HashMap::new();
        for (pos, doc) in docs.iter().enumerate() {
            if let Some(Value::String(id)) = doc.get("note_id") {
                if !id.is_empty() {
                    index.insert(id.clone(), pos);
                }
            }
        }
        Self { docs, index }
    }

    /// Insert-if-absent-else-update-in-place keyed by `note_id`.
    ///
    /// On insert, `_created_at` and `_ts` are both set to `observed_at`. On
    /// update, incoming fields replace stored ones, `_ts` becomes
    /// `observed_at`, and the original `_created_at` is preserved.
    pub fn upsert(&mut self, note_id: &str, mut doc: Document, observed_at: i64) {
        doc.entry("note_id".to_string())
            .or_insert_with(|| Value::String(note_id.to_string()));

        match self.index.get(note_id) {
            None => {
                doc.insert("_created_at".to_string(), observed_at.into());
                doc.insert("_ts".to_string(), observed_at.into());
                self.index.insert(note_id.to_string(), self.docs.len());
                self.docs.push(doc);
            }
            Some(&pos) => {
                let stored = &mut self.docs[pos];
                let created_at = stored.get("_created_at").cloned();
                for (key, value) in doc {
                    stored.insert(key, value);
                }
                stored.insert("_ts".to_string(), observed_at.into());
                if let Some(created_at) = created_at {
                    stored.insert("_created_at".to_string(), created_at);
                }
            }
        }
    }

    /// Insert-only, for documents without an identity.
    pub fn append(&mut self, mut doc: Document, observed_at: i64) {
        doc.entry("_created_at".to_string())
            .or_insert_with(|| observed_at.into());
        doc.entry("_ts".to_string())
            .or_insert_with(|| observed_at.into());
        self.docs.push(doc);
    }

    pub fn find(&self, note_id: &str) -> Option<&Document> {
        self.index.get(note_id).map(|&pos| &self.docs[pos])
    }

    pub fn docs(&self) -> &[Document] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }
}
