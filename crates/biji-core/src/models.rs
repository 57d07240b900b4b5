//! Data model for fetched pages and persisted records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::defaults;

/// One parsed page of the notes listing. Derived per call, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NotesPage {
    /// Raw note records in page order.
    pub notes: Vec<Value>,
    /// Cursor derived from the last record, if any.
    pub next_since_id: Option<String>,
    /// True iff the page filled the requested limit AND a cursor exists.
    /// A short page always terminates pagination.
    pub should_continue: bool,
}

/// Resolved content of a link-type note. Derived per call, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkDetail {
    pub title: String,
    pub web_title: String,
    pub content: String,
    pub url: String,
    pub has_content: bool,
    /// Original content block of the response envelope.
    pub raw: Value,
}

/// Kind discriminant of a persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Note,
    LinkDetail,
    Other,
}

/// A record emitted by the crawl and persisted by the store.
///
/// Serializes to the flat persisted shape
/// `{kind, note_id?, raw, ...kind-specific fields}`; the store adds the
/// `_created_at`/`_ts` bookkeeping timestamps on write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Note {
        note_id: Option<String>,
        raw: Value,
    },
    LinkDetail {
        note_id: Option<String>,
        title: String,
        web_title: String,
        url: String,
        has_content: bool,
        raw: Value,
    },
    Other {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note_id: Option<String>,
        raw: Value,
    },
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Note { .. } => RecordKind::Note,
            Record::LinkDetail { .. } => RecordKind::LinkDetail,
            Record::Other { .. } => RecordKind::Other,
        }
    }

    /// Identity key used for upserts; `None` or empty means no identity.
    pub fn note_id(&self) -> Option<&str> {
        match self {
            Record::Note { note_id, .. }
            | Record::LinkDetail { note_id, .. }
            | Record::Other { note_id, .. } => note_id.as_deref(),
        }
    }

    /// Build a `link_detail` record from a resolved detail.
    pub fn from_link_detail(note_id: String, detail: LinkDetail) -> Self {
        Record::LinkDetail {
            note_id: Some(note_id),
            title: detail.title,
            web_title: detail.web_title,
            url: detail.url,
            has_content: detail.has_content,
            raw: detail.raw,
        }
    }
}

/// Extract the stable identity of a raw note record (`id`, falling back to
/// `note_id`). Numeric ids are rendered in decimal.
pub fn note_identity(note: &Value) -> Option<String> {
    for key in ["id", "note_id"] {
        match note.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// True when the raw note record is a link-type note.
pub fn is_link_note(note: &Value) -> bool {
    note.get("note_type").and_then(Value::as_str) == Some(defaults::LINK_NOTE_TYPE)
}
