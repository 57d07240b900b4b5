//! Markdown export of stored notes.
//!
//! Renders one `.md` file per note with YAML front matter, body content
//! taken from the resolved link detail when present and from the raw note
//! otherwise.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tracing::info;

use biji_core::{now_epoch, CrawlConfig, Result};
use biji_store::{DiskStore, Document, RecordStore};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub out_dir: PathBuf,
    /// Only export notes that have a resolved detail (usually
    /// `note_type=link`).
    pub only_with_details: bool,
}

fn safe_filename(name: &str) -> String {
    const MAX_LEN: usize = 120;
    const FORBIDDEN: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

    let mut out = String::new();
    let mut last_replaced = false;
    let mut last_space = false;
    for ch in name.trim().chars() {
        if FORBIDDEN.contains(&ch) {
            if !last_replaced {
                out.push('_');
            }
            last_replaced = true;
            last_space = false;
        } else if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
            last_replaced = false;
        } else {
            out.push(ch);
            last_replaced = false;
            last_space = false;
        }
    }

    let trimmed = out.trim();
    if trimmed.is_empty() {
        return "untitled".to_string();
    }
    trimmed.chars().take(MAX_LEN).collect::<String>().trim_end().to_string()
}

fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn yaml_escape(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn str_field<'a>(doc: &'a Value, key: &str) -> Option<&'a str> {
    doc.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn detail_content(detail: &Document) -> String {
    if let Some(content) = detail.get("raw").and_then(|raw| str_field(raw, "content")) {
        return content.to_string();
    }
    detail
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn note_content(raw: &Value) -> String {
    for key in ["content", "body_text", "json_content"] {
        if let Some(text) = str_field(raw, key) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    String::new()
}

fn audio_meta(raw: &Value) -> (String, Option<i64>) {
    let Some(attachments) = raw.get("attachments").and_then(Value::as_array) else {
        return (String::new(), None);
    };
    for attachment in attachments {
        if attachment.get("type").and_then(Value::as_str) == Some("audio") {
            let url = str_field(attachment, "url").unwrap_or_default().to_string();
            let duration = attachment.get("duration").and_then(Value::as_i64);
            return (url, duration);
        }
    }
    (String::new(), None)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

/// Render one note (plus its optional resolved detail) as markdown with
/// YAML front matter.
pub fn render_markdown(note: &Document, detail: Option<&Document>) -> String {
    let empty = Value::Null;
    let note_id = note
        .get("note_id")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let raw_note = note.get("raw").unwrap_or(&empty);
    let note_type = str_field(raw_note, "note_type").unwrap_or_default();
    let created_at = str_field(raw_note, "created_at").unwrap_or_default();
    let updated_at = str_field(raw_note, "updated_at").unwrap_or_default();

    let mut title = String::new();
    let mut url = String::new();
    let mut web_title = String::new();
    let content;
    let has_content;
    match detail {
        Some(detail) => {
            let field = |key: &str| {
                detail
                    .get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            title = field("title");
            url = field("url");
            web_title = field("web_title");
            content = detail_content(detail);
            has_content = match detail.get("has_content") {
                Some(v) => truthy(v),
                None => !content.is_empty(),
            };
        }
        None => {
            content = note_content(raw_note);
            has_content = !content.is_empty();
        }
    }

    if title.is_empty() {
        title = str_field(raw_note, "title")
            .or_else(|| str_field(raw_note, "web_title"))
            .unwrap_or(if note_id.is_empty() { "Untitled" } else { note_id })
            .to_string();
    }
    if web_title.is_empty() {
        web_title = str_field(raw_note, "web_title").unwrap_or_default().to_string();
    }

    let tags: Vec<String> = raw_note
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|t| str_field(t, "name"))
                .map(normalize_tag)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut lines: Vec<String> = Vec::new();
    lines.push("---".to_string());
    lines.push(format!("title: {}", yaml_escape(&title)));
    if !web_title.is_empty() {
        lines.push(format!("web_title: {}", yaml_escape(&web_title)));
    }
    if !note_id.is_empty() {
        lines.push(format!("note_id: {}", yaml_escape(note_id)));
    }
    if !note_type.is_empty() {
        lines.push(format!("note_type: {}", yaml_escape(note_type)));
    }
    if !url.is_empty() {
        lines.push(format!("url: {}", yaml_escape(&url)));
    }
    if !created_at.is_empty() {
        lines.push(format!("created_at: {}", yaml_escape(created_at)));
    }
    if !updated_at.is_empty() {
        lines.push(format!("updated_at: {}", yaml_escape(updated_at)));
    }
    lines.push(format!("has_content: {has_content}"));
    lines.push(format!("exported_at: {}", now_epoch()));
    if !tags.is_empty() {
        lines.push("tags:".to_string());
        for tag in &tags {
            lines.push(format!("  - {}", yaml_escape(tag)));
        }
    }

    if note_type == "audio" {
        let (audio_url, duration) = audio_meta(raw_note);
        if !audio_url.is_empty() {
            lines.push(format!("audio_url: {}", yaml_escape(&audio_url)));
        }
        if let Some(duration) = duration {
            lines.push(format!("audio_duration_ms: {duration}"));
        }
    }

    lines.push("---".to_string());
    lines.push(String::new());
    if !content.is_empty() {
        if content.trim_start().starts_with('{') && content.trim_end().ends_with('}') {
            lines.push("```json".to_string());
            lines.push(content);
            lines.push("```".to_string());
        } else {
            lines.push(content);
        }
        lines.push(String::new());
    }

    format!("{}\n", lines.join("\n").trim_end())
}

/// Write one markdown file per note into `options.out_dir`.
///
/// Filenames come from the sanitized title; when two notes share a title the
/// later one gets a ` - {note_id}` suffix instead of overwriting.
pub async fn export_records(
    notes: &[Document],
    details_by_id: &HashMap<String, Document>,
    options: &ExportOptions,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(&options.out_dir).await?;
    let mut written = Vec::new();

    for note in notes {
        let note_id = note
            .get("note_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let detail = details_by_id.get(note_id);
        if options.only_with_details && detail.is_none() {
            continue;
        }

        let empty = Value::Null;
        let raw_note = note.get("raw").unwrap_or(&empty);
        let title = detail
            .and_then(|d| d.get("title"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| str_field(raw_note, "title"))
            .unwrap_or(if note_id.is_empty() { "Untitled" } else { note_id });

        let base = safe_filename(title);
        let mut path = options.out_dir.join(format!("{base}.md"));
        if path.exists() && !note_id.is_empty() {
            path = options.out_dir.join(format!("{base} - {note_id}.md"));
        }

        fs::write(&path, render_markdown(note, detail)).await?;
        written.push(path);
    }

    Ok(written)
}

/// Export the disk store's notes collection as markdown files.
pub async fn run(config: &CrawlConfig, options: &ExportOptions) -> Result<usize> {
    let store = DiskStore::open(&config.data_dir).await?;
    let notes = store.all(&config.collections.notes).await?;
    let details = store.all(&config.collections.details).await?;

    let details_by_id: HashMap<String, Document> = details
        .into_iter()
        .filter_map(|detail| {
            let id = detail.get("note_id")?.as_str()?.to_string();
            (!id.is_empty()).then_some((id, detail))
        })
        .collect();

    let written = export_records(&notes, &details_by_id, options).await?;
    info!(
        exported = written.len(),
        out_dir = %options.out_dir.display(),
        "markdown export complete"
    );
    Ok(written.len())
}
