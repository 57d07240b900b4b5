//! Cursor walker: the paginated fetch loop of one crawl run.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use biji_core::{is_link_note, note_identity, Error, Record, RecordSink, Result};

use crate::api::{ListingOutcome, NotesBackend};

/// Counters for one completed crawl run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages: usize,
    pub notes: usize,
    pub link_details: usize,
    pub detail_failures: usize,
}

/// Drives the listing endpoint cursor-by-cursor, emitting records to a sink.
///
/// Cursor advancement is strictly sequential: the next listing request is
/// never issued before the current page's records have been emitted. Link
/// detail fetches run concurrently with each other and with subsequent pages,
/// and all drain before [`CursorWalker::run`] returns.
pub struct CursorWalker {
    backend: Arc<dyn NotesBackend>,
    fetch_detail: bool,
}

impl CursorWalker {
    pub fn new(backend: Arc<dyn NotesBackend>, fetch_detail: bool) -> Self {
        Self {
            backend,
            fetch_detail,
        }
    }

    /// Walk the listing from `start_since_id` (empty = from the newest) until
    /// the cursor terminates, an unexpected response soft-stops the run, or a
    /// fatal error aborts it.
    pub async fn run(
        &self,
        start_since_id: &str,
        sink: Arc<dyn RecordSink>,
    ) -> Result<CrawlSummary> {
        let mut cursor = start_since_id.to_string();
        let mut summary = CrawlSummary::default();
        let mut details: JoinSet<bool> = JoinSet::new();

        loop {
            let mut outcome = self.backend.fetch_page(&cursor, false).await?;

            if let ListingOutcome::Rejected { status, reason } = &outcome {
                error!(
                    since_id = %cursor,
                    status = ?status,
                    reason = %reason,
                    "notes page rejected"
                );
                info!("attempting token refresh and one listing retry");
                self.backend.force_refresh().await?;
                outcome = self.backend.fetch_page(&cursor, true).await?;
            }

            match outcome {
                ListingOutcome::Rejected { status, reason } => {
                    error!(
                        since_id = %cursor,
                        status = ?status,
                        reason = %reason,
                        "notes page rejected after auth retry"
                    );
                    return Err(Error::Auth(format!(
                        "listing rejected after auth retry: {reason}"
                    )));
                }
                ListingOutcome::Unexpected { status, body } => {
                    error!(status, body = %body, "notes page unexpected response; stopping");
                    break;
                }
                ListingOutcome::Page(page) => {
                    summary.pages += 1;
                    let mut link_notes = 0;

                    for note in &page.notes {
                        let note_id = note_identity(note);
                        let schedule_detail =
                            self.fetch_detail && is_link_note(note) && note_id.is_some();

                        sink.emit(Record::Note {
                            note_id: note_id.clone(),
                            raw: note.clone(),
                        })
                        .await?;
                        summary.notes += 1;

                        if schedule_detail {
                            link_notes += 1;
                            let backend = Arc::clone(&self.backend);
                            let sink = Arc::clone(&sink);
                            let note_id = note_id.unwrap_or_default();
                            details
                                .spawn(async move { resolve_detail(backend, sink, note_id).await });
                        }
                    }

                    info!(
                        count = page.notes.len(),
                        since_id = %cursor,
                        next_since_id = ?page.next_since_id,
                        should_continue = page.should_continue,
                        link_notes,
                        "notes page fetched"
                    );

                    if page.should_continue {
                        cursor = page.next_since_id.unwrap_or_default();
                    } else {
                        break;
                    }
                }
            }
        }

        // Detail fetches scheduled from any page still drain to completion.
        while let Some(joined) = details.join_next().await {
            match joined {
                Ok(true) => summary.link_details += 1,
                Ok(false) => summary.detail_failures += 1,
                Err(e) => {
                    error!(error = %e, "link detail task panicked");
                    summary.detail_failures += 1;
                }
            }
        }

        Ok(summary)
    }
}

/// Resolve one link detail and emit it. Failures are logged and skipped;
/// a missing detail is non-fatal to the run.
async fn resolve_detail(
    backend: Arc<dyn NotesBackend>,
    sink: Arc<dyn RecordSink>,
    note_id: String,
) -> bool {
    match backend.fetch_link_detail(&note_id).await {
        Ok(detail) => {
            let record = Record::from_link_detail(note_id.clone(), detail);
            if let Err(e) = sink.emit(record).await {
                warn!(note_id = %note_id, error = %e, "failed to store link detail");
                return false;
            }
            true
        }
        Err(e) => {
            warn!(note_id = %note_id, error = %e, "link detail fetch failed; skipping");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockNotesBackend, VecSink};
    use biji_core::{LinkDetail, NotesPage, RecordKind};
    use serde_json::json;

    fn page(ids: &[&str], should_continue: bool) -> NotesPage {
        let notes: Vec<_> = ids.iter().map(|i| json!({"id": i})).collect();
        NotesPage {
            next_since_id: ids.last().map(|s| s.to_string()),
            should_continue,
            notes,
        }
    }

    #[tokio::test]
    async fn test_walks_until_short_page() {
        let backend = Arc::new(MockNotesBackend::new());
        backend.push_page(page(&["a", "b"], true));
        backend.push_page(page(&["c"], false));
        let sink = Arc::new(VecSink::new());

        let walker = CursorWalker::new(backend.clone(), true);
        let summary = walker.run("", sink.clone()).await.unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.notes, 3);
        assert_eq!(
            backend.page_calls(),
            vec![("".to_string(), false), ("b".to_string(), false)]
        );
        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.kind() == RecordKind::Note));
    }

    #[tokio::test]
    async fn test_rejection_refreshes_and_retries_same_cursor_once() {
        let backend = Arc::new(MockNotesBackend::new());
        backend.push_rejected(Some(403), "forbidden");
        backend.push_page(page(&["a"], false));
        let sink = Arc::new(VecSink::new());

        let walker = CursorWalker::new(backend.clone(), false);
        let summary = walker.run("", sink).await.unwrap();

        assert_eq!(summary.notes, 1);
        assert_eq!(backend.refresh_calls(), 1);
        assert_eq!(
            backend.page_calls(),
            vec![("".to_string(), false), ("".to_string(), true)],
            "retry must reuse the cursor with the auth-retry marker"
        );
    }

    #[tokio::test]
    async fn test_second_rejection_aborts() {
        let backend = Arc::new(MockNotesBackend::new());
        backend.push_rejected(Some(403), "forbidden");
        backend.push_rejected(Some(403), "still forbidden");
        let sink = Arc::new(VecSink::new());

        let walker = CursorWalker::new(backend.clone(), false);
        let err = walker.run("", sink).await.unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(backend.refresh_calls(), 1, "never more than one retry per cursor");
        assert_eq!(backend.page_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_timeout_takes_the_retry_path() {
        let backend = Arc::new(MockNotesBackend::new());
        backend.push_rejected(None, "timeout: deadline elapsed");
        backend.push_page(page(&["a"], false));
        let sink = Arc::new(VecSink::new());

        let walker = CursorWalker::new(backend.clone(), false);
        let summary = walker.run("", sink).await.unwrap();

        assert_eq!(summary.notes, 1);
        assert_eq!(backend.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_aborts_run() {
        let backend = Arc::new(MockNotesBackend::new());
        backend.push_rejected(Some(403), "forbidden");
        backend.fail_refresh_with("no refresh token");
        let sink = Arc::new(VecSink::new());

        let walker = CursorWalker::new(backend.clone(), false);
        let err = walker.run("", sink).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_unexpected_response_soft_stops() {
        let backend = Arc::new(MockNotesBackend::new());
        backend.push_page(page(&["a"], true));
        backend.push_unexpected(502, "<html>bad gateway</html>");
        let sink = Arc::new(VecSink::new());

        let walker = CursorWalker::new(backend.clone(), false);
        let summary = walker.run("", sink.clone()).await.unwrap();

        assert_eq!(summary.pages, 1);
        assert_eq!(summary.notes, 1);
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_link_notes_get_details() {
        let backend = Arc::new(MockNotesBackend::new());
        backend.push_page(NotesPage {
            notes: vec![
                json!({"id": "a", "note_type": "link"}),
                json!({"id": "b", "note_type": "audio"}),
            ],
            next_since_id: Some("b".to_string()),
            should_continue: false,
        });
        backend.set_detail(
            "a",
            LinkDetail {
                title: "t".to_string(),
                web_title: String::new(),
                content: "c".to_string(),
                url: "u".to_string(),
                has_content: true,
                raw: json!({"content": "c"}),
            },
        );
        let sink = Arc::new(VecSink::new());

        let walker = CursorWalker::new(backend.clone(), true);
        let summary = walker.run("", sink.clone()).await.unwrap();

        assert_eq!(summary.notes, 2);
        assert_eq!(summary.link_details, 1);
        assert_eq!(summary.detail_failures, 0);
        assert_eq!(backend.detail_calls(), vec!["a".to_string()]);

        let details: Vec<_> = sink
            .records()
            .into_iter()
            .filter(|r| r.kind() == RecordKind::LinkDetail)
            .collect();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].note_id(), Some("a"));
    }

    #[tokio::test]
    async fn test_detail_failure_is_not_fatal() {
        let backend = Arc::new(MockNotesBackend::new());
        backend.push_page(NotesPage {
            notes: vec![json!({"id": "a", "note_type": "link"})],
            next_since_id: Some("a".to_string()),
            should_continue: false,
        });
        // No detail registered for "a": the fetch fails.
        let sink = Arc::new(VecSink::new());

        let walker = CursorWalker::new(backend.clone(), true);
        let summary = walker.run("", sink.clone()).await.unwrap();

        assert_eq!(summary.notes, 1);
        assert_eq!(summary.link_details, 0);
        assert_eq!(summary.detail_failures, 1);
        assert_eq!(sink.records().len(), 1);
    }

    #[tokio::test]
    async fn test_detail_fetch_disabled() {
        let backend = Arc::new(MockNotesBackend::new());
        backend.push_page(NotesPage {
            notes: vec![json!({"id": "a", "note_type": "link"})],
            next_since_id: Some("a".to_string()),
            should_continue: false,
        });
        let sink = Arc::new(VecSink::new());

        let walker = CursorWalker::new(backend.clone(), false);
        let summary = walker.run("", sink).await.unwrap();

        assert_eq!(summary.notes, 1);
        assert!(backend.detail_calls().is_empty());
    }
}
