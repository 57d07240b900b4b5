//! Mock backends for deterministic testing without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use biji_core::{Error, LinkDetail, NotesPage, Record, RecordSink, Result, TokenBundle};

use crate::api::{ListingOutcome, NotesBackend};
use crate::auth::RefreshTokens;

/// Scripted [`NotesBackend`]: listing outcomes are queued in call order,
/// details are keyed by note id, and every call is recorded.
#[derive(Default)]
pub struct MockNotesBackend {
    pages: Mutex<VecDeque<ListingOutcome>>,
    details: Mutex<HashMap<String, LinkDetail>>,
    refresh_failure: Mutex<Option<String>>,
    page_calls: Mutex<Vec<(String, bool)>>,
    detail_calls: Mutex<Vec<String>>,
    refresh_calls: AtomicUsize,
}

impl MockNotesBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_page(&self, page: NotesPage) {
        self.pages
            .lock()
            .unwrap()
            .push_back(ListingOutcome::Page(page));
    }

    pub fn push_rejected(&self, status: Option<u16>, reason: &str) {
        self.pages
            .lock()
            .unwrap()
            .push_back(ListingOutcome::Rejected {
                status,
                reason: reason.to_string(),
            });
    }

    pub fn push_unexpected(&self, status: u16, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .push_back(ListingOutcome::Unexpected {
                status,
                body: body.to_string(),
            });
    }

    pub fn set_detail(&self, note_id: &str, detail: LinkDetail) {
        self.details
            .lock()
            .unwrap()
            .insert(note_id.to_string(), detail);
    }

    /// Make subsequent `force_refresh` calls fail with an auth error.
    pub fn fail_refresh_with(&self, message: &str) {
        *self.refresh_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn page_calls(&self) -> Vec<(String, bool)> {
        self.page_calls.lock().unwrap().clone()
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotesBackend for MockNotesBackend {
    async fn fetch_page(&self, since_id: &str, auth_retry: bool) -> Result<ListingOutcome> {
        self.page_calls
            .lock()
            .unwrap()
            .push((since_id.to_string(), auth_retry));
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Request("mock: no scripted listing outcome".to_string()))
    }

    async fn fetch_link_detail(&self, note_id: &str) -> Result<LinkDetail> {
        self.detail_calls.lock().unwrap().push(note_id.to_string());
        self.details
            .lock()
            .unwrap()
            .get(note_id)
            .cloned()
            .ok_or_else(|| Error::Request(format!("mock: no detail for {note_id}")))
    }

    async fn force_refresh(&self) -> Result<()> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        match self.refresh_failure.lock().unwrap().clone() {
            Some(message) => Err(Error::Auth(message)),
            None => Ok(()),
        }
    }
}

/// Scripted [`RefreshTokens`]: responses are queued in call order and the
/// access token passed to each call is recorded.
#[derive(Default)]
pub struct MockRefresher {
    responses: Mutex<VecDeque<Result<TokenBundle>>>,
    calls: Mutex<Vec<Option<String>>>,
}

impl MockRefresher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, bundle: TokenBundle) {
        self.responses.lock().unwrap().push_back(Ok(bundle));
    }

    pub fn push_err(&self, error: Error) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Access tokens passed to each refresh call, in order.
    pub fn calls(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RefreshTokens for MockRefresher {
    async fn refresh(
        &self,
        _refresh_token: &str,
        access_token: Option<&str>,
    ) -> Result<TokenBundle> {
        self.calls
            .lock()
            .unwrap()
            .push(access_token.map(str::to_string));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Request("mock: no scripted refresh response".to_string())))
    }
}

/// Collects emitted records for assertions.
#[derive(Default)]
pub struct VecSink {
    records: Mutex<Vec<Record>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for VecSink {
    async fn emit(&self, record: Record) -> Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}
