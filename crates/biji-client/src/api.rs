//! Typed access to the listing and detail endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use biji_core::{
    defaults, parse_link_detail, parse_notes_page, CrawlConfig, Error, LinkDetail, NotesPage,
    Result,
};

use crate::request_id;
use crate::token::TokenStore;

/// Result of one listing request, classified at the HTTP boundary.
#[derive(Debug, Clone)]
pub enum ListingOutcome {
    /// Parsed page.
    Page(NotesPage),
    /// Auth rejection (403, login-required sentinel) or a timeout; both are
    /// eligible for the walker's single refresh-and-retry.
    Rejected {
        /// HTTP status, absent for timeouts.
        status: Option<u16>,
        reason: String,
    },
    /// Response body without the expected content key; the walker treats
    /// this as end-of-stream.
    Unexpected { status: u16, body: String },
}

/// Remote operations the cursor walker drives.
#[async_trait]
pub trait NotesBackend: Send + Sync {
    /// One listing request for the given cursor. `auth_retry` marks the
    /// single post-refresh resubmission.
    async fn fetch_page(&self, since_id: &str, auth_retry: bool) -> Result<ListingOutcome>;

    /// One detail request for a link-type note. Single attempt; the
    /// refresh-and-retry policy of the listing path does not apply.
    async fn fetch_link_detail(&self, note_id: &str) -> Result<LinkDetail>;

    /// Unconditional token refresh, used by the auth-retry path.
    async fn force_refresh(&self) -> Result<()>;
}

/// HTTP implementation of [`NotesBackend`] backed by a [`TokenStore`].
pub struct HttpNotesClient {
    client: Client,
    tokens: Arc<TokenStore>,
    notes_url: String,
    csrf_token: Option<String>,
    user_agent: String,
    limit: usize,
    sort: String,
}

fn snippet(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}

impl HttpNotesClient {
    pub fn new(config: &CrawlConfig, tokens: Arc<TokenStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            tokens,
            notes_url: config.notes_url.trim_end_matches('/').to_string(),
            csrf_token: config.csrf_token.clone(),
            user_agent: config.user_agent.clone(),
            limit: config.limit,
            sort: config.sort.clone(),
        })
    }

    async fn authed_get(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        let token = self.tokens.ensure_access_token().await?;
        let mut req = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {token}"))
            .header("User-Agent", &self.user_agent)
            .header("X-Request-ID", request_id());
        if let Some(ref csrf) = self.csrf_token {
            req = req.header("Xi-Csrf-Token", csrf);
        }
        Ok(req)
    }
}

#[async_trait]
impl NotesBackend for HttpNotesClient {
    async fn fetch_page(&self, since_id: &str, auth_retry: bool) -> Result<ListingOutcome> {
        let mut req = self.authed_get(&self.notes_url).await?.query(&[
            ("limit", self.limit.to_string()),
            ("since_id", since_id.to_string()),
            ("sort", self.sort.clone()),
        ]);
        if auth_retry {
            req = req.header("X-Auth-Retry", "1");
        }

        debug!(since_id, auth_retry, limit = self.limit, "fetching notes page");

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Ok(ListingOutcome::Rejected {
                    status: None,
                    reason: format!("timeout: {e}"),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let payload: Option<Value> = serde_json::from_str(&body).ok();

        let login_required = payload
            .as_ref()
            .and_then(|p| p.get("message"))
            .and_then(Value::as_str)
            == Some(defaults::LOGIN_REQUIRED);
        if status == StatusCode::FORBIDDEN || login_required {
            return Ok(ListingOutcome::Rejected {
                status: Some(status.as_u16()),
                reason: snippet(&body, 200),
            });
        }

        let Some(payload) = payload.filter(|p| p.get("c").is_some()) else {
            return Ok(ListingOutcome::Unexpected {
                status: status.as_u16(),
                body: snippet(&body, 200),
            });
        };

        Ok(ListingOutcome::Page(parse_notes_page(
            &payload, self.limit,
        )?))
    }

    async fn fetch_link_detail(&self, note_id: &str) -> Result<LinkDetail> {
        let url = format!("{}/{note_id}/links/detail", self.notes_url);
        debug!(note_id, "fetching link detail");

        let response = self.authed_get(&url).await?.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Request(format!(
                "detail endpoint returned {status}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("detail response was not JSON: {e}")))?;
        parse_link_detail(&payload)
    }

    async fn force_refresh(&self) -> Result<()> {
        self.tokens.force_refresh().await
    }
}
