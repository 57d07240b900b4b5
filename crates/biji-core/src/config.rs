//! Crawl configuration.
//!
//! All process environment access happens here, once, at startup. Components
//! receive the resolved [`CrawlConfig`] (or pieces of it) and never read
//! ambient global state themselves.

use std::path::PathBuf;

use crate::defaults;
use crate::error::{Error, Result};

/// Names of the store collections records are routed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    /// Receives `kind=note` records, upserted by note id.
    pub notes: String,
    /// Receives `kind=link_detail` records, upserted by note id.
    pub details: String,
    /// Catch-all for records without an identity; append-only.
    pub misc: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            notes: defaults::NOTES_COLLECTION.to_string(),
            details: defaults::DETAILS_COLLECTION.to_string(),
            misc: defaults::MISC_COLLECTION.to_string(),
        }
    }
}

/// Configuration for one crawl run, resolved once at startup.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Seed access token (usually a JWT captured from the web client).
    pub bearer_token: Option<String>,
    /// Refresh credential; without it the bundle can never self-refresh.
    pub refresh_token: Option<String>,
    pub csrf_token: Option<String>,
    pub cookie: Option<String>,
    pub user_agent: String,
    /// Listing endpoint URL.
    pub notes_url: String,
    /// Refresh endpoint URL.
    pub refresh_url: String,
    /// Page size requested from the listing endpoint.
    pub limit: usize,
    /// Sort order requested from the listing endpoint.
    pub sort: String,
    /// Starting cursor; empty means "from the newest".
    pub since_id: String,
    /// Whether link-type notes get a detail fetch.
    pub fetch_detail: bool,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Directory backing the disk store.
    pub data_dir: PathBuf,
    pub collections: CollectionNames,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            refresh_token: None,
            csrf_token: None,
            cookie: None,
            user_agent: defaults::USER_AGENT.to_string(),
            notes_url: defaults::NOTES_URL.to_string(),
            refresh_url: defaults::REFRESH_URL.to_string(),
            limit: defaults::PAGE_LIMIT,
            sort: defaults::SORT_ORDER.to_string(),
            since_id: String::new(),
            fetch_detail: true,
            timeout_secs: defaults::HTTP_TIMEOUT_SECS,
            data_dir: PathBuf::from(defaults::DATA_DIR),
            collections: CollectionNames::default(),
        }
    }
}

fn env_trimmed(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CrawlConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `BIJI_BEARER_TOKEN` | - | Seed access token |
    /// | `BIJI_REFRESH_TOKEN` | - | Refresh credential |
    /// | `BIJI_CSRF_TOKEN` | - | `Xi-Csrf-Token` header value |
    /// | `BIJI_COOKIE` | - | Cookie header for the refresh endpoint |
    /// | `BIJI_USER_AGENT` | Chrome UA | User agent for all requests |
    /// | `BIJI_NOTES_URL` | production | Listing endpoint override |
    /// | `BIJI_REFRESH_URL` | production | Refresh endpoint override |
    /// | `BIJI_LIMIT` | `100` | Page size |
    /// | `BIJI_SORT` | `create_desc` | Sort order |
    /// | `BIJI_SINCE_ID` | empty | Starting cursor |
    /// | `BIJI_FETCH_DETAIL` | `1` | `0`/`false` disables detail fetches |
    /// | `BIJI_TIMEOUT_SECS` | `30` | Per-request HTTP timeout |
    /// | `BIJI_DATA_DIR` | `data/store` | Disk store directory |
    /// | `BIJI_NOTES_COLLECTION` | `notes` | Notes collection name |
    /// | `BIJI_DETAILS_COLLECTION` | `details` | Details collection name |
    /// | `BIJI_MISC_COLLECTION` | `misc` | Catch-all collection name |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let fetch_detail = std::env::var("BIJI_FETCH_DETAIL")
            .map(|v| {
                let v = v.trim();
                v != "0" && !v.eq_ignore_ascii_case("false")
            })
            .unwrap_or(true);

        Self {
            bearer_token: env_trimmed("BIJI_BEARER_TOKEN"),
            refresh_token: env_trimmed("BIJI_REFRESH_TOKEN"),
            csrf_token: env_trimmed("BIJI_CSRF_TOKEN"),
            cookie: env_trimmed("BIJI_COOKIE"),
            user_agent: env_trimmed("BIJI_USER_AGENT").unwrap_or(defaults.user_agent),
            notes_url: env_trimmed("BIJI_NOTES_URL").unwrap_or(defaults.notes_url),
            refresh_url: env_trimmed("BIJI_REFRESH_URL").unwrap_or(defaults.refresh_url),
            limit: env_trimmed("BIJI_LIMIT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.limit),
            sort: env_trimmed("BIJI_SORT").unwrap_or(defaults.sort),
            since_id: env_trimmed("BIJI_SINCE_ID").unwrap_or_default(),
            fetch_detail,
            timeout_secs: env_trimmed("BIJI_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            data_dir: env_trimmed("BIJI_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            collections: CollectionNames {
                notes: env_trimmed("BIJI_NOTES_COLLECTION").unwrap_or(defaults.collections.notes),
                details: env_trimmed("BIJI_DETAILS_COLLECTION")
                    .unwrap_or(defaults.collections.details),
                misc: env_trimmed("BIJI_MISC_COLLECTION").unwrap_or(defaults.collections.misc),
            },
        }
    }

    /// True when at least one credential is configured.
    pub fn has_credentials(&self) -> bool {
        self.bearer_token.is_some() || self.refresh_token.is_some()
    }

    /// Fail fast when no credential is configured at all.
    pub fn require_credentials(&self) -> Result<()> {
        if self.has_credentials() {
            Ok(())
        } else {
            Err(Error::Config(
                "no credentials configured; set BIJI_BEARER_TOKEN and/or BIJI_REFRESH_TOKEN"
                    .to_string(),
            ))
        }
    }
}
