//! Token refresh against the auth endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use biji_core::{mask_secret, parse_refresh_response, CrawlConfig, Error, Result, TokenBundle};

use crate::request_id;

/// Exchanges a refresh credential for a new token bundle.
///
/// One request per call, no retry; callers decide retry policy. An
/// [`Error::Auth`] from the endpoint is always propagated, never swallowed.
#[async_trait]
pub trait RefreshTokens: Send + Sync {
    /// `access_token`, when present, is sent as a bearer header alongside the
    /// refresh credential.
    async fn refresh(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> Result<TokenBundle>;
}

/// HTTP implementation of [`RefreshTokens`].
pub struct HttpRefresher {
    client: Client,
    url: String,
    csrf_token: Option<String>,
    cookie: Option<String>,
    user_agent: String,
}

impl HttpRefresher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.refresh_url.clone(),
            csrf_token: config.csrf_token.clone(),
            cookie: config.cookie.clone(),
            user_agent: config.user_agent.clone(),
        })
    }
}

#[async_trait]
impl RefreshTokens for HttpRefresher {
    async fn refresh(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> Result<TokenBundle> {
        info!(
            refresh_token = %mask_secret(refresh_token),
            with_access_token = access_token.is_some(),
            "requesting token refresh"
        );

        let mut req = self
            .client
            .post(&self.url)
            .header("Accept", "application/json, text/plain, */*")
            .header("User-Agent", &self.user_agent)
            .header("X-Request-ID", request_id());
        if let Some(ref csrf) = self.csrf_token {
            req = req.header("Xi-Csrf-Token", csrf);
        }
        if let Some(ref cookie) = self.cookie {
            req = req.header("Cookie", cookie);
        }
        if let Some(token) = access_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let response = req
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| Error::Request(format!("refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Request(format!(
                "refresh endpoint returned {status}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("refresh response was not JSON: {e}")))?;

        let bundle = parse_refresh_response(&payload)?;
        debug!(
            access_token = %mask_secret(&bundle.access_token),
            expire_at = ?bundle.access_token_expire_at,
            "token refresh succeeded"
        );
        Ok(bundle)
    }
}
