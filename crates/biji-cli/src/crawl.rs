//! Orchestrator: wires config → tokens → client → walker → store.

use std::sync::Arc;

use tracing::info;

use biji_client::{
    CrawlSummary, CursorWalker, HttpNotesClient, HttpRefresher, RefreshTokens, TokenStore,
};
use biji_core::{
    decode_jwt_exp, defaults, now_epoch, CrawlConfig, Error, Result, TokenBundle,
};
use biji_store::{DiskStore, StoreSink};

/// Build the initial token bundle from seed credentials.
///
/// When a refresh token is configured and the seed bearer is missing or due
/// to expire (per its JWT `exp`), a fresh bundle is fetched upfront; an
/// otherwise-healthy bearer is used as-is.
pub async fn bootstrap_bundle(
    config: &CrawlConfig,
    refresher: &dyn RefreshTokens,
) -> Result<TokenBundle> {
    let bearer = config.bearer_token.clone().unwrap_or_default();
    let refresh_token = config.refresh_token.clone().unwrap_or_default();
    let bearer_exp = if bearer.is_empty() {
        None
    } else {
        decode_jwt_exp(&bearer)
    };

    if !refresh_token.is_empty() {
        let stale = bearer.is_empty()
            || bearer_exp.is_some_and(|exp| now_epoch() >= exp - defaults::REFRESH_BEFORE_SECS);
        if stale {
            info!("seed access token missing or stale; refreshing upfront");
            let access = (!bearer.is_empty()).then_some(bearer.as_str());
            return refresher.refresh(&refresh_token, access).await;
        }
        return Ok(TokenBundle {
            access_token: bearer,
            access_token_expire_at: bearer_exp,
            refresh_token: Some(refresh_token),
            refresh_token_expire_at: None,
        });
    }

    if !bearer.is_empty() {
        return Ok(TokenBundle {
            access_token: bearer,
            access_token_expire_at: bearer_exp,
            refresh_token: None,
            refresh_token_expire_at: None,
        });
    }

    Err(Error::Config(
        "no credentials configured; set BIJI_BEARER_TOKEN and/or BIJI_REFRESH_TOKEN".to_string(),
    ))
}

/// Run one crawl: walk the listing, resolve link details, persist records.
pub async fn run(config: &CrawlConfig) -> Result<CrawlSummary> {
    config.require_credentials()?;

    let refresher = Arc::new(HttpRefresher::new(config)?);
    let bundle = bootstrap_bundle(config, refresher.as_ref()).await?;
    let tokens = Arc::new(TokenStore::new(bundle, refresher));
    let client = Arc::new(HttpNotesClient::new(config, tokens)?);

    let store = Arc::new(DiskStore::open(&config.data_dir).await?);
    let sink = Arc::new(StoreSink::new(store, config.collections.clone()));

    info!(
        data_dir = %config.data_dir.display(),
        since_id = %config.since_id,
        limit = config.limit,
        fetch_detail = config.fetch_detail,
        "starting crawl"
    );

    let walker = CursorWalker::new(client, config.fetch_detail);
    let summary = walker.run(&config.since_id, sink).await?;

    info!(
        pages = summary.pages,
        notes = summary.notes,
        link_details = summary.link_details,
        detail_failures = summary.detail_failures,
        "crawl complete"
    );
    Ok(summary)
}
