//! Single owner of the mutable token bundle.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use biji_core::{defaults, Error, Result, TokenBundle};

use crate::auth::RefreshTokens;

/// Owns the current [`TokenBundle`] and serializes every refresh.
///
/// The bundle lock is held for the whole refresh round-trip, so at most one
/// refresh is in flight per process and two racing refreshes can never
/// invalidate each other's refresh token.
pub struct TokenStore {
    refresher: Arc<dyn RefreshTokens>,
    bundle: Mutex<TokenBundle>,
    refresh_before_secs: i64,
}

impl TokenStore {
    pub fn new(bundle: TokenBundle, refresher: Arc<dyn RefreshTokens>) -> Self {
        Self::with_threshold(bundle, refresher, defaults::REFRESH_BEFORE_SECS)
    }

    pub fn with_threshold(
        bundle: TokenBundle,
        refresher: Arc<dyn RefreshTokens>,
        refresh_before_secs: i64,
    ) -> Self {
        Self {
            refresher,
            bundle: Mutex::new(bundle),
            refresh_before_secs,
        }
    }

    /// Snapshot of the current bundle.
    pub async fn current(&self) -> TokenBundle {
        self.bundle.lock().await.clone()
    }

    /// Return a valid access token, refreshing proactively when the bundle is
    /// due within the configured threshold.
    ///
    /// Fatal [`Error::Auth`] when the bundle cannot self-refresh and its
    /// access token is already expired.
    pub async fn ensure_access_token(&self) -> Result<String> {
        let mut bundle = self.bundle.lock().await;

        if !bundle.can_refresh() {
            if bundle.access_token_expire_at.is_some() && bundle.needs_refresh(0) {
                return Err(Error::Auth(
                    "access token expired and no refresh token; re-login to reseed credentials"
                        .to_string(),
                ));
            }
            return Ok(bundle.access_token.clone());
        }

        if bundle.needs_refresh(self.refresh_before_secs) {
            self.refresh_locked(&mut bundle).await?;
        }
        Ok(bundle.access_token.clone())
    }

    /// Refresh unconditionally; used by the listing auth-retry path.
    pub async fn force_refresh(&self) -> Result<()> {
        let mut bundle = self.bundle.lock().await;
        self.refresh_locked(&mut bundle).await
    }

    /// Refresh the locked bundle, replacing it atomically on success.
    ///
    /// Documented fallback: when the attempt that includes the current access
    /// token fails for ANY reason, not just auth failures, the
    /// possibly-still-valid access token is discarded and one token-less
    /// attempt is made before giving up.
    async fn refresh_locked(&self, bundle: &mut TokenBundle) -> Result<()> {
        let Some(refresh_token) = bundle.refresh_token.clone().filter(|t| !t.is_empty()) else {
            return Err(Error::Auth(
                "token bundle has no refresh token; cannot refresh".to_string(),
            ));
        };

        let access_token = (!bundle.access_token.is_empty()).then_some(bundle.access_token.as_str());
        let refreshed = match self.refresher.refresh(&refresh_token, access_token).await {
            Ok(refreshed) => refreshed,
            Err(first_err) if access_token.is_some() => {
                warn!(error = %first_err, "refresh with access token failed; retrying token-less");
                self.refresher.refresh(&refresh_token, None).await?
            }
            Err(e) => return Err(e),
        };

        *bundle = refreshed;
        Ok(())
    }
}
