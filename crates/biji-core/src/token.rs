//! Access/refresh credential pair and JWT helpers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current Unix time in whole seconds.
pub fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

/// The current access/refresh credential pair and expiries.
///
/// Immutable value: a successful refresh produces a new bundle that replaces
/// the old one atomically. A bundle without a `refresh_token` can never
/// self-refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub access_token_expire_at: Option<i64>,
    pub refresh_token: Option<String>,
    pub refresh_token_expire_at: Option<i64>,
}

impl TokenBundle {
    /// Build a bundle from a bare access token, decoding its expiry from the
    /// JWT payload when possible.
    pub fn from_access_token(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        let access_token = access_token.into();
        let access_token_expire_at = decode_jwt_exp(&access_token);
        Self {
            access_token,
            access_token_expire_at,
            refresh_token,
            refresh_token_expire_at: None,
        }
    }

    /// True when the access token is due for refresh.
    ///
    /// False if no expiry is known (treated as non-expiring); otherwise true
    /// when `now >= expire_at - threshold`. Pure function of the clock and
    /// the stored expiry.
    pub fn needs_refresh(&self, refresh_before_secs: i64) -> bool {
        match self.access_token_expire_at {
            None => false,
            Some(expire_at) => now_epoch() >= expire_at - refresh_before_secs,
        }
    }

    /// True when self-refresh is possible.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Decode a JWT payload (no signature verification) and return `exp` if present.
pub fn decode_jwt_exp(token: &str) -> Option<i64> {
    let payload_b64 = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .ok()?;
    let payload: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    payload.get("exp")?.as_i64()
}

/// Mask a secret for log output, keeping a short head and tail.
pub fn mask_secret(value: &str) -> String {
    const HEAD: usize = 12;
    const TAIL: usize = 6;
    if value.is_empty() {
        return String::new();
    }
    if value.len() <= HEAD + TAIL + 1 {
        let head: String = value.chars().take(2).collect();
        return format!("{head}…");
    }
    let head: String = value.chars().take(HEAD).collect();
    let tail: String = value
        .chars()
        .skip(value.chars().count().saturating_sub(TAIL))
        .collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(expire_at: Option<i64>, refresh: Option<&str>) -> TokenBundle {
        TokenBundle {
            access_token: "at".to_string(),
            access_token_expire_at: expire_at,
            refresh_token: refresh.map(|s| s.to_string()),
            refresh_token_expire_at: None,
        }
    }

    #[test]
    fn test_needs_refresh_false_without_expiry() {
        assert!(!bundle(None, Some("rt")).needs_refresh(300));
        assert!(!bundle(None, Some("rt")).needs_refresh(0));
    }

    #[test]
    fn test_needs_refresh_true_within_threshold() {
        let expire_at = now_epoch() + 100;
        assert!(bundle(Some(expire_at), Some("rt")).needs_refresh(300));
    }

    #[test]
    fn test_needs_refresh_false_outside_threshold() {
        let expire_at = now_epoch() + 3600;
        assert!(!bundle(Some(expire_at), Some("rt")).needs_refresh(300));
    }

    #[test]
    fn test_needs_refresh_zero_threshold_expired() {
        let expire_at = now_epoch() - 1;
        assert!(bundle(Some(expire_at), None).needs_refresh(0));
    }

    #[test]
    fn test_can_refresh() {
        assert!(bundle(None, Some("rt")).can_refresh());
        assert!(!bundle(None, None).can_refresh());
        assert!(!bundle(None, Some("")).can_refresh());
    }

    #[test]
    fn test_decode_jwt_exp() {
        // header={"alg":"none"}, payload={"exp": 123}
        let token = "eyJhbGciOiJub25lIn0.eyJleHAiOjEyM30.";
        assert_eq!(decode_jwt_exp(token), Some(123));
    }

    #[test]
    fn test_decode_jwt_exp_malformed() {
        assert_eq!(decode_jwt_exp(""), None);
        assert_eq!(decode_jwt_exp("no-dots-here"), None);
        assert_eq!(decode_jwt_exp("a.not-base64!.c"), None);
    }

    #[test]
    fn test_decode_jwt_exp_missing_claim() {
        // payload={"sub":"x"}
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"x"}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(decode_jwt_exp(&token), None);
    }

    #[test]
    fn test_from_access_token_decodes_expiry() {
        let token = "eyJhbGciOiJub25lIn0.eyJleHAiOjEyM30.";
        let bundle = TokenBundle::from_access_token(token, Some("rt".to_string()));
        assert_eq!(bundle.access_token_expire_at, Some(123));
        assert_eq!(bundle.refresh_token.as_deref(), Some("rt"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("short"), "sh…");
        let masked = mask_secret("0123456789abcdefghijklmnop");
        assert_eq!(masked, "0123456789ab…klmnop");
    }
}
