//! Typed parsing of the two-part `{h, c}` response envelope.
//!
//! Every remote call wraps its payload in a header block `h` carrying a
//! status code `c` (0, "0", or absent means success) and error message `e`,
//! plus a content block `c`. Parsing validates at the boundary and rejects on
//! the first malformed field instead of passing untyped maps around.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{note_identity, LinkDetail, NotesPage};
use crate::token::TokenBundle;

/// Envelope status header.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub c: Option<Value>,
    #[serde(default)]
    pub e: Option<String>,
}

impl Header {
    /// Returns the `(code, message)` pair when the header signals an API
    /// failure. `0`, `"0"`, and absent all mean success.
    pub fn failure(&self) -> Option<(String, String)> {
        let code = match &self.c {
            None | Some(Value::Null) => return None,
            Some(Value::Number(n)) if n.as_i64() == Some(0) => return None,
            Some(Value::String(s)) if s == "0" => return None,
            Some(other) => other.to_string(),
        };
        let message = self.e.clone().unwrap_or_default();
        Some((code, message))
    }
}

#[derive(Debug, Default, Deserialize)]
struct RefreshEnvelope {
    #[serde(default)]
    h: Header,
    #[serde(default)]
    c: Option<RefreshContent>,
}

#[derive(Debug, Default, Deserialize)]
struct RefreshContent {
    #[serde(default)]
    token: Option<TokenObject>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenObject {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    token_expire_at: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    refresh_token_expire_at: Option<i64>,
}

/// Parse a refresh endpoint response into a new token bundle.
///
/// Fails with [`Error::Auth`] when the envelope reports a non-zero status and
/// with [`Error::Protocol`] when a success envelope is missing the token
/// string.
pub fn parse_refresh_response(payload: &Value) -> Result<TokenBundle> {
    let envelope: RefreshEnvelope = serde_json::from_value(payload.clone())
        .map_err(|e| Error::Protocol(format!("malformed refresh envelope: {e}")))?;

    if let Some((code, message)) = envelope.h.failure() {
        return Err(Error::Auth(format!("API error: h.c={code} h.e={message}")));
    }

    let token_obj = envelope.c.and_then(|c| c.token).unwrap_or_default();
    let token = token_obj.token.unwrap_or_default();
    if token.is_empty() {
        return Err(Error::Protocol(
            "missing token in refresh response".to_string(),
        ));
    }

    Ok(TokenBundle {
        access_token: token,
        access_token_expire_at: token_obj.token_expire_at,
        refresh_token: token_obj.refresh_token,
        refresh_token_expire_at: token_obj.refresh_token_expire_at,
    })
}

#[derive(Debug, Default, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    h: Header,
    #[serde(default)]
    c: Option<ListContent>,
}

#[derive(Debug, Default, Deserialize)]
struct ListContent {
    #[serde(default)]
    list: Option<Value>,
}

/// Parse a listing endpoint response into a [`NotesPage`].
///
/// `should_continue` is true iff the page filled `limit` AND a next cursor
/// could be derived from the last record; a short page always terminates
/// pagination regardless of cursor availability.
pub fn parse_notes_page(payload: &Value, limit: usize) -> Result<NotesPage> {
    let envelope: ListEnvelope = serde_json::from_value(payload.clone())
        .map_err(|e| Error::Protocol(format!("malformed listing envelope: {e}")))?;

    if let Some((code, message)) = envelope.h.failure() {
        return Err(Error::Protocol(format!(
            "API error: h.c={code} h.e={message}"
        )));
    }

    let notes = match envelope.c.and_then(|c| c.list) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(Error::Protocol("payload.c.list must be a list".to_string()));
        }
    };

    let next_since_id = notes.last().and_then(note_identity);
    let should_continue = notes.len() >= limit && next_since_id.is_some();

    Ok(NotesPage {
        notes,
        next_since_id,
        should_continue,
    })
}

/// Loose truthiness for envelope fields that are not reliably typed upstream.
fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        _ => false,
    }
}

/// Parse a link detail endpoint response.
///
/// Fails with [`Error::Protocol`] when the content block is missing or not an
/// object.
pub fn parse_link_detail(payload: &Value) -> Result<LinkDetail> {
    let header: Header = payload
        .get("h")
        .map(|h| {
            serde_json::from_value(h.clone())
                .map_err(|e| Error::Protocol(format!("malformed detail envelope: {e}")))
        })
        .transpose()?
        .unwrap_or_default();

    if let Some((code, message)) = header.failure() {
        return Err(Error::Protocol(format!(
            "API error: h.c={code} h.e={message}"
        )));
    }

    let content = match payload.get("c") {
        Some(c @ Value::Object(_)) => c.clone(),
        _ => return Err(Error::Protocol("payload.c must be an object".to_string())),
    };

    let field = |key: &str| -> String {
        content
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let title = field("title");
    let web_title = field("web_title");
    let text = field("content");
    let url = field("url");
    let has_content = truthy(content.get("has_content"));

    Ok(LinkDetail {
        title,
        web_title,
        content: text,
        url,
        has_content,
        raw: content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_with_ids(ids: &[&str]) -> Value {
        let list: Vec<Value> = ids.iter().map(|i| json!({"id": i})).collect();
        json!({"h": {"c": 0, "e": ""}, "c": {"list": list}})
    }

    #[test]
    fn test_notes_page_continue_when_len_eq_limit() {
        let page = parse_notes_page(&payload_with_ids(&["a", "b", "c"]), 3).unwrap();
        assert!(page.should_continue);
        assert_eq!(page.next_since_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_notes_page_stop_when_len_lt_limit() {
        let page = parse_notes_page(&payload_with_ids(&["a", "b"]), 3).unwrap();
        assert!(!page.should_continue);
        assert_eq!(page.next_since_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_notes_page_stop_when_empty() {
        let page = parse_notes_page(&payload_with_ids(&[]), 100).unwrap();
        assert!(!page.should_continue);
        assert_eq!(page.next_since_id, None);
    }

    #[test]
    fn test_notes_page_stop_when_last_entry_has_no_identity() {
        let payload = json!({"h": {"c": 0}, "c": {"list": [{"id": "a"}, {"x": 1}]}});
        let page = parse_notes_page(&payload, 2).unwrap();
        assert!(!page.should_continue);
        assert_eq!(page.next_since_id, None);
    }

    #[test]
    fn test_notes_page_string_status_code_ok() {
        let payload = json!({"h": {"c": "0"}, "c": {"list": []}});
        assert!(parse_notes_page(&payload, 10).is_ok());
    }

    #[test]
    fn test_notes_page_api_error() {
        let payload = json!({"h": {"c": 401, "e": "expired"}, "c": {}});
        let err = parse_notes_page(&payload, 10).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("h.c=401"));
    }

    #[test]
    fn test_notes_page_rejects_non_list() {
        let payload = json!({"h": {"c": 0}, "c": {"list": "nope"}});
        let err = parse_notes_page(&payload, 10).unwrap_err();
        assert!(err.to_string().contains("must be a list"));
    }

    #[test]
    fn test_refresh_response_minimal() {
        let payload = json!({
            "h": {"c": 0, "e": ""},
            "c": {
                "token": {
                    "token": "header.payload.signature",
                    "token_expire_at": 123,
                    "refresh_token": "rt",
                    "refresh_token_expire_at": 456,
                }
            }
        });
        let bundle = parse_refresh_response(&payload).unwrap();
        assert_eq!(bundle.access_token, "header.payload.signature");
        assert_eq!(bundle.access_token_expire_at, Some(123));
        assert_eq!(bundle.refresh_token.as_deref(), Some("rt"));
        assert_eq!(bundle.refresh_token_expire_at, Some(456));
    }

    #[test]
    fn test_refresh_response_nonzero_status_is_auth_error() {
        let payload = json!({"h": {"c": 10001, "e": "bad refresh token"}, "c": {}});
        let err = parse_refresh_response(&payload).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(err.to_string().contains("h.c=10001"));
    }

    #[test]
    fn test_refresh_response_missing_token_is_protocol_error() {
        let payload = json!({"h": {"c": 0}, "c": {"token": {"token_expire_at": 1}}});
        let err = parse_refresh_response(&payload).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_refresh_response_absent_header_is_success() {
        let payload = json!({"c": {"token": {"token": "t"}}});
        let bundle = parse_refresh_response(&payload).unwrap();
        assert_eq!(bundle.access_token, "t");
        assert_eq!(bundle.access_token_expire_at, None);
    }

    #[test]
    fn test_link_detail_ok() {
        let payload = json!({
            "h": {"c": 0, "e": ""},
            "c": {
                "title": "t",
                "web_title": "wt",
                "content": "c",
                "url": "u",
                "has_content": true,
            }
        });
        let detail = parse_link_detail(&payload).unwrap();
        assert_eq!(detail.title, "t");
        assert_eq!(detail.web_title, "wt");
        assert_eq!(detail.content, "c");
        assert_eq!(detail.url, "u");
        assert!(detail.has_content);
        assert_eq!(detail.raw["title"], "t");
    }

    #[test]
    fn test_link_detail_rejects_missing_content() {
        let payload = json!({"h": {"c": 0}});
        let err = parse_link_detail(&payload).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_link_detail_truthy_has_content() {
        let payload = json!({"h": {"c": 0}, "c": {"has_content": 1}});
        assert!(parse_link_detail(&payload).unwrap().has_content);
        let payload = json!({"h": {"c": 0}, "c": {"has_content": 0}});
        assert!(!parse_link_detail(&payload).unwrap().has_content);
        let payload = json!({"h": {"c": 0}, "c": {}});
        assert!(!parse_link_detail(&payload).unwrap().has_content);
    }
}
