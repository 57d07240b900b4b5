//! Default endpoints, limits, and timeouts for the crawl.

/// Paginated notes listing endpoint.
pub const NOTES_URL: &str = "https://get-notes.luojilab.com/voicenotes/web/notes";

/// Token refresh endpoint.
pub const REFRESH_URL: &str = "https://notes-api.biji.com/account/v2/web/user/auth/refresh";

/// Default page size for the listing endpoint.
pub const PAGE_LIMIT: usize = 100;

/// Default sort order for the listing endpoint.
pub const SORT_ORDER: &str = "create_desc";

/// Refresh the access token this many seconds before its expiry.
pub const REFRESH_BEFORE_SECS: i64 = 300;

/// Per-request HTTP timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// User agent sent when none is configured.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/144.0.0.0 Safari/537.36";

/// Sentinel message the listing endpoint returns when the session is invalid.
pub const LOGIN_REQUIRED: &str = "LoginRequired";

/// Note type marking an entry as an external link.
pub const LINK_NOTE_TYPE: &str = "link";

/// Default data directory for the disk store.
pub const DATA_DIR: &str = "data/store";

/// Default collection receiving `kind=note` records.
pub const NOTES_COLLECTION: &str = "notes";

/// Default collection receiving `kind=link_detail` records.
pub const DETAILS_COLLECTION: &str = "details";

/// Default catch-all collection for records without an identity.
pub const MISC_COLLECTION: &str = "misc";
