//! # biji-client
//!
//! HTTP client for the notes API: token refresh, the paginated listing
//! walker, and link detail resolution.

pub mod api;
pub mod auth;
pub mod mock;
pub mod token;
pub mod walker;

pub use api::{HttpNotesClient, ListingOutcome, NotesBackend};
pub use auth::{HttpRefresher, RefreshTokens};
pub use token::TokenStore;
pub use walker::{CrawlSummary, CursorWalker};

/// Correlation id for outbound requests: current Unix time in milliseconds,
/// matching what the service's own web client sends.
pub fn request_id() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}
