//! # biji-core
//!
//! Core types and abstractions for the bijicrawl note harvester.
//!
//! This crate provides the foundational data structures (token bundles,
//! response envelope parsing, the persisted record model, and crawl
//! configuration) that the client and storage crates depend on.

pub mod config;
pub mod defaults;
pub mod envelope;
pub mod error;
pub mod models;
pub mod token;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{CollectionNames, CrawlConfig};
pub use envelope::{parse_link_detail, parse_notes_page, parse_refresh_response};
pub use error::{Error, Result};
pub use models::{is_link_note, note_identity, LinkDetail, NotesPage, Record, RecordKind};
pub use token::{decode_jwt_exp, mask_secret, now_epoch, TokenBundle};
pub use traits::RecordSink;
