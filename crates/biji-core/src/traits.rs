//! Shared trait seams between the crawl loop and its consumers.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Record;

/// Destination for records emitted by a crawl run.
///
/// The cursor walker awaits every emit before advancing the cursor, so an
/// implementation's completion order is the page order of the listing. Detail
/// records may arrive interleaved from concurrent resolver tasks.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn emit(&self, record: Record) -> Result<()>;
}
