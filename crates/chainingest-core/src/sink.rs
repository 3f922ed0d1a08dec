//! The persistence seam between the engine and its storage backends.

use async_trait::async_trait;

use crate::error::IngestError;
use crate::integration::Row;

/// A sink that persists decoded rows.
///
/// Implementations MUST be idempotent on `(chain_id, block_number, log_index)`:
/// writing the same row twice leaves exactly one row behind. This is what lets
/// the engine resume from a checkpoint and replay overlapping ranges safely.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Persist a batch of rows. Returns the number of rows actually written
    /// (duplicates are counted as zero).
    async fn write_rows(&self, rows: &[Row]) -> Result<u64, IngestError>;
}
