//! In-memory storage backend.
//!
//! Holds decoded rows and checkpoints in RAM. Useful for tests and for
//! short-lived runs that don't need persistence. Honors the same idempotency
//! contract as the Postgres backend.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chainingest_core::checkpoint::{Checkpoint, CheckpointStore};
use chainingest_core::error::IngestError;
use chainingest_core::integration::Row;
use chainingest_core::sink::RowSink;

/// In-memory row sink and checkpoint store.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct InMemorySink {
    rows: Mutex<Vec<Row>>,
    seen: Mutex<HashSet<(u64, u64, u32)>>,
    checkpoints: Mutex<HashMap<u64, Checkpoint>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of persisted rows.
    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// All rows produced by a given integration (e.g. `"transfers"`).
    pub fn rows_for(&self, integration: &str) -> Vec<Row> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.integration == integration)
            .cloned()
            .collect()
    }

    /// All rows for a chain, ordered by `(block_number, log_index)`.
    pub fn rows_for_chain(&self, chain_id: u64) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.chain_id == chain_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.block_number, r.log_index));
        rows
    }
}

#[async_trait]
impl RowSink for InMemorySink {
    async fn write_rows(&self, rows: &[Row]) -> Result<u64, IngestError> {
        let mut seen = self.seen.lock().unwrap();
        let mut stored = self.rows.lock().unwrap();
        let mut written = 0u64;
        for row in rows {
            if seen.insert(row.key()) {
                stored.push(row.clone());
                written += 1;
            }
        }
        Ok(written)
    }
}

#[async_trait]
impl CheckpointStore for InMemorySink {
    async fn load(&self, chain_id: u64) -> Result<Option<Checkpoint>, IngestError> {
        Ok(self.checkpoints.lock().unwrap().get(&chain_id).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IngestError> {
        self.checkpoints
            .lock()
            .unwrap()
            .insert(checkpoint.chain_id, checkpoint);
        Ok(())
    }

    async fn delete(&self, chain_id: u64) -> Result<(), IngestError> {
        self.checkpoints.lock().unwrap().remove(&chain_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(chain_id: u64, block: u64, log_index: u32) -> Row {
        Row {
            integration: "transfers".into(),
            chain_id,
            block_number: block,
            log_index,
            tx_hash: "0x0".into(),
            address: "0x0".into(),
            values: json!({}),
        }
    }

    #[tokio::test]
    async fn writes_are_idempotent() {
        let sink = InMemorySink::new();
        let rows = [row(1, 100, 0), row(1, 100, 1)];

        assert_eq!(sink.write_rows(&rows).await.unwrap(), 2);
        // Same batch again: nothing new.
        assert_eq!(sink.write_rows(&rows).await.unwrap(), 0);
        assert_eq!(sink.row_count(), 2);
    }

    #[tokio::test]
    async fn same_position_on_different_chains_is_distinct() {
        let sink = InMemorySink::new();
        sink.write_rows(&[row(1, 100, 0), row(8453, 100, 0)])
            .await
            .unwrap();
        assert_eq!(sink.row_count(), 2);
        assert_eq!(sink.rows_for_chain(8453).len(), 1);
    }

    #[tokio::test]
    async fn rows_for_chain_is_ordered() {
        let sink = InMemorySink::new();
        sink.write_rows(&[row(1, 200, 1), row(1, 100, 5), row(1, 200, 0)])
            .await
            .unwrap();
        let ordered: Vec<_> = sink
            .rows_for_chain(1)
            .into_iter()
            .map(|r| (r.block_number, r.log_index))
            .collect();
        assert_eq!(ordered, [(100, 5), (200, 0), (200, 1)]);
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let sink = InMemorySink::new();
        let cp = Checkpoint {
            chain_id: 1,
            source: "mainnet".into(),
            block_number: 1000,
            updated_at: 0,
        };
        sink.save(cp).await.unwrap();
        let loaded = sink.load(1).await.unwrap().unwrap();
        assert_eq!(loaded.block_number, 1000);
        sink.delete(1).await.unwrap();
        assert!(sink.load(1).await.unwrap().is_none());
    }
}
