//! Checkpoint manager — persists each source's ingest position for crash
//! recovery.
//!
//! A checkpoint stores the last fully-ingested block number per chain. On
//! restart, the engine resumes from the checkpoint rather than re-ingesting
//! from scratch; the sink's idempotency keys make the overlap harmless.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::IngestError;

/// A persisted checkpoint for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// EVM chain id.
    pub chain_id: u64,
    /// Source name (e.g. `"mainnet"`).
    pub source: String,
    /// Last fully-ingested block number.
    pub block_number: u64,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

/// Trait for storing and loading checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the latest checkpoint for a chain.
    async fn load(&self, chain_id: u64) -> Result<Option<Checkpoint>, IngestError>;

    /// Save (upsert) a checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IngestError>;

    /// Delete a checkpoint (e.g. when resetting a source).
    async fn delete(&self, chain_id: u64) -> Result<(), IngestError>;
}

/// Manages checkpoint reads/writes for one source's ingest loop.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    chain_id: u64,
    source: String,
    /// How often to save (every N blocks).
    save_interval: u64,
    /// Block counter since last save.
    counter: u64,
}

impl CheckpointManager {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        chain_id: u64,
        source: impl Into<String>,
        save_interval: u64,
    ) -> Self {
        Self {
            store,
            chain_id,
            source: source.into(),
            save_interval,
            counter: 0,
        }
    }

    /// Load the saved checkpoint (returns `None` if none exists).
    pub async fn load(&self) -> Result<Option<Checkpoint>, IngestError> {
        self.store.load(self.chain_id).await
    }

    /// Conditionally save a checkpoint every `save_interval` blocks.
    ///
    /// Call after each block range is fully persisted; `blocks` is the number
    /// of blocks the range covered.
    pub async fn maybe_save(&mut self, block_number: u64, blocks: u64) -> Result<(), IngestError> {
        self.counter += blocks;
        if self.counter >= self.save_interval {
            self.force_save(block_number).await?;
            self.counter = 0;
        }
        Ok(())
    }

    /// Immediately save a checkpoint (used on phase transitions and shutdown).
    pub async fn force_save(&self, block_number: u64) -> Result<(), IngestError> {
        let cp = Checkpoint {
            chain_id: self.chain_id,
            source: self.source.clone(),
            block_number,
            updated_at: chrono::Utc::now().timestamp(),
        };
        tracing::debug!(
            chain_id = self.chain_id,
            source = %self.source,
            block = block_number,
            "checkpoint saved"
        );
        self.store.save(cp).await
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory checkpoint store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<u64, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, chain_id: u64) -> Result<Option<Checkpoint>, IngestError> {
        Ok(self.data.lock().unwrap().get(&chain_id).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IngestError> {
        self.data
            .lock()
            .unwrap()
            .insert(checkpoint.chain_id, checkpoint);
        Ok(())
    }

    async fn delete(&self, chain_id: u64) -> Result<(), IngestError> {
        self.data.lock().unwrap().remove(&chain_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mgr = CheckpointManager::new(store, 1, "mainnet", 10);

        // No checkpoint initially
        assert!(mgr.load().await.unwrap().is_none());

        // Force save
        mgr.force_save(1000).await.unwrap();

        // Load should return the checkpoint
        let cp = mgr.load().await.unwrap().unwrap();
        assert_eq!(cp.block_number, 1000);
        assert_eq!(cp.chain_id, 1);
        assert_eq!(cp.source, "mainnet");
    }

    #[tokio::test]
    async fn checkpoint_save_interval() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mut mgr = CheckpointManager::new(store, 1, "mainnet", 5);

        // 4 blocks processed — should not save yet
        mgr.maybe_save(4, 4).await.unwrap();
        assert!(mgr.load().await.unwrap().is_none());

        // 5th block — should save
        mgr.maybe_save(5, 1).await.unwrap();
        let cp = mgr.load().await.unwrap().unwrap();
        assert_eq!(cp.block_number, 5);
    }

    #[tokio::test]
    async fn checkpoints_are_per_chain() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let mainnet = CheckpointManager::new(store.clone(), 1, "mainnet", 1);
        let base = CheckpointManager::new(store.clone(), 8453, "base", 1);

        mainnet.force_save(100).await.unwrap();
        base.force_save(9000).await.unwrap();

        assert_eq!(mainnet.load().await.unwrap().unwrap().block_number, 100);
        assert_eq!(base.load().await.unwrap().unwrap().block_number, 9000);

        store.delete(1).await.unwrap();
        assert!(mainnet.load().await.unwrap().is_none());
        assert!(base.load().await.unwrap().is_some());
    }
}
