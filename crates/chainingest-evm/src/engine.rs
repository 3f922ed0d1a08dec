//! The ingest engine — one loop per configured source.
//!
//! # Phase 1: BACKFILL
//! Fetch ranges from the resume point (checkpoint + 1, or `from_block`) to the
//! chain head through the concurrency-bounded poller. For each range, in
//! order: route logs → write rows → advance the checkpoint.
//!
//! # Phase 2: LIVE
//! Poll for new blocks every `poll_interval_ms` and ingest them one range at
//! a time.
//!
//! Overlap after a crash is harmless: the sink is idempotent on
//! `(chain_id, block_number, log_index)`.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use chainingest_core::checkpoint::{CheckpointManager, CheckpointStore};
use chainingest_core::config::Source;
use chainingest_core::error::IngestError;
use chainingest_core::integration::{IntegrationRouter, Row};
use chainingest_core::sink::RowSink;
use chainingest_core::types::{IngestPhase, LogFilter, RawLog};

use crate::fetcher::EvmRpcClient;
use crate::poller::BlockPoller;

/// Engine knobs that are not part of the declarative config.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// First block to ingest when no checkpoint exists.
    pub from_block: u64,
    /// Optional end block (for bounded runs and tests). `None` = run forever.
    pub to_block: Option<u64>,
    /// Live-phase polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// How often to save a checkpoint (every N blocks).
    pub checkpoint_interval: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            from_block: 0,
            to_block: None,
            poll_interval_ms: 2000,
            checkpoint_interval: 100,
        }
    }
}

/// Multi-source ingest engine: spawns one ingest loop per source and runs
/// them to completion (bounded runs) or forever.
pub struct IngestEngine {
    router: Arc<IntegrationRouter>,
    sink: Arc<dyn RowSink>,
    checkpoints: Arc<dyn CheckpointStore>,
    options: EngineOptions,
    sources: Vec<(Source, Arc<dyn EvmRpcClient>)>,
}

impl IngestEngine {
    pub fn new(
        router: Arc<IntegrationRouter>,
        sink: Arc<dyn RowSink>,
        checkpoints: Arc<dyn CheckpointStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            router,
            sink,
            checkpoints,
            options,
            sources: vec![],
        }
    }

    /// Register a source together with the RPC client that serves it.
    pub fn add_source(&mut self, source: Source, client: Arc<dyn EvmRpcClient>) {
        self.sources.push((source, client));
    }

    /// Run all source loops to completion. Returns the first error.
    pub async fn run(self) -> Result<(), IngestError> {
        tracing::info!(sources = self.sources.len(), "ingest engine starting");

        let mut handles = Vec::new();
        for (source, client) in self.sources {
            let router = Arc::clone(&self.router);
            let sink = Arc::clone(&self.sink);
            let checkpoints = Arc::clone(&self.checkpoints);
            let options = self.options.clone();
            handles.push(tokio::spawn(async move {
                run_source(source, client, router, sink, checkpoints, options).await
            }));
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| IngestError::Aborted {
                    reason: format!("source task panicked: {e}"),
                })??;
        }
        Ok(())
    }
}

/// The per-source ingest loop.
async fn run_source(
    source: Source,
    client: Arc<dyn EvmRpcClient>,
    router: Arc<IntegrationRouter>,
    sink: Arc<dyn RowSink>,
    checkpoints: Arc<dyn CheckpointStore>,
    options: EngineOptions,
) -> Result<(), IngestError> {
    let filter = LogFilter {
        addresses: vec![],
        topic0_values: router.topic0_values(),
    };
    let mut checkpoint =
        CheckpointManager::new(checkpoints, source.chain_id, &source.name, options.checkpoint_interval);

    // Resume from the last checkpoint if one exists.
    let mut next = match checkpoint.load().await? {
        Some(cp) => {
            tracing::info!(
                source = %source.name,
                chain_id = source.chain_id,
                block = cp.block_number,
                "resuming from checkpoint"
            );
            cp.block_number + 1
        }
        None => options.from_block,
    };

    // Phase 1: Backfill
    let head = client.get_block_number().await?;
    let target = match options.to_block {
        Some(to) => to.min(head),
        None => head,
    };

    if next <= target {
        tracing::info!(
            source = %source.name,
            chain_id = source.chain_id,
            from = next,
            target,
            phase = %IngestPhase::Backfill,
            "starting backfill"
        );

        let poller = BlockPoller::for_source(Arc::clone(&client), &source);
        let mut ranges = pin!(poller.stream(next, target, filter.clone()));
        while let Some(batch) = ranges.next().await {
            let batch = batch?;
            let rows = route_logs(&router, source.chain_id, &batch.logs)?;
            let written = sink.write_rows(&rows).await?;
            tracing::info!(
                source = %source.name,
                from = batch.range.from,
                to = batch.range.to,
                logs = batch.logs.len(),
                rows = written,
                "range ingested"
            );
            checkpoint.maybe_save(batch.range.to, batch.range.blocks()).await?;
            next = batch.range.to + 1;
        }
        checkpoint.force_save(target).await?;
        tracing::info!(source = %source.name, at = target, "backfill complete");
    }

    if let Some(to) = options.to_block {
        if next > to {
            return Ok(());
        }
    }

    // Phase 2: Live
    let poll_interval = Duration::from_millis(options.poll_interval_ms);
    loop {
        tokio::time::sleep(poll_interval).await;

        let head = client.get_block_number().await?;
        if head < next {
            continue; // Nothing new yet
        }

        let mut to = (next + source.batch_size - 1).min(head);
        if let Some(limit) = options.to_block {
            to = to.min(limit);
        }

        let logs = client.get_logs(next, to, &filter).await?;
        let rows = route_logs(&router, source.chain_id, &logs)?;
        let written = sink.write_rows(&rows).await?;
        tracing::debug!(
            source = %source.name,
            from = next,
            to,
            rows = written,
            phase = %IngestPhase::Live,
            "range ingested"
        );
        checkpoint.maybe_save(to, to - next + 1).await?;
        next = to + 1;

        if let Some(limit) = options.to_block {
            if next > limit {
                checkpoint.force_save(limit).await?;
                return Ok(());
            }
        }
    }
}

/// Route a batch of logs through the integrations, skipping logs the node
/// flagged as removed.
fn route_logs(
    router: &IntegrationRouter,
    chain_id: u64,
    logs: &[RawLog],
) -> Result<Vec<Row>, IngestError> {
    let mut rows = Vec::new();
    for log in logs {
        if log.removed {
            continue;
        }
        rows.extend(router.route(chain_id, log)?);
    }
    Ok(rows)
}
