//! PostgreSQL storage backend for ChainIngest.
//!
//! Persists decoded rows and per-chain checkpoints. Uses `sqlx` with
//! connection pooling.
//!
//! # Feature Flag
//! Requires the `postgres` feature:
//! ```toml
//! chainingest-storage = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! # Schema
//! Created automatically on first connect:
//! - `chainingest_rows` — decoded rows, unique on `(chain_id, block_number, log_index)`
//! - `chainingest_checkpoints` — one row per chain: last fully-ingested block

use async_trait::async_trait;
use sqlx::{PgPool, Row as SqlxRow};
use tracing::{debug, info};

use chainingest_core::checkpoint::{Checkpoint, CheckpointStore};
use chainingest_core::error::IngestError;
use chainingest_core::integration::Row;
use chainingest_core::sink::RowSink;

// ─── Connection options ───────────────────────────────────────────────────────

/// Connection options for the Postgres backend.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: u32,
    /// Minimum number of idle connections to keep open (default: 1)
    pub min_connections: u32,
    /// Connection timeout in seconds (default: 30)
    pub connect_timeout_secs: u64,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

// ─── PostgresSink ─────────────────────────────────────────────────────────────

/// PostgreSQL-backed sink for decoded rows and checkpoints.
///
/// Thread-safe and cheaply cloneable — wraps a connection pool internally.
#[derive(Clone)]
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    /// Connect to a PostgreSQL database and initialize the schema.
    ///
    /// The URL format follows libpq convention:
    /// `postgresql://[user[:password]@][host][:port][/dbname]`
    pub async fn connect(database_url: &str) -> Result<Self, IngestError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| IngestError::Storage(format!("postgres connect: {e}")))?;

        let sink = Self { pool };
        sink.init_schema().await?;
        info!("PostgresSink connected and schema initialized");
        Ok(sink)
    }

    /// Connect with custom pool options.
    pub async fn connect_with_options(
        database_url: &str,
        opts: PostgresOptions,
    ) -> Result<Self, IngestError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .min_connections(opts.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(opts.connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| IngestError::Storage(format!("postgres connect: {e}")))?;

        let sink = Self { pool };
        sink.init_schema().await?;
        Ok(sink)
    }

    /// Create tables and indexes if they don't already exist.
    async fn init_schema(&self) -> Result<(), IngestError> {
        // Rows table: the idempotency key is the primary constraint.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chainingest_rows (
                id           BIGSERIAL PRIMARY KEY,
                chain_id     BIGINT    NOT NULL,
                block_number BIGINT    NOT NULL,
                log_index    INTEGER   NOT NULL,
                integration  TEXT      NOT NULL,
                tx_hash      TEXT      NOT NULL,
                address      TEXT      NOT NULL,
                row_data     JSONB     NOT NULL,
                ingested_at  BIGINT    NOT NULL DEFAULT EXTRACT(EPOCH FROM NOW())::BIGINT,
                UNIQUE (chain_id, block_number, log_index)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::Storage(e.to_string()))?;

        // Checkpoints table: one row per chain.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chainingest_checkpoints (
                chain_id     BIGINT PRIMARY KEY,
                source       TEXT   NOT NULL,
                block_number BIGINT NOT NULL,
                updated_at   BIGINT NOT NULL DEFAULT EXTRACT(EPOCH FROM NOW())::BIGINT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::Storage(e.to_string()))?;

        // Indexes for common query patterns.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chainingest_rows_integration
             ON chainingest_rows(integration, chain_id, block_number DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chainingest_rows_address
             ON chainingest_rows(chain_id, address, block_number DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::Storage(e.to_string()))?;

        debug!("PostgresSink schema initialized");
        Ok(())
    }

    /// Query rows for a chain and integration in a block window.
    pub async fn query_rows(
        &self,
        chain_id: u64,
        integration: &str,
        from_block: u64,
        to_block: u64,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, IngestError> {
        let rows = sqlx::query(
            "SELECT row_data FROM chainingest_rows
             WHERE chain_id = $1
               AND integration = $2
               AND block_number >= $3
               AND block_number <= $4
             ORDER BY block_number ASC, log_index ASC
             LIMIT $5",
        )
        .bind(chain_id as i64)
        .bind(integration)
        .bind(from_block as i64)
        .bind(to_block as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IngestError::Storage(e.to_string()))?;

        rows.iter()
            .map(|row| row.try_get::<serde_json::Value, _>("row_data"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| IngestError::Storage(e.to_string()))
    }

    /// Get the underlying connection pool (for custom queries).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─── RowSink impl ─────────────────────────────────────────────────────────────

#[async_trait]
impl RowSink for PostgresSink {
    async fn write_rows(&self, rows: &[Row]) -> Result<u64, IngestError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))?;

        let mut written = 0u64;
        for row in rows {
            let result = sqlx::query(
                "INSERT INTO chainingest_rows
                    (chain_id, block_number, log_index, integration, tx_hash, address, row_data)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (chain_id, block_number, log_index) DO NOTHING",
            )
            .bind(row.chain_id as i64)
            .bind(row.block_number as i64)
            .bind(row.log_index as i32)
            .bind(&row.integration)
            .bind(&row.tx_hash)
            .bind(&row.address)
            .bind(&row.values)
            .execute(&mut *tx)
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))?;
            written += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| IngestError::Storage(format!("commit batch: {e}")))?;

        Ok(written)
    }
}

// ─── CheckpointStore impl ─────────────────────────────────────────────────────

#[async_trait]
impl CheckpointStore for PostgresSink {
    async fn load(&self, chain_id: u64) -> Result<Option<Checkpoint>, IngestError> {
        let row = sqlx::query(
            "SELECT chain_id, source, block_number, updated_at
             FROM chainingest_checkpoints
             WHERE chain_id = $1",
        )
        .bind(chain_id as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IngestError::Storage(e.to_string()))?;

        Ok(row.map(|r| Checkpoint {
            chain_id: r.get::<i64, _>("chain_id") as u64,
            source: r.get::<String, _>("source"),
            block_number: r.get::<i64, _>("block_number") as u64,
            updated_at: r.get::<i64, _>("updated_at"),
        }))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IngestError> {
        sqlx::query(
            "INSERT INTO chainingest_checkpoints (chain_id, source, block_number, updated_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (chain_id)
             DO UPDATE SET
                source       = EXCLUDED.source,
                block_number = EXCLUDED.block_number,
                updated_at   = EXCLUDED.updated_at",
        )
        .bind(checkpoint.chain_id as i64)
        .bind(&checkpoint.source)
        .bind(checkpoint.block_number as i64)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| IngestError::Storage(e.to_string()))?;

        debug!(
            "checkpoint saved: chain={} source={} block={}",
            checkpoint.chain_id, checkpoint.source, checkpoint.block_number
        );
        Ok(())
    }

    async fn delete(&self, chain_id: u64) -> Result<(), IngestError> {
        sqlx::query("DELETE FROM chainingest_checkpoints WHERE chain_id = $1")
            .bind(chain_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| IngestError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Integration tests require a running PostgreSQL instance.
    // Set DATABASE_URL environment variable to enable.
    // Example: DATABASE_URL=postgresql://localhost/chainingest_test cargo test

    use super::*;
    use serde_json::json;

    fn transfer_row(block: u64, log_index: u32) -> Row {
        Row {
            integration: "transfers".into(),
            chain_id: 1,
            block_number: block,
            log_index,
            tx_hash: format!("0xtx{block}"),
            address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".into(),
            values: json!({
                "contract_address": "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
                "from": "0xd8da6bf26964af9d7eed9e03e53415d37aa96045",
                "to": "0xab5801a7d398351b8be11c439e05c5b3259aec9b",
                "value": "1000000",
                "token_decimal": 6,
                "token_symbol": "USDC",
            }),
        }
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL (set DATABASE_URL to enable)"]
    async fn postgres_rows_are_idempotent() {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for integration tests");
        let sink = PostgresSink::connect(&url).await.unwrap();

        let rows = [transfer_row(19_000_000, 0), transfer_row(19_000_000, 1)];
        let first = sink.write_rows(&rows).await.unwrap();
        assert_eq!(first, 2);

        // Replaying the same batch writes nothing.
        let second = sink.write_rows(&rows).await.unwrap();
        assert_eq!(second, 0);

        let stored = sink
            .query_rows(1, "transfers", 19_000_000, 19_000_000, 10)
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);

        // Clean up
        sqlx::query("DELETE FROM chainingest_rows WHERE chain_id = 1 AND block_number = 19000000")
            .execute(sink.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL (set DATABASE_URL to enable)"]
    async fn postgres_checkpoint_roundtrip() {
        let url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set for integration tests");
        let sink = PostgresSink::connect(&url).await.unwrap();

        let checkpoint = Checkpoint {
            chain_id: 999_999,
            source: "testnet".to_string(),
            block_number: 19_000_000,
            updated_at: 1_700_000_000,
        };
        sink.save(checkpoint).await.unwrap();

        let loaded = sink
            .load(999_999)
            .await
            .unwrap()
            .expect("checkpoint not found");
        assert_eq!(loaded.block_number, 19_000_000);
        assert_eq!(loaded.source, "testnet");

        // Clean up
        sink.delete(999_999).await.unwrap();
        assert!(sink.load(999_999).await.unwrap().is_none());
    }
}
