//! chainingest-core — foundation for the declarative multi-chain log-ingestion
//! engine.
//!
//! # Architecture
//!
//! ```text
//! IngestConfig (config.json)
//!      ├── SourceRegistry     (chains to poll, unique by chain id)
//!      ├── IntegrationRouter  (topics[0] → decode rules)
//!      ├── CheckpointManager  (crash recovery)
//!      └── RowSink            (idempotent persistence: memory / Postgres)
//! ```
//!
//! The config is built once, validated, and serialized to a `config.json`
//! artifact; the engine in `chainingest-evm` drives polling, routing, and
//! persistence from it.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod integration;
pub mod registry;
pub mod sink;
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStore};
pub use config::{resolve_env, IngestConfig, Source};
pub use error::{ConfigError, IngestError};
pub use integration::{Integration, IntegrationRouter, IntegrationSpec, Row};
pub use registry::SourceRegistry;
pub use sink::RowSink;
pub use types::{IngestPhase, LogFilter, RawLog};
