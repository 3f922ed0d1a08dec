//! chainingest-evm — EVM side of the ingestion engine.
//!
//! # Architecture
//!
//! ```text
//! IngestEngine → one loop per Source
//!                    ├── BlockPoller     (batched, concurrency-bounded eth_getLogs)
//!                    ├── IntegrationRouter (topics[0] → decode rules, e.g. transfers)
//!                    ├── CheckpointManager (resume after restart)
//!                    └── RowSink          (idempotent persistence)
//! ```

pub mod engine;
pub mod fetcher;
pub mod http;
pub mod poller;
pub mod sig;
pub mod transfers;

pub use engine::{EngineOptions, IngestEngine};
pub use fetcher::{EthLog, EvmRpcClient};
pub use http::{HttpClientConfig, HttpRpcClient};
pub use poller::{BlockPoller, BlockRange, RangeLogs};
pub use sig::event_topic0;
pub use transfers::{TokenMetadata, TransfersIntegration, TRANSFER_SIGNATURE};
