//! Error types for the chainingest pipeline.

use thiserror::Error;

/// Validation and artifact errors for the declarative configuration.
///
/// Every way a config can be malformed is a distinct variant so callers can
/// match on the failure instead of parsing message text.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate chain id {chain_id}: already registered")]
    DuplicateChainId { chain_id: u64 },

    #[error("source '{source_name}': batch_size must be >= 1 (got {value})")]
    InvalidBatchSize { source_name: String, value: u64 },

    #[error("source '{source_name}': concurrency must be >= 1 (got {value})")]
    InvalidConcurrency { source_name: String, value: u64 },

    #[error("source name must not be empty")]
    EmptySourceName,

    #[error("source '{source_name}': rpc url must not be empty")]
    EmptyRpcUrl { source_name: String },

    #[error("duplicate integration '{name}'")]
    DuplicateIntegration { name: String },

    #[error("environment variable '{name}' is not set")]
    UnsetVariable { name: String },

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("config artifact io error: {0}")]
    Io(String),
}

/// Errors that can occur while the ingestion engine is running.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Decode error in '{integration}': {reason}")]
    Decode { integration: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Ingestion aborted: {reason}")]
    Aborted { reason: String },

    #[error("{0}")]
    Other(String),
}

impl IngestError {
    /// Returns `true` if the error came from the RPC transport.
    pub fn is_rpc(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}
