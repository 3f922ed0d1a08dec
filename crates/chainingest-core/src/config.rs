//! The declarative ingestion configuration and its JSON artifact.
//!
//! A config is constructed once, validated, serialized to `config.json`, and
//! never mutated by the running engine. Values like `$DATABASE_URL` are kept
//! verbatim in the artifact and only resolved from the process environment
//! when the engine starts.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::integration::IntegrationSpec;
use crate::registry::SourceRegistry;

// ─── Source ───────────────────────────────────────────────────────────────────

/// A configured blockchain network endpoint to poll for logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Human-readable source name (e.g. `"mainnet"`). Used for checkpoint keys.
    pub name: String,
    /// EVM chain id (e.g. 1 for Ethereum mainnet, 8453 for Base).
    pub chain_id: u64,
    /// JSON-RPC endpoint, or a `$VAR` placeholder resolved at run time.
    pub url: String,
    /// How many blocks to fetch per `eth_getLogs` range.
    pub batch_size: u64,
    /// Maximum number of in-flight range requests.
    pub concurrency: u64,
}

impl Source {
    /// Create a source with the default batch size (100) and concurrency (4).
    pub fn new(name: impl Into<String>, chain_id: u64, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain_id,
            url: url.into(),
            batch_size: 100,
            concurrency: 4,
        }
    }

    /// Set the number of blocks per range fetch.
    pub fn batch_size(mut self, size: u64) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the maximum number of in-flight range requests.
    pub fn concurrency(mut self, n: u64) -> Self {
        self.concurrency = n;
        self
    }

    /// Validate the per-source invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptySourceName);
        }
        if self.url.is_empty() {
            return Err(ConfigError::EmptyRpcUrl {
                source_name: self.name.clone(),
            });
        }
        if self.batch_size < 1 {
            return Err(ConfigError::InvalidBatchSize {
                source_name: self.name.clone(),
                value: self.batch_size,
            });
        }
        if self.concurrency < 1 {
            return Err(ConfigError::InvalidConcurrency {
                source_name: self.name.clone(),
                value: self.concurrency,
            });
        }
        Ok(())
    }
}

// ─── IngestConfig ─────────────────────────────────────────────────────────────

/// Top-level ingestion configuration.
///
/// Serializes to the `config.json` artifact: `pg_url`, `sources` (in declared
/// order), `integrations` (descriptors only — decode logic lives in code).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Postgres connection string, or a `$VAR` placeholder.
    pub pg_url: String,
    /// Chains to ingest, in polling-fairness order.
    pub sources: Vec<Source>,
    /// Declared integrations.
    pub integrations: Vec<IntegrationSpec>,
}

impl IngestConfig {
    /// Create an empty config for the given Postgres URL (or placeholder).
    pub fn new(pg_url: impl Into<String>) -> Self {
        Self {
            pg_url: pg_url.into(),
            sources: vec![],
            integrations: vec![],
        }
    }

    /// Append a source (declared order is preserved).
    pub fn source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    /// Append an integration descriptor.
    pub fn integration(mut self, spec: IntegrationSpec) -> Self {
        self.integrations.push(spec);
        self
    }

    /// Validate the whole config: per-source invariants, chain-id uniqueness,
    /// integration-name uniqueness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut registry = SourceRegistry::new();
        for source in &self.sources {
            source.validate()?;
            registry.register(source.clone())?;
        }
        let mut seen = std::collections::HashSet::new();
        for spec in &self.integrations {
            if !seen.insert(spec.name.as_str()) {
                return Err(ConfigError::DuplicateIntegration {
                    name: spec.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Serialize to the artifact JSON (2-space indent).
    ///
    /// Deterministic: identical configs yield byte-identical output.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse a config from artifact JSON. Does not validate; call
    /// [`IngestConfig::validate`] on the result.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate and write the artifact in one shot.
    ///
    /// Refuses to write an invalid config.
    pub fn write_artifact(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        self.validate()?;
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

// ─── Placeholder resolution ───────────────────────────────────────────────────

/// Resolve a `$VAR`-style placeholder from the process environment.
///
/// Plain values pass through unchanged; `$VAR` looks up `VAR` and fails with
/// [`ConfigError::UnsetVariable`] when it is absent or empty.
pub fn resolve_env(value: &str) -> Result<String, ConfigError> {
    match value.strip_prefix('$') {
        None => Ok(value.to_string()),
        Some(name) => match std::env::var(name) {
            Ok(v) if !v.is_empty() => Ok(v),
            _ => Err(ConfigError::UnsetVariable {
                name: name.to_string(),
            }),
        },
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn mainnet() -> Source {
        Source::new("mainnet", 1, "$MAINNET_RPC_URL")
    }

    fn base() -> Source {
        Source::new("base", 8453, "$BASE_RPC_URL")
    }

    #[test]
    fn source_defaults() {
        let s = mainnet();
        assert_eq!(s.batch_size, 100);
        assert_eq!(s.concurrency, 4);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn source_rejects_zero_batch_size() {
        let s = mainnet().batch_size(0);
        assert!(matches!(
            s.validate(),
            Err(ConfigError::InvalidBatchSize { value: 0, .. })
        ));
    }

    #[test]
    fn source_rejects_zero_concurrency() {
        let s = mainnet().concurrency(0);
        assert!(matches!(
            s.validate(),
            Err(ConfigError::InvalidConcurrency { value: 0, .. })
        ));
    }

    #[test]
    fn config_accepts_mainnet_and_base() {
        let cfg = IngestConfig::new("$DATABASE_URL")
            .source(base())
            .source(mainnet());
        assert!(cfg.validate().is_ok());
        // Declared order survives serialization.
        let json = cfg.to_json().unwrap();
        let parsed = IngestConfig::from_json(&json).unwrap();
        assert_eq!(parsed.sources[0].chain_id, 8453);
        assert_eq!(parsed.sources[1].chain_id, 1);
    }

    #[test]
    fn config_rejects_duplicate_chain_id() {
        let cfg = IngestConfig::new("$DATABASE_URL")
            .source(mainnet())
            .source(Source::new("mainnet-fallback", 1, "$FALLBACK_RPC_URL"));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateChainId { chain_id: 1 })
        ));
    }

    #[test]
    fn to_json_is_deterministic() {
        let make = || {
            IngestConfig::new("$DATABASE_URL")
                .source(base())
                .source(mainnet())
        };
        let a = make().to_json().unwrap();
        let b = make().to_json().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_integrations_serialize_as_empty_array() {
        let cfg = IngestConfig::new("$DATABASE_URL").source(mainnet());
        let json = cfg.to_json().unwrap();
        assert!(json.contains("\"integrations\": []"));
    }

    #[test]
    fn placeholders_survive_serialization() {
        let cfg = IngestConfig::new("$DATABASE_URL").source(mainnet());
        let json = cfg.to_json().unwrap();
        assert!(json.contains("\"pg_url\": \"$DATABASE_URL\""));
        assert!(json.contains("\"url\": \"$MAINNET_RPC_URL\""));
    }

    #[test]
    fn resolve_env_passthrough_and_lookup() {
        assert_eq!(
            resolve_env("postgres://localhost/db").unwrap(),
            "postgres://localhost/db"
        );
        std::env::set_var("CHAININGEST_TEST_RPC", "http://localhost:8545");
        assert_eq!(
            resolve_env("$CHAININGEST_TEST_RPC").unwrap(),
            "http://localhost:8545"
        );
        assert!(matches!(
            resolve_env("$CHAININGEST_TEST_UNSET"),
            Err(ConfigError::UnsetVariable { .. })
        ));
    }
}
