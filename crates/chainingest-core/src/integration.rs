//! Integration descriptors, decoded rows, and the topic router.
//!
//! An integration is a named decode rule bound to an event signature: a pure
//! function from raw log to typed rows. The descriptor half ([`IntegrationSpec`])
//! is what the `config.json` artifact declares; the code half is the
//! [`Integration`] trait implemented per event type.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::types::RawLog;

// ─── Descriptor types ─────────────────────────────────────────────────────────

/// Postgres column type for a declared integration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Numeric,
    Bytea,
    Bigint,
    Integer,
    Boolean,
}

/// A single column of a declared integration table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// The logical table an integration's rows belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<Column>,
}

/// The on-chain event an integration decodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Event name, e.g. `"Transfer"`.
    pub name: String,
    /// Canonical ABI signature, e.g. `"Transfer(address,address,uint256)"`.
    pub signature: String,
    /// keccak256 of the signature — the topics[0] routing key.
    pub topic0: String,
}

/// A named decode rule bound to one event signature, as declared in the
/// artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationSpec {
    pub name: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub event: EventSpec,
    pub table: TableSpec,
}

fn bool_true() -> bool {
    true
}

// ─── Row ──────────────────────────────────────────────────────────────────────

/// A decoded row produced by an integration, ready for the persistence sink.
///
/// `(chain_id, block_number, log_index)` is the idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    /// Name of the integration that produced this row.
    pub integration: String,
    /// Chain the log came from.
    pub chain_id: u64,
    /// Block number.
    pub block_number: u64,
    /// Log index within the block.
    pub log_index: u32,
    /// Transaction hash.
    pub tx_hash: String,
    /// Contract address that emitted the log.
    pub address: String,
    /// Decoded column values keyed by column name.
    pub values: serde_json::Value,
}

impl Row {
    /// The sink's idempotency key.
    pub fn key(&self) -> (u64, u64, u32) {
        (self.chain_id, self.block_number, self.log_index)
    }
}

// ─── Integration trait ────────────────────────────────────────────────────────

/// A stateless decode rule: raw log in, typed rows out. No IO.
pub trait Integration: Send + Sync {
    /// The artifact descriptor for this integration.
    fn spec(&self) -> IntegrationSpec;

    /// The topics[0] value this integration is bound to (`0x…`, 32 bytes).
    fn topic0(&self) -> &str;

    /// Decode a raw log into rows. Logs routed here always carry a matching
    /// topics[0]; malformed payloads are a [`IngestError::Decode`].
    fn decode(&self, chain_id: u64, log: &RawLog) -> Result<Vec<Row>, IngestError>;
}

// ─── IntegrationRouter ────────────────────────────────────────────────────────

/// Routes raw logs to integrations by their topics[0] value.
#[derive(Default)]
pub struct IntegrationRouter {
    routes: HashMap<String, Vec<Arc<dyn Integration>>>,
    /// Registration order, for deterministic artifact output.
    order: Vec<Arc<dyn Integration>>,
}

impl IntegrationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an integration under its topics[0] key.
    pub fn register(&mut self, integration: Arc<dyn Integration>) {
        self.routes
            .entry(integration.topic0().to_ascii_lowercase())
            .or_default()
            .push(integration.clone());
        self.order.push(integration);
    }

    /// Decode a log through every integration bound to its topics[0].
    ///
    /// Logs with no topics or no matching integration yield no rows.
    pub fn route(&self, chain_id: u64, log: &RawLog) -> Result<Vec<Row>, IngestError> {
        let Some(topic0) = log.topic0() else {
            return Ok(vec![]);
        };
        let Some(integrations) = self.routes.get(&topic0.to_ascii_lowercase()) else {
            return Ok(vec![]);
        };
        let mut rows = Vec::new();
        for integration in integrations {
            rows.extend(integration.decode(chain_id, log)?);
        }
        Ok(rows)
    }

    /// All distinct topics[0] values, sorted — the engine's `eth_getLogs` filter.
    pub fn topic0_values(&self) -> Vec<String> {
        let mut topics: Vec<_> = self.routes.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Descriptors of all registered integrations, in registration order.
    pub fn specs(&self) -> Vec<IntegrationSpec> {
        self.order.iter().map(|i| i.spec()).collect()
    }

    /// Number of registered integrations.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if no integrations are registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo {
        name: String,
        topic0: String,
    }

    impl Integration for Echo {
        fn spec(&self) -> IntegrationSpec {
            IntegrationSpec {
                name: self.name.clone(),
                enabled: true,
                event: EventSpec {
                    name: "Echo".into(),
                    signature: "Echo()".into(),
                    topic0: self.topic0.clone(),
                },
                table: TableSpec {
                    name: self.name.clone(),
                    columns: vec![Column::new("address", ColumnType::Text)],
                },
            }
        }

        fn topic0(&self) -> &str {
            &self.topic0
        }

        fn decode(&self, chain_id: u64, log: &RawLog) -> Result<Vec<Row>, IngestError> {
            Ok(vec![Row {
                integration: self.name.clone(),
                chain_id,
                block_number: log.block_number,
                log_index: log.log_index,
                tx_hash: log.tx_hash.clone(),
                address: log.address.clone(),
                values: json!({ "address": log.address }),
            }])
        }
    }

    fn log_with_topic0(topic0: &str) -> RawLog {
        RawLog {
            address: "0xc0ffee".into(),
            topics: vec![topic0.into()],
            data: vec![],
            block_number: 42,
            tx_hash: "0xdead".into(),
            log_index: 7,
            removed: false,
        }
    }

    #[test]
    fn route_dispatches_matching_topic() {
        let mut router = IntegrationRouter::new();
        router.register(Arc::new(Echo {
            name: "echo".into(),
            topic0: "0xAAAA".into(),
        }));

        let rows = router.route(1, &log_with_topic0("0xaaaa")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key(), (1, 42, 7));

        let none = router.route(1, &log_with_topic0("0xbbbb")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn route_fans_out_to_all_bound_integrations() {
        let mut router = IntegrationRouter::new();
        router.register(Arc::new(Echo {
            name: "first".into(),
            topic0: "0xaaaa".into(),
        }));
        router.register(Arc::new(Echo {
            name: "second".into(),
            topic0: "0xaaaa".into(),
        }));

        let rows = router.route(1, &log_with_topic0("0xaaaa")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].integration, "first");
        assert_eq!(rows[1].integration, "second");
    }

    #[test]
    fn route_ignores_logs_without_topics() {
        let mut router = IntegrationRouter::new();
        router.register(Arc::new(Echo {
            name: "echo".into(),
            topic0: "0xaaaa".into(),
        }));

        let mut log = log_with_topic0("0xaaaa");
        log.topics.clear();
        assert!(router.route(1, &log).unwrap().is_empty());
    }

    #[test]
    fn specs_preserve_registration_order() {
        let mut router = IntegrationRouter::new();
        router.register(Arc::new(Echo {
            name: "b".into(),
            topic0: "0xbbbb".into(),
        }));
        router.register(Arc::new(Echo {
            name: "a".into(),
            topic0: "0xaaaa".into(),
        }));

        let names: Vec<_> = router.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["b", "a"]);
        // Filter topics are sorted regardless of registration order.
        assert_eq!(router.topic0_values(), ["0xaaaa", "0xbbbb"]);
    }
}
