//! Shared types for the ingestion pipeline.

use serde::{Deserialize, Serialize};

// ─── RawLog ───────────────────────────────────────────────────────────────────

/// A raw, undecoded log — the input to every integration.
///
/// Chain-specific fetchers (e.g. the EVM JSON-RPC fetcher) convert their wire
/// representation into this type before routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    /// Contract address that emitted the log (`0x…`).
    pub address: String,
    /// EVM: topics[0] is the event signature hash; further topics are indexed params.
    pub topics: Vec<String>,
    /// ABI-encoded non-indexed parameters.
    pub data: Vec<u8>,
    /// Block number the log was included in.
    pub block_number: u64,
    /// Transaction hash.
    pub tx_hash: String,
    /// Log index within the block.
    pub log_index: u32,
    /// Set by the node when the log was dropped in a chain reorganization.
    pub removed: bool,
}

impl RawLog {
    /// Returns topics[0] (the event signature hash), if present.
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(|s| s.as_str())
    }
}

// ─── LogFilter ────────────────────────────────────────────────────────────────

/// Filter for which logs to fetch and route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFilter {
    /// Only fetch logs from these contract addresses (empty = all addresses).
    pub addresses: Vec<String>,
    /// Only fetch logs with this topic[0] value (empty = all events).
    pub topic0_values: Vec<String>,
}

impl LogFilter {
    /// Create a filter for a single contract address.
    pub fn address(addr: impl Into<String>) -> Self {
        Self {
            addresses: vec![addr.into()],
            ..Default::default()
        }
    }

    /// Add a topic0 filter (event signature hash).
    pub fn topic0(mut self, topic: impl Into<String>) -> Self {
        self.topic0_values.push(topic.into());
        self
    }

    /// Returns `true` if `address` matches this filter.
    pub fn matches_address(&self, address: &str) -> bool {
        self.addresses.is_empty()
            || self.addresses.iter().any(|a| a.eq_ignore_ascii_case(address))
    }

    /// Returns `true` if `topic0` matches this filter.
    pub fn matches_topic0(&self, topic0: &str) -> bool {
        self.topic0_values.is_empty()
            || self.topic0_values.iter().any(|t| t.eq_ignore_ascii_case(topic0))
    }
}

// ─── IngestPhase ──────────────────────────────────────────────────────────────

/// The current phase of a per-source ingest loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestPhase {
    /// Catching up to the chain head (processing historical blocks).
    Backfill,
    /// Following the chain tip by polling.
    Live,
}

impl std::fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backfill => write!(f, "backfill"),
            Self::Live => write!(f, "live"),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_log_topic0() {
        let log = RawLog {
            address: "0x0".into(),
            topics: vec!["0xddf2".into(), "0xaaaa".into()],
            data: vec![],
            block_number: 1,
            tx_hash: "0x0".into(),
            log_index: 0,
            removed: false,
        };
        assert_eq!(log.topic0(), Some("0xddf2"));
    }

    #[test]
    fn raw_log_topic0_empty() {
        let log = RawLog {
            address: "0x0".into(),
            topics: vec![],
            data: vec![],
            block_number: 1,
            tx_hash: "0x0".into(),
            log_index: 0,
            removed: false,
        };
        assert_eq!(log.topic0(), None);
    }

    #[test]
    fn log_filter_matches_address() {
        let f = LogFilter::address("0xAbCdEf");
        assert!(f.matches_address("0xabcdef")); // case-insensitive
        assert!(!f.matches_address("0x111111"));
    }

    #[test]
    fn log_filter_empty_matches_all() {
        let f = LogFilter::default();
        assert!(f.matches_address("0xanything"));
        assert!(f.matches_topic0("0xanything"));
    }
}
