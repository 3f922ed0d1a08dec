//! EVM log fetching — the `eth_getLogs` wire format and the RPC client seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use chainingest_core::error::IngestError;
use chainingest_core::types::{LogFilter, RawLog};

/// A raw EVM log as returned by `eth_getLogs` (hex-string fields, camelCase).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "transactionHash")]
    pub tx_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(rename = "removed")]
    pub removed: Option<bool>,
}

impl EthLog {
    /// Convert the wire representation into the chain-agnostic [`RawLog`].
    pub fn into_raw(self) -> Result<RawLog, IngestError> {
        let data_hex = self.data.strip_prefix("0x").unwrap_or(&self.data);
        let data = hex::decode(data_hex)
            .map_err(|e| IngestError::Rpc(format!("malformed log data '{}': {e}", self.data)))?;
        Ok(RawLog {
            address: self.address,
            topics: self.topics,
            data,
            block_number: parse_hex_u64(&self.block_number),
            tx_hash: self.tx_hash,
            log_index: parse_hex_u64(&self.log_index) as u32,
            removed: self.removed.unwrap_or(false),
        })
    }
}

/// Trait for fetching EVM data from a JSON-RPC provider.
///
/// The engine and poller only speak this trait; tests use mock
/// implementations, production uses [`crate::http::HttpRpcClient`].
#[async_trait]
pub trait EvmRpcClient: Send + Sync {
    /// Current chain head block number (`eth_blockNumber`).
    async fn get_block_number(&self) -> Result<u64, IngestError>;

    /// All logs in `[from, to]` matching the filter (`eth_getLogs`).
    async fn get_logs(
        &self,
        from: u64,
        to: u64,
        filter: &LogFilter,
    ) -> Result<Vec<RawLog>, IngestError>;
}

/// Parse a hex-encoded string (with or without `0x`) to u64.
pub fn parse_hex_u64(s: &str) -> u64 {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(s, 16).unwrap_or(0)
}

/// Format a block number as the `0x…` quantity JSON-RPC expects.
pub fn to_hex_u64(n: u64) -> String {
    format!("{n:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_u64_basic() {
        assert_eq!(parse_hex_u64("0x1"), 1);
        assert_eq!(parse_hex_u64("0xff"), 255);
        assert_eq!(parse_hex_u64("1234"), 0x1234);
    }

    #[test]
    fn to_hex_roundtrip() {
        assert_eq!(to_hex_u64(100), "0x64");
        assert_eq!(parse_hex_u64(&to_hex_u64(19_000_000)), 19_000_000);
    }

    #[test]
    fn eth_log_into_raw() {
        let log = EthLog {
            address: "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".into(),
            topics: vec!["0xddf2".into()],
            data: "0x00ff".into(),
            block_number: "0x12a05f200".into(), // 5_000_000_000
            tx_hash: "0xabc".into(),
            log_index: "0x5".into(),
            removed: None,
        };
        let raw = log.into_raw().unwrap();
        assert_eq!(raw.block_number, 5_000_000_000);
        assert_eq!(raw.log_index, 5);
        assert_eq!(raw.data, vec![0x00, 0xff]);
        assert!(!raw.removed);
    }

    #[test]
    fn eth_log_rejects_bad_data_hex() {
        let log = EthLog {
            address: "0x0".into(),
            topics: vec![],
            data: "0xzz".into(),
            block_number: "0x1".into(),
            tx_hash: "0x0".into(),
            log_index: "0x0".into(),
            removed: None,
        };
        assert!(log.into_raw().is_err());
    }

    #[test]
    fn eth_log_wire_shape() {
        // Field names must match the JSON-RPC response exactly.
        let json = r#"{
            "address": "0x0",
            "topics": [],
            "data": "0x",
            "blockNumber": "0x10",
            "transactionHash": "0xaa",
            "logIndex": "0x0",
            "removed": true
        }"#;
        let log: EthLog = serde_json::from_str(json).unwrap();
        let raw = log.into_raw().unwrap();
        assert_eq!(raw.block_number, 16);
        assert!(raw.removed);
    }
}
