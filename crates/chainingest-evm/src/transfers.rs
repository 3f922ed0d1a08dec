//! The `transfers` integration — decodes ERC-20 `Transfer` logs into rows.
//!
//! Decode is pure: token symbol/decimals cannot be read from the log itself,
//! so they come from an optional static metadata map supplied at construction
//! and are `null` for unknown tokens.

use std::collections::HashMap;

use alloy_primitives::U256;
use serde_json::json;

use chainingest_core::error::IngestError;
use chainingest_core::integration::{
    Column, ColumnType, EventSpec, Integration, IntegrationSpec, Row, TableSpec,
};
use chainingest_core::types::RawLog;

use crate::sig::event_topic0;

/// Canonical ABI signature of the ERC-20 `Transfer` event.
pub const TRANSFER_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// Static per-token metadata for the `token_symbol` / `token_decimal` columns.
#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u8,
}

/// ERC-20 transfer decoder bound to the `Transfer(address,address,uint256)`
/// signature.
pub struct TransfersIntegration {
    topic0: String,
    /// Lowercased contract address → metadata.
    tokens: HashMap<String, TokenMetadata>,
}

impl TransfersIntegration {
    pub fn new() -> Self {
        Self {
            topic0: event_topic0(TRANSFER_SIGNATURE),
            tokens: HashMap::new(),
        }
    }

    /// Attach a static token-metadata table. Keys are contract addresses,
    /// matched case-insensitively.
    pub fn with_token_metadata(
        tokens: impl IntoIterator<Item = (String, TokenMetadata)>,
    ) -> Self {
        Self {
            topic0: event_topic0(TRANSFER_SIGNATURE),
            tokens: tokens
                .into_iter()
                .map(|(addr, meta)| (addr.to_ascii_lowercase(), meta))
                .collect(),
        }
    }

    fn metadata(&self, address: &str) -> Option<&TokenMetadata> {
        self.tokens.get(&address.to_ascii_lowercase())
    }
}

impl Default for TransfersIntegration {
    fn default() -> Self {
        Self::new()
    }
}

impl Integration for TransfersIntegration {
    fn spec(&self) -> IntegrationSpec {
        IntegrationSpec {
            name: "transfers".into(),
            enabled: true,
            event: EventSpec {
                name: "Transfer".into(),
                signature: TRANSFER_SIGNATURE.into(),
                topic0: self.topic0.clone(),
            },
            table: TableSpec {
                name: "transfers".into(),
                columns: vec![
                    Column::new("contract_address", ColumnType::Text),
                    Column::new("from", ColumnType::Text),
                    Column::new("to", ColumnType::Text),
                    Column::new("value", ColumnType::Numeric),
                    Column::new("token_decimal", ColumnType::Integer),
                    Column::new("token_symbol", ColumnType::Text),
                ],
            },
        }
    }

    fn topic0(&self) -> &str {
        &self.topic0
    }

    fn decode(&self, chain_id: u64, log: &RawLog) -> Result<Vec<Row>, IngestError> {
        // ERC-721 Transfer shares this signature but indexes tokenId as a
        // third topic; only the ERC-20 layout (3 topics, 32-byte data) is ours.
        if log.topics.len() != 3 {
            return Ok(vec![]);
        }
        if log.data.len() < 32 {
            return Err(decode_err(format!(
                "transfer data is {} bytes, expected 32",
                log.data.len()
            )));
        }

        let from = topic_address(&log.topics[1])?;
        let to = topic_address(&log.topics[2])?;
        let value = U256::from_be_slice(&log.data[..32]).to_string();

        let (symbol, decimals) = match self.metadata(&log.address) {
            Some(meta) => (json!(meta.symbol), json!(meta.decimals)),
            None => (json!(null), json!(null)),
        };

        Ok(vec![Row {
            integration: "transfers".into(),
            chain_id,
            block_number: log.block_number,
            log_index: log.log_index,
            tx_hash: log.tx_hash.clone(),
            address: log.address.clone(),
            values: json!({
                "contract_address": log.address,
                "from": from,
                "to": to,
                "value": value,
                "token_decimal": decimals,
                "token_symbol": symbol,
            }),
        }])
    }
}

/// Extract an address from a 32-byte indexed topic (the last 20 bytes).
fn topic_address(topic: &str) -> Result<String, IngestError> {
    let hex_str = topic.strip_prefix("0x").unwrap_or(topic);
    let bytes = hex::decode(hex_str).map_err(|e| decode_err(format!("bad topic hex: {e}")))?;
    if bytes.len() != 32 {
        return Err(decode_err(format!(
            "topic is {} bytes, expected 32",
            bytes.len()
        )));
    }
    Ok(format!("0x{}", hex::encode(&bytes[12..])))
}

fn decode_err(reason: String) -> IngestError {
    IngestError::Decode {
        integration: "transfers".into(),
        reason,
    }
}
