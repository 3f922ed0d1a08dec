//! Event signature hashing.
//!
//! The topics[0] value of an EVM log is the keccak256 hash of the event's
//! canonical ABI signature, e.g.:
//!   keccak256("Transfer(address,address,uint256)")
//!   → 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef

use tiny_keccak::{Hasher, Keccak};

/// Compute the topics[0] routing key for a canonical event signature string.
/// Input: `"EventName(type1,type2,...)"` — no spaces, no parameter names.
pub fn event_topic0(signature: &str) -> String {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    format!("0x{}", hex::encode(output))
}
