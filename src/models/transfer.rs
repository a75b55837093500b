use serde::{Deserialize, Serialize};

use crate::models::Address;

/// A raw event log as returned by the node, before any decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u32,
}

/// An immutable transfer record. Uniqueness is enforced on
/// (transaction_hash, log_index) so a transaction carrying several
/// transfers stores each one exactly once.
///
/// The amount is decimal text, never fixed-width binary, so values above
/// any machine word survive storage unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub contract_address: Address,
    pub from_address: Address,
    pub to_address: Address,
    pub amount: String,
    pub block_number: u64,
    pub transaction_hash: String,
    pub log_index: u32,
    pub timestamp: u64,
    pub token_name: Option<String>,
    pub token_symbol: Option<String>,
    pub token_decimals: Option<u8>,
}

/// Running balance for one holder of one token. Clamped at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub contract_address: Address,
    pub holder_address: Address,
    pub balance: String,
    pub block_number: u64,
}
