use serde::{Deserialize, Serialize};

use crate::models::Address;

/// A contract observed on chain. Created when a contract-creation
/// transaction is seen; token metadata is refined as later classification
/// succeeds. Records are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub address: Address,
    pub creator_address: Option<Address>,
    pub bytecode: String,
    pub is_token: bool,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub total_supply: Option<String>,
    pub creation_block: Option<u64>,
    pub creation_tx: Option<String>,
}

impl ContractRecord {
    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
        }
    }
}

/// Token metadata snapshot carried on each transfer record, so history
/// stays readable even if the contract row changes later.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}
