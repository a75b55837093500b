use log::{debug, info, warn};

use crate::abi::{
    decode_string, decode_uint, decode_uint8, SELECTOR_DECIMALS, SELECTOR_NAME, SELECTOR_SYMBOL,
    SELECTOR_TOTAL_SUPPLY,
};
use crate::blockchain::rpc_client::RpcClient;
use crate::error::{IndexerError, Result};
use crate::models::{Address, ContractRecord};

/// Probes a contract with the standard ERC20 read selectors and decides
/// whether it is a token. Each probe is isolated: one reverting method does
/// not fail the classification, it only leaves that field unset.
pub struct ContractClassifier {
    rpc: RpcClient,
}

impl ContractClassifier {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    /// Classify the contract at `address`. Fails with `NotAContract` when
    /// the node reports no deployed code there.
    pub async fn classify(&self, address: &Address) -> Result<ContractRecord> {
        let bytecode = self
            .rpc
            .get_code(address)
            .await?
            .ok_or_else(|| IndexerError::NotAContract(address.to_hex()))?;

        let name = self.probe_string(address, SELECTOR_NAME, "name").await;
        let symbol = self.probe_string(address, SELECTOR_SYMBOL, "symbol").await;
        let decimals = self.probe_decimals(address).await;

        // A contract answering any of the three metadata probes is treated
        // as a token. Partial implementations still produce usable history.
        let is_token = name.is_some() || symbol.is_some() || decimals.is_some();

        let total_supply = if is_token {
            self.probe_total_supply(address).await
        } else {
            None
        };

        if is_token {
            info!(
                "classified {} as token: name={:?} symbol={:?} decimals={:?}",
                address.to_hex(),
                name,
                symbol,
                decimals
            );
        } else {
            debug!("{} has code but no token interface", address.to_hex());
        }

        Ok(ContractRecord {
            address: address.clone(),
            creator_address: None,
            bytecode,
            is_token,
            name,
            symbol,
            decimals,
            total_supply,
            creation_block: None,
            creation_tx: None,
        })
    }

    /// Classify a contract discovered through its creation transaction:
    /// fills in creator, creation block and creation tx from the receipt.
    pub async fn classify_creation(
        &self,
        address: &Address,
        tx_hash: &str,
    ) -> Result<ContractRecord> {
        let mut record = self.classify(address).await?;
        record.creation_tx = Some(tx_hash.to_string());

        if let Some(receipt) = self.rpc.get_transaction_receipt(tx_hash).await? {
            if let Some(from) = receipt.from.as_deref() {
                match Address::parse(from) {
                    Ok(creator) => record.creator_address = Some(creator),
                    Err(e) => warn!("unparseable creator address in receipt {}: {}", tx_hash, e),
                }
            }
            if let Some(block_hex) = receipt.block_number.as_deref() {
                record.creation_block =
                    crate::blockchain::rpc_client::parse_hex_u64(block_hex).ok();
            }
        }

        Ok(record)
    }

    /// An `eth_call` that returns no data, or data that decodes to an empty
    /// string, leaves the field unset.
    async fn probe_string(
        &self,
        address: &Address,
        selector: &str,
        field: &str,
    ) -> Option<String> {
        let raw = match self.rpc.eth_call(address, selector).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!("{} probe failed for {}: {}", field, address.to_hex(), e);
                return None;
            }
        };

        decode_string(&raw)
            .map(|decoded| decoded.value)
            .filter(|value| !value.is_empty())
    }

    /// Decimals outside u8 range are rejected, not truncated.
    async fn probe_decimals(&self, address: &Address) -> Option<u8> {
        let raw = match self.rpc.eth_call(address, SELECTOR_DECIMALS).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!("decimals probe failed for {}: {}", address.to_hex(), e);
                return None;
            }
        };
        decode_uint8(&raw)
    }

    async fn probe_total_supply(&self, address: &Address) -> Option<String> {
        let raw = match self.rpc.eth_call(address, SELECTOR_TOTAL_SUPPLY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                debug!("totalSupply probe failed for {}: {}", address.to_hex(), e);
                return None;
            }
        };
        decode_uint(&raw).map(|v| v.to_string())
    }
}
