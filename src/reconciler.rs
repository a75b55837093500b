//! Turns raw transfer logs into ledger rows and recomputed balances.
//!
//! Application is idempotent end to end: the ledger deduplicates on
//! (transaction_hash, log_index), and balances are always derived from the
//! ledger, so replaying a window leaves the database unchanged.

use std::sync::Arc;

use log::{debug, warn};

use crate::abi::{decode_uint, TRANSFER_EVENT_SIGNATURE};
use crate::database::Database;
use crate::error::{DecodeError, Result};
use crate::models::{Address, ContractRecord, RawLog, TransferRecord};

/// What applying one log did to the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// New ledger row; balances of the affected holders recomputed.
    Applied,
    /// The ledger already held this (transaction_hash, log_index). Balances
    /// are still recomputed so an earlier partial application converges.
    Duplicate,
    /// A recognized-but-nonstandard log shape, skipped without error.
    Skipped,
}

pub struct Reconciler {
    db: Arc<Database>,
}

impl Reconciler {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Apply one raw log for `contract` to the ledger.
    ///
    /// Logs without exactly three topics carry unindexed participants or a
    /// nonstandard event shape and are skipped silently; a malformed topic
    /// or amount is a decode error the caller counts and moves past.
    pub fn apply_transfer(
        &self,
        contract: &ContractRecord,
        log: &RawLog,
        timestamp: u64,
    ) -> Result<ApplyOutcome> {
        let signature = log.topics.first().map(String::as_str).unwrap_or("");
        if !signature.eq_ignore_ascii_case(TRANSFER_EVENT_SIGNATURE) {
            return Err(DecodeError::EventSignature(signature.to_string()).into());
        }

        if log.topics.len() != 3 {
            debug!(
                "skipping {}-topic transfer log {}:{}",
                log.topics.len(),
                log.transaction_hash,
                log.log_index
            );
            return Ok(ApplyOutcome::Skipped);
        }

        let from = Address::from_topic(&log.topics[1]).map_err(DecodeError::Address)?;
        let to = Address::from_topic(&log.topics[2]).map_err(DecodeError::Address)?;
        let amount =
            decode_uint(&log.data).ok_or_else(|| DecodeError::Amount(log.data.clone()))?;

        let metadata = contract.metadata();
        let record = TransferRecord {
            contract_address: contract.address.clone(),
            from_address: from.clone(),
            to_address: to.clone(),
            amount: amount.to_string(),
            block_number: log.block_number,
            transaction_hash: log.transaction_hash.clone(),
            log_index: log.log_index,
            timestamp,
            token_name: metadata.name,
            token_symbol: metadata.symbol,
            token_decimals: metadata.decimals,
        };

        let inserted = self.db.insert_transfer(&record)?;
        if !inserted {
            debug!(
                "duplicate transfer {}:{}, recomputing balances anyway",
                record.transaction_hash, record.log_index
            );
        }

        // The zero address is the mint/burn sentinel and carries no balance.
        // The real side of a mint or burn is still recomputed.
        for holder in [&from, &to] {
            if holder.is_zero() {
                continue;
            }
            if let Err(e) =
                self.db
                    .recompute_balance(&contract.address, holder, log.block_number)
            {
                warn!(
                    "balance recompute failed for {} on {}: {}",
                    holder.to_hex(),
                    contract.address.to_hex(),
                    e
                );
                return Err(e.into());
            }
        }

        Ok(if inserted {
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Duplicate
        })
    }
}
