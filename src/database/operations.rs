use std::sync::{Arc, Mutex, MutexGuard};

use num_bigint::BigUint;
use num_traits::Zero;
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::schema::{initialize_schema, run_migrations};
use crate::error::DbError;
use crate::models::{Address, BalanceRecord, ContractRecord, TransferRecord};

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create a new database connection and initialize schema
    pub fn new(db_path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(db_path)?;
        initialize_schema(&conn)?;
        run_migrations(&conn)?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database for testing
    pub fn new_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        run_migrations(&conn)?;

        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn
            .lock()
            .map_err(|_| DbError::Operation("Failed to acquire lock".to_string()))
    }

    /// Insert or refine a contract record. Known metadata is never
    /// overwritten with NULL, and a contract once marked a token stays one.
    pub fn upsert_contract(&self, record: &ContractRecord) -> Result<(), DbError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO contracts
                (address, creator_address, bytecode, is_token, name, symbol, decimals,
                 total_supply, creation_block, creation_tx)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(address) DO UPDATE SET
                creator_address = COALESCE(excluded.creator_address, contracts.creator_address),
                bytecode = CASE WHEN excluded.bytecode != '' THEN excluded.bytecode ELSE contracts.bytecode END,
                is_token = MAX(contracts.is_token, excluded.is_token),
                name = COALESCE(excluded.name, contracts.name),
                symbol = COALESCE(excluded.symbol, contracts.symbol),
                decimals = COALESCE(excluded.decimals, contracts.decimals),
                total_supply = COALESCE(excluded.total_supply, contracts.total_supply),
                creation_block = COALESCE(excluded.creation_block, contracts.creation_block),
                creation_tx = COALESCE(excluded.creation_tx, contracts.creation_tx),
                updated_at = strftime('%s', 'now')",
            params![
                record.address.as_str(),
                record.creator_address.as_ref().map(|a| a.as_str().to_string()),
                record.bytecode,
                record.is_token,
                record.name,
                record.symbol,
                record.decimals,
                record.total_supply,
                record.creation_block,
                record.creation_tx,
            ],
        )?;

        Ok(())
    }

    pub fn get_contract(&self, address: &Address) -> Result<Option<ContractRecord>, DbError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT address, creator_address, bytecode, is_token, name, symbol, decimals,
                    total_supply, creation_block, creation_tx
             FROM contracts WHERE address = ?1",
        )?;

        let record = stmt
            .query_row(params![address.as_str()], contract_from_row)
            .optional()?;
        Ok(record)
    }

    /// All contracts classified as tokens, in discovery order.
    pub fn token_contracts(&self) -> Result<Vec<ContractRecord>, DbError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT address, creator_address, bytecode, is_token, name, symbol, decimals,
                    total_supply, creation_block, creation_tx
             FROM contracts WHERE is_token = 1 ORDER BY created_at, address",
        )?;

        let rows = stmt.query_map([], contract_from_row)?;
        let mut contracts = Vec::new();
        for row in rows {
            contracts.push(row?);
        }
        Ok(contracts)
    }

    /// Store a transfer. Returns `true` when the row is new and `false`
    /// when the (transaction_hash, log_index) pair was already stored.
    pub fn insert_transfer(&self, transfer: &TransferRecord) -> Result<bool, DbError> {
        let conn = self.lock()?;

        let rows_affected = conn.execute(
            "INSERT OR IGNORE INTO transfers
                (contract_address, from_address, to_address, amount, block_number,
                 transaction_hash, log_index, timestamp, token_name, token_symbol, token_decimals)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                transfer.contract_address.as_str(),
                transfer.from_address.as_str(),
                transfer.to_address.as_str(),
                transfer.amount,
                transfer.block_number,
                transfer.transaction_hash,
                transfer.log_index,
                transfer.timestamp,
                transfer.token_name,
                transfer.token_symbol,
                transfer.token_decimals,
            ],
        )?;

        Ok(rows_affected > 0)
    }

    /// Recompute one holder's balance from the transfer ledger: total
    /// credited minus total debited, clamped at zero, all within one
    /// transaction. Replaying history converges on the same value because
    /// the ledger itself is deduplicated.
    pub fn recompute_balance(
        &self,
        contract: &Address,
        holder: &Address,
        block_number: u64,
    ) -> Result<BalanceRecord, DbError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let credited = sum_amounts(
            &tx,
            "SELECT amount FROM transfers WHERE contract_address = ?1 AND to_address = ?2",
            contract,
            holder,
        )?;
        let debited = sum_amounts(
            &tx,
            "SELECT amount FROM transfers WHERE contract_address = ?1 AND from_address = ?2",
            contract,
            holder,
        )?;

        let balance = if credited >= debited {
            credited - debited
        } else {
            BigUint::zero()
        };
        let balance_text = balance.to_string();

        tx.execute(
            "INSERT INTO balances (contract_address, holder_address, balance, block_number)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(contract_address, holder_address) DO UPDATE SET
                balance = excluded.balance,
                block_number = MAX(balances.block_number, excluded.block_number),
                updated_at = strftime('%s', 'now')",
            params![contract.as_str(), holder.as_str(), balance_text, block_number],
        )?;

        let record = tx.query_row(
            "SELECT contract_address, holder_address, balance, block_number
             FROM balances WHERE contract_address = ?1 AND holder_address = ?2",
            params![contract.as_str(), holder.as_str()],
            balance_from_row,
        )?;

        tx.commit()?;
        Ok(record)
    }

    pub fn get_balance(
        &self,
        contract: &Address,
        holder: &Address,
    ) -> Result<Option<BalanceRecord>, DbError> {
        let conn = self.lock()?;

        let record = conn
            .query_row(
                "SELECT contract_address, holder_address, balance, block_number
                 FROM balances WHERE contract_address = ?1 AND holder_address = ?2",
                params![contract.as_str(), holder.as_str()],
                balance_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Holder balances for one token, largest first. Zero balances are
    /// kept; a holder who transferred everything away still has history.
    pub fn balances_for_contract(&self, contract: &Address) -> Result<Vec<BalanceRecord>, DbError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT contract_address, holder_address, balance, block_number
             FROM balances WHERE contract_address = ?1
             ORDER BY LENGTH(balance) DESC, balance DESC",
        )?;

        let rows = stmt.query_map(params![contract.as_str()], balance_from_row)?;
        let mut balances = Vec::new();
        for row in rows {
            balances.push(row?);
        }
        Ok(balances)
    }

    /// Transfer history for one token in chain order: ascending block
    /// number, then ascending log index within a block.
    pub fn transfers_for_contract(
        &self,
        contract: &Address,
        limit: u32,
    ) -> Result<Vec<TransferRecord>, DbError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT contract_address, from_address, to_address, amount, block_number,
                    transaction_hash, log_index, timestamp, token_name, token_symbol, token_decimals
             FROM transfers WHERE contract_address = ?1
             ORDER BY block_number, log_index LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![contract.as_str(), limit], transfer_from_row)?;
        let mut transfers = Vec::new();
        for row in rows {
            transfers.push(row?);
        }
        Ok(transfers)
    }

    /// Transfers in or out of one holder address, in chain order.
    pub fn transfers_for_holder(
        &self,
        holder: &Address,
        limit: u32,
    ) -> Result<Vec<TransferRecord>, DbError> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT contract_address, from_address, to_address, amount, block_number,
                    transaction_hash, log_index, timestamp, token_name, token_symbol, token_decimals
             FROM transfers WHERE from_address = ?1 OR to_address = ?1
             ORDER BY block_number, log_index LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![holder.as_str(), limit], transfer_from_row)?;
        let mut transfers = Vec::new();
        for row in rows {
            transfers.push(row?);
        }
        Ok(transfers)
    }

    pub fn transfer_count(&self) -> Result<u64, DbError> {
        let conn = self.lock()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM transfers", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Last scanned block for a contract, or `None` before its first scan.
    pub fn checkpoint(&self, contract: &Address) -> Result<Option<u64>, DbError> {
        let conn = self.lock()?;

        let block = conn
            .query_row(
                "SELECT last_scanned_block FROM checkpoints WHERE contract_address = ?1",
                params![contract.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(block)
    }

    /// Advance a contract's checkpoint. Moves only forward: an update with
    /// a lower block number than the stored one is ignored.
    pub fn advance_checkpoint(&self, contract: &Address, block: u64) -> Result<(), DbError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO checkpoints (contract_address, last_scanned_block)
             VALUES (?1, ?2)
             ON CONFLICT(contract_address) DO UPDATE SET
                last_scanned_block = excluded.last_scanned_block,
                updated_at = strftime('%s', 'now')
             WHERE excluded.last_scanned_block > checkpoints.last_scanned_block",
            params![contract.as_str(), block],
        )?;

        Ok(())
    }
}

fn sum_amounts(
    tx: &rusqlite::Transaction<'_>,
    sql: &str,
    contract: &Address,
    holder: &Address,
) -> Result<BigUint, DbError> {
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt.query_map(params![contract.as_str(), holder.as_str()], |row| {
        row.get::<_, String>(0)
    })?;

    let mut total = BigUint::zero();
    for row in rows {
        let amount_text = row?;
        let amount = amount_text
            .parse::<BigUint>()
            .map_err(|_| DbError::Operation(format!("corrupt amount in ledger: {}", amount_text)))?;
        total += amount;
    }
    Ok(total)
}

fn contract_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContractRecord> {
    Ok(ContractRecord {
        address: Address::raw(row.get(0)?),
        creator_address: row.get::<_, Option<String>>(1)?.map(Address::raw),
        bytecode: row.get(2)?,
        is_token: row.get(3)?,
        name: row.get(4)?,
        symbol: row.get(5)?,
        decimals: row.get(6)?,
        total_supply: row.get(7)?,
        creation_block: row.get(8)?,
        creation_tx: row.get(9)?,
    })
}

fn transfer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransferRecord> {
    Ok(TransferRecord {
        contract_address: Address::raw(row.get(0)?),
        from_address: Address::raw(row.get(1)?),
        to_address: Address::raw(row.get(2)?),
        amount: row.get(3)?,
        block_number: row.get(4)?,
        transaction_hash: row.get(5)?,
        log_index: row.get(6)?,
        timestamp: row.get(7)?,
        token_name: row.get(8)?,
        token_symbol: row.get(9)?,
        token_decimals: row.get(10)?,
    })
}

fn balance_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BalanceRecord> {
    Ok(BalanceRecord {
        contract_address: Address::raw(row.get(0)?),
        holder_address: Address::raw(row.get(1)?),
        balance: row.get(2)?,
        block_number: row.get(3)?,
    })
}
