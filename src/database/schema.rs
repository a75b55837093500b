use rusqlite::{Connection, Result};

/// Initialize the database schema with required tables
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Contracts observed on chain. Token metadata columns stay NULL until
    // classification fills them in.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS contracts (
            address TEXT PRIMARY KEY,
            creator_address TEXT,
            bytecode TEXT NOT NULL DEFAULT '',
            is_token INTEGER NOT NULL DEFAULT 0,
            name TEXT,
            symbol TEXT,
            decimals INTEGER,
            total_supply TEXT,
            creation_block INTEGER,
            creation_tx TEXT,
            created_at INTEGER DEFAULT (strftime('%s', 'now')),
            updated_at INTEGER DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    // Immutable transfer ledger. The UNIQUE constraint is the dedup
    // mechanism: re-inserting an already-stored transfer is a no-op.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transfers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            contract_address TEXT NOT NULL,
            from_address TEXT NOT NULL,
            to_address TEXT NOT NULL,
            amount TEXT NOT NULL,
            block_number INTEGER NOT NULL,
            transaction_hash TEXT NOT NULL,
            log_index INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            token_name TEXT,
            token_symbol TEXT,
            token_decimals INTEGER,
            created_at INTEGER DEFAULT (strftime('%s', 'now')),
            UNIQUE(transaction_hash, log_index)
        )",
        [],
    )?;

    // Running balances, always recomputed from the ledger rather than
    // adjusted in place.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS balances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            contract_address TEXT NOT NULL,
            holder_address TEXT NOT NULL,
            balance TEXT NOT NULL DEFAULT '0',
            block_number INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER DEFAULT (strftime('%s', 'now')),
            UNIQUE(contract_address, holder_address)
        )",
        [],
    )?;

    // Per-contract scan checkpoints, monotonically advancing.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS checkpoints (
            contract_address TEXT PRIMARY KEY,
            last_scanned_block INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_contract ON transfers(contract_address)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_block ON transfers(block_number)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers(from_address)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transfers_to ON transfers(to_address)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_balances_holder ON balances(holder_address)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_contracts_token ON contracts(is_token)",
        [],
    )?;

    Ok(())
}

/// Run database migrations (for future schema updates)
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Check current schema version and apply migrations as needed
    initialize_schema(conn)
}
