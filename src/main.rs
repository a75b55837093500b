use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};

use token_ledger_indexer::models::Address;
use token_ledger_indexer::retry::RetryConfig;
use token_ledger_indexer::{AppConfig, Database, IndexerError, RpcClient, ScanEngine};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    info!("Starting token ledger indexer");
    info!("endpoint: {}", config.rpc.endpoint);
    info!("database: {}", config.database.path);

    let rpc = RpcClient::with_config(
        config.rpc.endpoint.clone(),
        config.rpc.timeout_seconds,
        RetryConfig {
            max_attempts: config.rpc.max_retries,
            initial_delay_ms: config.rpc.retry_delay_ms,
            max_delay_ms: config.rpc.max_retry_delay_ms,
            ..RetryConfig::default()
        },
    );
    let db = Arc::new(Database::new(&config.database.path)?);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });
    }

    let engine = ScanEngine::new(rpc, db, config.scanner.clone(), shutdown);

    // Seed the contract set from the environment; anything already in the
    // database is scanned regardless.
    if let Ok(list) = std::env::var("TRACK_CONTRACTS") {
        for raw in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match Address::parse(raw) {
                Ok(address) => match engine.register_contract(&address).await {
                    Ok(record) if record.is_token => {
                        info!("tracking token {}", address.to_hex());
                    }
                    Ok(_) => warn!("{} has code but no token interface", address.to_hex()),
                    Err(IndexerError::NotAContract(addr)) => {
                        warn!("{} is not a contract, skipping", addr);
                    }
                    Err(e) => warn!("failed to register {}: {}", address.to_hex(), e),
                },
                Err(e) => warn!("bad address in TRACK_CONTRACTS '{}': {}", raw, e),
            }
        }
    }

    engine.run().await?;
    info!("indexer stopped");
    Ok(())
}
