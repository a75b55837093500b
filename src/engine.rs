//! Orchestrates full scan passes: contract registration, a worker pool of
//! per-contract scanners, checkpointing and shutdown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;

use crate::blockchain::{ContractClassifier, LogScanner, RpcClient};
use crate::config::ScannerConfig;
use crate::database::Database;
use crate::error::{IndexerError, Result};
use crate::models::{Address, ContractRecord};
use crate::rate_limit::RateLimiter;
use crate::reconciler::{ApplyOutcome, Reconciler};

/// Counts from one scan pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanReport {
    pub contracts_scanned: u64,
    pub windows_scanned: u64,
    pub logs_seen: u64,
    pub applied: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub failures: u64,
}

impl ScanReport {
    fn merge(&mut self, other: &ScanReport) {
        self.contracts_scanned += other.contracts_scanned;
        self.windows_scanned += other.windows_scanned;
        self.logs_seen += other.logs_seen;
        self.applied += other.applied;
        self.duplicates += other.duplicates;
        self.skipped += other.skipped;
        self.failures += other.failures;
    }
}

/// Drives scan passes over every known token contract. Each pass snapshots
/// the chain head once; contracts are scanned by a pool of workers sharing
/// one rate limiter, and each contract's checkpoint advances independently.
pub struct ScanEngine {
    rpc: RpcClient,
    db: Arc<Database>,
    config: ScannerConfig,
    limiter: Arc<RateLimiter>,
    shutdown: Arc<AtomicBool>,
}

impl ScanEngine {
    pub fn new(
        rpc: RpcClient,
        db: Arc<Database>,
        config: ScannerConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_sec.ceil() as u32,
            config.rate_limit_per_sec,
        ));
        Self {
            rpc,
            db,
            config,
            limiter,
            shutdown,
        }
    }

    /// Classify an address and persist the result. Non-contracts surface
    /// as `NotAContract`.
    pub async fn register_contract(&self, address: &Address) -> Result<ContractRecord> {
        let classifier = ContractClassifier::new(self.rpc.clone());
        let record = classifier.classify(address).await?;
        self.db.upsert_contract(&record)?;
        Ok(record)
    }

    /// Discover a contract through its creation transaction: the receipt
    /// names the deployed address.
    pub async fn register_creation(&self, tx_hash: &str) -> Result<Option<ContractRecord>> {
        let receipt = match self.rpc.get_transaction_receipt(tx_hash).await? {
            Some(receipt) => receipt,
            None => return Ok(None),
        };
        let created = match receipt.contract_address.as_deref() {
            Some(raw) => Address::parse(raw).map_err(crate::error::DecodeError::Address)?,
            None => return Ok(None),
        };

        let classifier = ContractClassifier::new(self.rpc.clone());
        let record = classifier.classify_creation(&created, tx_hash).await?;
        self.db.upsert_contract(&record)?;
        Ok(Some(record))
    }

    /// One full scan pass over all token contracts.
    pub async fn run_once(&self) -> Result<ScanReport> {
        let head = LogScanner::new(self.rpc.clone()).snapshot_head().await?;
        let contracts = self.db.token_contracts()?;
        info!("scan pass: {} token contracts, head {}", contracts.len(), head);

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();

        for contract in contracts {
            let permit_source = Arc::clone(&semaphore);
            let worker = ContractWorker {
                rpc: self.rpc.clone(),
                db: Arc::clone(&self.db),
                config: self.config.clone(),
                limiter: Arc::clone(&self.limiter),
                shutdown: Arc::clone(&self.shutdown),
            };
            tasks.spawn(async move {
                let _permit = permit_source.acquire().await;
                worker.scan_contract(contract, head).await
            });
        }

        let mut report = ScanReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(contract_report) => report.merge(&contract_report),
                Err(e) => {
                    error!("scan worker panicked: {}", e);
                    report.failures += 1;
                }
            }
        }

        info!(
            "scan pass done: {} contracts, {} windows, {} logs ({} applied, {} duplicate, {} skipped, {} failed)",
            report.contracts_scanned,
            report.windows_scanned,
            report.logs_seen,
            report.applied,
            report.duplicates,
            report.skipped,
            report.failures
        );
        Ok(report)
    }

    /// Scan passes separated by the poll interval, until shutdown.
    pub async fn run(&self) -> Result<()> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested, stopping scan loop");
                return Ok(());
            }

            match self.run_once().await {
                Ok(_) => {}
                Err(e) => warn!("scan pass failed: {}", e),
            }

            let mut waited = 0;
            while waited < self.config.poll_interval_seconds {
                if self.shutdown.load(Ordering::SeqCst) {
                    info!("shutdown requested, stopping scan loop");
                    return Ok(());
                }
                sleep(Duration::from_secs(1)).await;
                waited += 1;
            }
        }
    }
}

/// First block a contract scan should cover: one past the checkpoint when
/// one exists, otherwise the creation block, otherwise the configured
/// genesis default.
fn resume_start(checkpoint: Option<u64>, creation_block: Option<u64>, genesis: u64) -> u64 {
    match checkpoint {
        Some(block) => block.saturating_add(1),
        None => creation_block.unwrap_or(genesis),
    }
}

struct ContractWorker {
    rpc: RpcClient,
    db: Arc<Database>,
    config: ScannerConfig,
    limiter: Arc<RateLimiter>,
    shutdown: Arc<AtomicBool>,
}

impl ContractWorker {
    async fn scan_contract(&self, contract: ContractRecord, head: u64) -> ScanReport {
        let mut report = ScanReport {
            contracts_scanned: 1,
            ..ScanReport::default()
        };

        let checkpoint = match self.db.checkpoint(&contract.address) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!("checkpoint read failed for {}: {}", contract.address.to_hex(), e);
                report.failures += 1;
                return report;
            }
        };

        let start = resume_start(checkpoint, contract.creation_block, self.config.genesis_block);
        if start > head {
            return report;
        }

        let scanner = LogScanner::new(self.rpc.clone());
        let reconciler = Reconciler::new(Arc::clone(&self.db));
        let mut timestamps: HashMap<u64, u64> = HashMap::new();

        for window in crate::blockchain::windows(start, head, self.config.window_size) {
            if self.shutdown.load(Ordering::SeqCst) {
                info!(
                    "shutdown mid-scan for {}, resume point {}",
                    contract.address.to_hex(),
                    window.from.saturating_sub(1)
                );
                return report;
            }

            self.limiter.acquire().await;
            let logs = match scanner.fetch_window(&contract.address, window).await {
                Ok(logs) => logs,
                Err(e) => {
                    // The checkpoint stays where it was; the next pass
                    // retries this window.
                    warn!(
                        "window {}..{} failed for {}: {}",
                        window.from,
                        window.to,
                        contract.address.to_hex(),
                        e
                    );
                    report.failures += 1;
                    return report;
                }
            };
            report.windows_scanned += 1;
            report.logs_seen += logs.len() as u64;

            for log in &logs {
                let timestamp = self.block_timestamp(&mut timestamps, log.block_number).await;
                match reconciler.apply_transfer(&contract, log, timestamp) {
                    Ok(ApplyOutcome::Applied) => report.applied += 1,
                    Ok(ApplyOutcome::Duplicate) => report.duplicates += 1,
                    Ok(ApplyOutcome::Skipped) => report.skipped += 1,
                    Err(IndexerError::Decode(e)) => {
                        warn!(
                            "undecodable log {}:{}: {}",
                            log.transaction_hash, log.log_index, e
                        );
                        report.failures += 1;
                    }
                    Err(e) => {
                        warn!(
                            "failed to apply log {}:{}: {}",
                            log.transaction_hash, log.log_index, e
                        );
                        report.failures += 1;
                    }
                }
            }

            // The window is fully processed; it will not be refetched.
            if let Err(e) = self.db.advance_checkpoint(&contract.address, window.to) {
                warn!(
                    "checkpoint advance failed for {}: {}",
                    contract.address.to_hex(),
                    e
                );
                report.failures += 1;
                return report;
            }

            if self.config.window_delay_ms > 0 {
                sleep(Duration::from_millis(self.config.window_delay_ms)).await;
            }
        }

        report
    }

    /// Block timestamps repeat heavily within a window, so they are cached
    /// per contract scan. An unresolvable timestamp records as zero rather
    /// than dropping the transfer.
    async fn block_timestamp(&self, cache: &mut HashMap<u64, u64>, block: u64) -> u64 {
        if let Some(&timestamp) = cache.get(&block) {
            return timestamp;
        }

        let timestamp = match self.rpc.get_block_timestamp(block).await {
            Ok(Some(timestamp)) => timestamp,
            Ok(None) => 0,
            Err(e) => {
                warn!("timestamp lookup failed for block {}: {}", block, e);
                0
            }
        };
        cache.insert(block, timestamp);
        timestamp
    }
}
