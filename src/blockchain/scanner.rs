use log::debug;

use crate::abi::TRANSFER_EVENT_SIGNATURE;
use crate::blockchain::rpc_client::{LogFilter, RpcClient};
use crate::error::Result;
use crate::models::{Address, RawLog};

/// One inclusive block window of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from: u64,
    pub to: u64,
}

/// Split the inclusive range `[from, to]` into fixed-size windows. Each
/// window ends at `min(current + size, to)` and the next begins one past
/// that end, so windows never overlap and the final window lands exactly
/// on `to`.
pub fn windows(from: u64, to: u64, size: u64) -> Vec<Window> {
    let mut out = Vec::new();
    if from > to || size == 0 {
        return out;
    }

    let mut current = from;
    while current <= to {
        let end = current.saturating_add(size).min(to);
        out.push(Window { from: current, to: end });
        if end == u64::MAX {
            break;
        }
        current = end + 1;
    }
    out
}

/// Fetches transfer logs for one contract, window by window.
pub struct LogScanner {
    rpc: RpcClient,
}

impl LogScanner {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    /// The chain head at the moment of the call. A scan snapshots this once
    /// and treats it as its upper bound, so blocks mined mid-scan wait for
    /// the next pass.
    pub async fn snapshot_head(&self) -> Result<u64> {
        self.rpc.latest_block_number().await
    }

    /// Transfer-event logs for `contract` within `window`, filtered
    /// server-side by the Transfer topic.
    pub async fn fetch_window(&self, contract: &Address, window: Window) -> Result<Vec<RawLog>> {
        let filter = LogFilter {
            from_block: format!("0x{:x}", window.from),
            to_block: format!("0x{:x}", window.to),
            address: Some(contract.to_hex()),
            topics: Some(vec![Some(TRANSFER_EVENT_SIGNATURE.to_string())]),
        };

        let logs = self.rpc.get_logs(filter).await?;
        debug!(
            "window {}..{} for {}: {} logs",
            window.from,
            window.to,
            contract.to_hex(),
            logs.len()
        );
        Ok(logs)
    }
}
