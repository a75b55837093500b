pub mod classifier;
pub mod rpc_client;
pub mod scanner;

pub use classifier::ContractClassifier;
pub use rpc_client::{LogFilter, RpcClient, TransactionReceipt};
pub use scanner::{windows, LogScanner, Window};
