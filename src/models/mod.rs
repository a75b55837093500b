pub mod address;
pub mod contract;
pub mod transfer;

pub use address::{normalize, Address, AddressError, ZERO_ADDRESS};
pub use contract::{ContractRecord, TokenMetadata};
pub use transfer::{BalanceRecord, RawLog, TransferRecord};
