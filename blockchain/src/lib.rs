//! Bộ truy vấn dữ liệu EVM đa nguồn: RPC node và indexer kiểu etherscan sau một giao diện chung.

pub mod abi;
pub mod call_order;
pub mod client;
pub mod config;
pub mod connection;
pub mod constants;
pub mod contract_info;
pub mod error;
pub mod etherscan;
pub mod hooks;
pub mod inquirer;
pub mod logs;
pub mod multicall;
pub mod query;
pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export các kiểu chính
pub use abi::{AbiRegistry, EvmContract};
pub use call_order::CallOrderPolicy;
pub use client::{EthersNodeClient, HttpNodeConnector, NodeClient, NodeConnector};
pub use config::InquirerSettings;
pub use connection::{ConnectOutcome, ConnectionManager, LiveConnection};
pub use error::{InquirerError, InquirerResult};
pub use etherscan::{Etherscan, IndexerClient};
pub use hooks::{ChainHooks, IndexerChainHooks};
pub use inquirer::{EvmNodeInquirer, InquirerDeps};
pub use multicall::ContractCall;
pub use registry::{NodeRegistry, StaticNodeRegistry};
pub use types::*;
