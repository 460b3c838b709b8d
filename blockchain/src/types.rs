// Standard library imports
use std::{
    fmt,
    hash::{Hash, Hasher},
};

// Third party imports
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

/// Các chain EVM được hỗ trợ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainId {
    Ethereum,
    Optimism,
    PolygonPos,
}

impl ChainId {
    /// Chain id theo EIP-155
    pub fn id(&self) -> u64 {
        match self {
            ChainId::Ethereum => 1,
            ChainId::Optimism => 10,
            ChainId::PolygonPos => 137,
        }
    }

    /// Tìm chain từ chain id số
    pub fn from_id(id: u64) -> Option<Self> {
        match id {
            1 => Some(ChainId::Ethereum),
            10 => Some(ChainId::Optimism),
            137 => Some(ChainId::PolygonPos),
            _ => None,
        }
    }

    /// Tên hiển thị dùng trong log và tên task
    pub fn name(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "ethereum",
            ChainId::Optimism => "optimism",
            ChainId::PolygonPos => "polygon_pos",
        }
    }

    /// Chain có header proof-of-authority (extraData dài) cần decode lỏng
    pub fn requires_poa(&self) -> bool {
        matches!(self, ChainId::Optimism | ChainId::PolygonPos)
    }

    /// Host mặc định của indexer kiểu etherscan
    pub fn default_indexer_host(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "api.etherscan.io",
            ChainId::Optimism => "api-optimistic.etherscan.io",
            ChainId::PolygonPos => "api.polygonscan.com",
        }
    }

    /// Contract multicall (aggregate + tryAggregate) mặc định
    pub fn default_multicall_address(&self) -> &'static str {
        match self {
            ChainId::Ethereum => "0x5BA1e12693Dc8F9c48aAD8770482f4739bEeD696",
            ChainId::Optimism | ChainId::PolygonPos => "0xcA11bde05977b3631167028862bE2a173976CA11",
        }
    }

    /// Contract quét số dư nhiều tài khoản, nếu chain có
    pub fn default_balance_scanner_address(&self) -> Option<&'static str> {
        match self {
            ChainId::Ethereum => Some("0x86F25b64e1Fe4C5162cDEeD5245575D32eC549db"),
            _ => None,
        }
    }

    /// Timestamp sớm nhất indexer đổi được sang block
    pub fn indexer_earliest_timestamp(&self) -> u64 {
        match self {
            ChainId::Ethereum => 1_438_269_989,
            ChainId::Optimism => 1_636_665_399,
            ChainId::PolygonPos => 1_590_856_200,
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Định danh một RPC endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeName {
    /// Tên duy nhất trong một chain
    pub name: String,
    /// URL endpoint, có thể rỗng với dịch vụ indexer
    pub endpoint: String,
    /// Node do người dùng sở hữu
    #[serde(default)]
    pub owned: bool,
    pub blockchain: ChainId,
}

impl NodeName {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, owned: bool, blockchain: ChainId) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            owned,
            blockchain,
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} node {}", self.blockchain, self.name)
    }
}

/// Endpoint kèm trọng số tin cậy và cờ active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedNode {
    pub node_info: NodeName,
    /// Trọng số >= 0, dùng khi bốc thăm thứ tự gọi
    pub weight: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl WeightedNode {
    pub fn new(node_info: NodeName, weight: f64, active: bool) -> Self {
        Self { node_info, weight, active }
    }
}

/// Block được chuẩn hóa
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub number: u64,
    pub hash: H256,
    pub parent_hash: H256,
    pub timestamp: u64,
    pub miner: Address,
    pub gas_limit: U256,
    pub gas_used: U256,
    pub transactions: Vec<H256>,
}

/// Transaction chưa gắn gas used và timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: H256,
    pub block_number: Option<u64>,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub gas: U256,
    pub gas_price: U256,
    pub input: Bytes,
    pub nonce: u64,
}

/// Transaction chuẩn hóa, so sánh theo (chain id, hash)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    pub tx_hash: H256,
    pub chain_id: ChainId,
    pub timestamp: u64,
    pub block_number: u64,
    pub from_address: Address,
    pub to_address: Option<Address>,
    pub value: U256,
    pub gas: U256,
    pub gas_price: U256,
    pub gas_used: U256,
    pub input_data: Bytes,
    pub nonce: u64,
}

impl PartialEq for CanonicalTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.tx_hash == other.tx_hash
    }
}

impl Eq for CanonicalTransaction {}

impl Hash for CanonicalTransaction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.tx_hash.hash(state);
    }
}

/// Một log event đã chuẩn hóa
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
    pub block_number: u64,
    pub block_hash: Option<H256>,
    pub transaction_hash: H256,
    pub transaction_index: u64,
    pub log_index: u64,
    /// Chỉ có khi indexer trả lời
    pub timestamp: Option<u64>,
    pub gas_price: Option<U256>,
    pub gas_used: Option<U256>,
}

impl LogEntry {
    /// Khóa định danh một log: (block, log index, tx hash)
    pub fn identity(&self) -> (u64, u64, H256) {
        (self.block_number, self.log_index, self.transaction_hash)
    }
}

/// Receipt chuẩn hóa
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalReceipt {
    pub tx_hash: H256,
    pub block_number: u64,
    pub transaction_index: u64,
    /// 1 thành công, 0 thất bại
    pub status: u64,
    pub cumulative_gas_used: U256,
    pub gas_used: U256,
    pub contract_address: Option<Address>,
    pub logs: Vec<LogEntry>,
}

/// Block mục tiêu cho truy vấn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockTarget {
    Number(u64),
    Latest,
}

impl From<u64> for BlockTarget {
    fn from(number: u64) -> Self {
        BlockTarget::Number(number)
    }
}

/// Bộ lọc log ở mức transport: địa chỉ, topics theo vị trí, khoảng block đã resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    /// `None` ở vị trí nào nghĩa là không lọc vị trí đó
    pub topics: Vec<Option<H256>>,
    pub from_block: u64,
    pub to_block: u64,
}

/// Hướng làm tròn khi tìm block theo timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Closest {
    Before,
    After,
}

impl Closest {
    pub fn as_str(&self) -> &'static str {
        match self {
            Closest::Before => "before",
            Closest::After => "after",
        }
    }
}

/// Metadata ERC20
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20Info {
    pub decimals: u8,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// Metadata ERC721
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc721Info {
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn tx(chain_id: ChainId, hash: H256, nonce: u64) -> CanonicalTransaction {
        CanonicalTransaction {
            tx_hash: hash,
            chain_id,
            timestamp: 0,
            block_number: 1,
            from_address: Address::zero(),
            to_address: None,
            value: U256::zero(),
            gas: U256::zero(),
            gas_price: U256::zero(),
            gas_used: U256::zero(),
            input_data: Bytes::default(),
            nonce,
        }
    }

    #[test]
    fn test_transaction_identity() {
        let hash = H256::repeat_byte(7);
        let a = tx(ChainId::Ethereum, hash, 1);
        let b = tx(ChainId::Ethereum, hash, 99);
        let c = tx(ChainId::Optimism, hash, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = vec![a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_chain_id() {
        assert_eq!(ChainId::from_id(137), Some(ChainId::PolygonPos));
        assert!(ChainId::Optimism.requires_poa());
        assert!(!ChainId::Ethereum.requires_poa());
        let chain: ChainId = serde_json::from_str("\"polygon_pos\"").unwrap();
        assert_eq!(chain, ChainId::PolygonPos);
    }
}
