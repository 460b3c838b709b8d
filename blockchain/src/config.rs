// Standard library imports
use std::{path::Path, time::Duration};

// Third party imports
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

// Internal imports
use crate::constants::{
    DEFAULT_INDEXER_NODE_NAME, DEFAULT_MULTICALL_CHUNK_SIZE, WEB3_LOGQUERY_BLOCK_RANGE,
};
use crate::error::{InquirerError, InquirerResult};
use crate::types::{ChainId, NodeName, WeightedNode};
use nodeweave_common::{load_settings, LogConfig};

/// Tiền tố biến môi trường, ví dụ `NODEWEAVE__INDEXER__API_KEY`
pub const ENV_PREFIX: &str = "NODEWEAVE";

/// Cấu hình dịch vụ indexer kiểu etherscan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerSettings {
    /// Tên của indexer trong danh sách node
    pub node_name: String,
    /// Trọng số khi bốc thăm thứ tự gọi
    pub weight: f64,
    /// Host, ví dụ `api.etherscan.io`. Có thể kèm scheme để trỏ tới server khác
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_secs: u64,
    pub backoff_max_elapsed_secs: u64,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            node_name: DEFAULT_INDEXER_NODE_NAME.to_string(),
            weight: 0.3,
            host: None,
            api_key: None,
            timeout_secs: 30,
            backoff_initial_ms: 1000,
            backoff_max_secs: 32,
            backoff_max_elapsed_secs: 120,
        }
    }
}

impl IndexerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Node đại diện cho indexer trong danh sách node
    pub fn weighted_node(&self, chain: ChainId) -> WeightedNode {
        WeightedNode::new(NodeName::new(&self.node_name, "", false, chain), self.weight, true)
    }
}

/// Ghi đè năng lực node theo hậu tố host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOverride {
    pub host_suffix: String,
    pub is_pruned: bool,
    pub is_archive: bool,
}

impl CapabilityOverride {
    pub fn new(host_suffix: &str, is_pruned: bool, is_archive: bool) -> Self {
        Self {
            host_suffix: host_suffix.to_string(),
            is_pruned,
            is_archive,
        }
    }
}

/// Các provider công cộng đã biết năng lực, không cần probe
pub fn default_capability_overrides() -> Vec<CapabilityOverride> {
    vec![
        CapabilityOverride::new("llamarpc.com", true, false),
        CapabilityOverride::new("blastapi.io", false, false),
    ]
}

/// Dữ liệu kiểm tra archive: số dư của `account` tại `block` phải bằng `balance`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFixture {
    pub account: Address,
    pub block: u64,
    pub balance: U256,
}

/// Cửa sổ log riêng cho một contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeOverride {
    pub contract: Address,
    pub block_range: u64,
}

/// Địa chỉ contract hỗ trợ, để trống thì dùng mặc định của chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractSettings {
    pub multicall: Option<Address>,
    pub balance_scanner: Option<Address>,
}

/// Toàn bộ cấu hình của bộ truy vấn cho một chain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InquirerSettings {
    pub chain: ChainId,
    pub rpc_timeout_secs: u64,
    pub multicall_chunk_size: usize,
    pub logquery_block_range: u64,
    pub logquery_range_overrides: Vec<RangeOverride>,
    pub indexer: IndexerSettings,
    pub nodes: Vec<WeightedNode>,
    pub capability_overrides: Vec<CapabilityOverride>,
    pub contracts: ContractSettings,
    pub archive_fixture: Option<ArchiveFixture>,
    pub pruned_fixture: Option<H256>,
    pub log: LogConfig,
}

impl Default for InquirerSettings {
    fn default() -> Self {
        Self::for_chain(ChainId::Ethereum)
    }
}

impl InquirerSettings {
    /// Cấu hình mặc định cho một chain
    pub fn for_chain(chain: ChainId) -> Self {
        Self {
            chain,
            rpc_timeout_secs: 10,
            multicall_chunk_size: DEFAULT_MULTICALL_CHUNK_SIZE,
            logquery_block_range: WEB3_LOGQUERY_BLOCK_RANGE,
            logquery_range_overrides: Vec::new(),
            indexer: IndexerSettings::default(),
            nodes: Vec::new(),
            capability_overrides: default_capability_overrides(),
            contracts: ContractSettings::default(),
            archive_fixture: None,
            pruned_fixture: None,
            log: LogConfig::default(),
        }
    }

    /// Đọc cấu hình từ file (tùy chọn) và biến môi trường `NODEWEAVE__*`
    pub fn load(path: Option<&Path>) -> InquirerResult<Self> {
        let settings: Self = load_settings(path, ENV_PREFIX)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Kiểm tra các giá trị không hợp lệ
    pub fn validate(&self) -> InquirerResult<()> {
        if self.multicall_chunk_size == 0 {
            return Err(InquirerError::Config("multicall_chunk_size must be positive".into()));
        }
        if self.logquery_block_range == 0 {
            return Err(InquirerError::Config("logquery_block_range must be positive".into()));
        }
        if self.indexer.weight < 0.0 || !self.indexer.weight.is_finite() {
            return Err(InquirerError::Config(format!(
                "indexer weight {} is invalid",
                self.indexer.weight
            )));
        }
        for node in &self.nodes {
            if node.weight < 0.0 || !node.weight.is_finite() {
                return Err(InquirerError::Config(format!(
                    "node {} has invalid weight {}",
                    node.node_info.name, node.weight
                )));
            }
            if node.node_info.blockchain != self.chain {
                return Err(InquirerError::Config(format!(
                    "node {} belongs to {} but settings are for {}",
                    node.node_info.name, node.node_info.blockchain, self.chain
                )));
            }
        }
        Ok(())
    }

    /// Địa chỉ multicall đã resolve
    pub fn multicall_address(&self) -> InquirerResult<Address> {
        match self.contracts.multicall {
            Some(address) => Ok(address),
            None => parse_address(self.chain.default_multicall_address()),
        }
    }

    /// Địa chỉ balance scanner đã resolve, nếu chain có
    pub fn balance_scanner_address(&self) -> InquirerResult<Option<Address>> {
        if let Some(address) = self.contracts.balance_scanner {
            return Ok(Some(address));
        }
        self.chain
            .default_balance_scanner_address()
            .map(parse_address)
            .transpose()
    }
}

fn parse_address(value: &str) -> InquirerResult<Address> {
    value
        .parse::<Address>()
        .map_err(|e| InquirerError::Config(format!("invalid address {}: {}", value, e)))
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_chain() {
        let settings = InquirerSettings::for_chain(ChainId::Optimism);
        assert_eq!(settings.multicall_chunk_size, 20);
        assert_eq!(settings.logquery_block_range, 250_000);
        assert_eq!(settings.indexer.node_name, "etherscan");
        assert_eq!(
            settings.multicall_address().unwrap(),
            "0xcA11bde05977b3631167028862bE2a173976CA11".parse::<Address>().unwrap()
        );
        assert_eq!(settings.balance_scanner_address().unwrap(), None);
        assert!(InquirerSettings::for_chain(ChainId::Ethereum)
            .balance_scanner_address()
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = InquirerSettings::default();
        settings.multicall_chunk_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = InquirerSettings::default();
        settings.nodes.push(WeightedNode::new(
            NodeName::new("bad", "http://localhost:8545", false, ChainId::Ethereum),
            -1.0,
            true,
        ));
        assert!(settings.validate().is_err());

        let mut settings = InquirerSettings::default();
        settings.nodes.push(WeightedNode::new(
            NodeName::new("other", "http://localhost:8545", false, ChainId::PolygonPos),
            0.5,
            true,
        ));
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let raw = r#"{
            "chain": "polygon_pos",
            "multicall_chunk_size": 50,
            "nodes": [
                {"node_info": {"name": "own", "endpoint": "localhost:8545", "owned": true, "blockchain": "polygon_pos"}, "weight": 1.0}
            ],
            "indexer": {"api_key": "KEY"}
        }"#;
        let settings: InquirerSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.chain, ChainId::PolygonPos);
        assert_eq!(settings.multicall_chunk_size, 50);
        assert!(settings.nodes[0].active);
        assert_eq!(settings.indexer.api_key.as_deref(), Some("KEY"));
        assert_eq!(settings.indexer.timeout_secs, 30);
        assert_eq!(settings.capability_overrides.len(), 2);
        settings.validate().unwrap();
    }
}
