// Standard library imports
use std::{collections::HashMap, sync::Arc};

// Third party imports
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

// Internal imports
use crate::config::{ArchiveFixture, InquirerSettings};
use crate::constants::WEB3_LOGQUERY_BLOCK_RANGE;
use crate::error::InquirerResult;
use crate::etherscan::IndexerClient;
use crate::types::{ChainId, Closest};

/// Hành vi riêng của từng chain mà bộ truy vấn cần
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainHooks: Send + Sync {
    /// Độ cao chuỗi theo một nguồn bên ngoài
    async fn query_highest_block(&self) -> InquirerResult<u64>;

    async fn get_blocknumber_by_time(&self, timestamp: u64, closest: Closest) -> InquirerResult<u64>;

    /// (tài khoản, block, số dư mong đợi) để nhận diện node archive
    fn archive_check_data(&self) -> Option<ArchiveFixture>;

    /// Transaction cũ dùng để nhận diện node pruned
    fn pruned_check_tx_hash(&self) -> Option<H256>;

    /// Cửa sổ block khởi đầu khi lấy log của một contract
    fn logquery_block_range(&self, _contract: Address) -> u64 {
        WEB3_LOGQUERY_BLOCK_RANGE
    }
}

/// Fixture archive mặc định của chain
pub fn default_archive_fixture(chain: ChainId) -> Option<ArchiveFixture> {
    match chain {
        ChainId::Ethereum => Some(ArchiveFixture {
            account: Address::from([
                0x50, 0x53, 0x2e, 0x4b, 0xe1, 0x95, 0xd1, 0xde, 0x0c, 0x2e,
                0x6d, 0xfa, 0x46, 0xd9, 0xec, 0x0a, 0x4f, 0xee, 0x68, 0x61,
            ]),
            block: 87_042,
            balance: U256::from(5_106_330_700_000_000_000u64),
        }),
        _ => None,
    }
}

/// Transaction fixture dùng để nhận diện node pruned
pub fn default_pruned_fixture(chain: ChainId) -> Option<H256> {
    match chain {
        ChainId::Ethereum => Some(H256::from([
            0x5c, 0x50, 0x4e, 0xd4, 0x32, 0xcb, 0x51, 0x13, 0x8b, 0xcf, 0x09, 0xaa, 0x5e, 0x8a, 0x41, 0x0d,
            0xd4, 0xa1, 0xe2, 0x04, 0xef, 0x84, 0xbf, 0xed, 0x1b, 0xe1, 0x6d, 0xfb, 0xa1, 0xb2, 0x20, 0x60,
        ])),
        _ => None,
    }
}

/// Hook chain dựa trên indexer, dùng chung cho mọi chain được hỗ trợ
pub struct IndexerChainHooks {
    chain: ChainId,
    indexer: Arc<dyn IndexerClient>,
    archive_fixture: Option<ArchiveFixture>,
    pruned_fixture: Option<H256>,
    block_range: u64,
    range_overrides: HashMap<Address, u64>,
}

impl IndexerChainHooks {
    /// Hook với fixture mặc định của chain
    pub fn new(chain: ChainId, indexer: Arc<dyn IndexerClient>) -> Self {
        Self {
            chain,
            indexer,
            archive_fixture: default_archive_fixture(chain),
            pruned_fixture: default_pruned_fixture(chain),
            block_range: WEB3_LOGQUERY_BLOCK_RANGE,
            range_overrides: HashMap::new(),
        }
    }

    pub fn ethereum(indexer: Arc<dyn IndexerClient>) -> Self {
        Self::new(ChainId::Ethereum, indexer)
    }

    pub fn optimism(indexer: Arc<dyn IndexerClient>) -> Self {
        Self::new(ChainId::Optimism, indexer)
    }

    pub fn polygon_pos(indexer: Arc<dyn IndexerClient>) -> Self {
        Self::new(ChainId::PolygonPos, indexer)
    }

    /// Hook theo cấu hình, fixture trong cấu hình thắng fixture mặc định
    pub fn from_settings(settings: &InquirerSettings, indexer: Arc<dyn IndexerClient>) -> Self {
        let mut hooks = Self::new(settings.chain, indexer);
        if settings.archive_fixture.is_some() {
            hooks.archive_fixture = settings.archive_fixture.clone();
        }
        if settings.pruned_fixture.is_some() {
            hooks.pruned_fixture = settings.pruned_fixture;
        }
        hooks.block_range = settings.logquery_block_range;
        hooks.range_overrides = settings
            .logquery_range_overrides
            .iter()
            .map(|o| (o.contract, o.block_range))
            .collect();
        hooks
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }
}

#[async_trait]
impl ChainHooks for IndexerChainHooks {
    async fn query_highest_block(&self) -> InquirerResult<u64> {
        self.indexer.get_latest_block_number().await
    }

    async fn get_blocknumber_by_time(&self, timestamp: u64, closest: Closest) -> InquirerResult<u64> {
        self.indexer.get_blocknumber_by_time(timestamp, closest).await
    }

    fn archive_check_data(&self) -> Option<ArchiveFixture> {
        self.archive_fixture.clone()
    }

    fn pruned_check_tx_hash(&self) -> Option<H256> {
        self.pruned_fixture
    }

    fn logquery_block_range(&self, contract: Address) -> u64 {
        self.range_overrides
            .get(&contract)
            .copied()
            .unwrap_or(self.block_range)
    }
}
