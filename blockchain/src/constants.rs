// Third party imports
use ethers::types::{H256, U256};

// Internal imports
use crate::types::CanonicalReceipt;

/// Hash giả cho các "transaction" genesis
pub const GENESIS_HASH: H256 = H256::zero();

/// Tên mặc định của dịch vụ indexer trong danh sách node
pub const DEFAULT_INDEXER_NODE_NAME: &str = "etherscan";

/// Node tụt quá số block này so với đỉnh chuỗi thì coi như chưa đồng bộ
pub const SYNC_TOLERANCE_BLOCKS: u64 = 20;

/// Cửa sổ khởi đầu khi lấy log qua node
pub const WEB3_LOGQUERY_BLOCK_RANGE: u64 = 250_000;
/// Cửa sổ tối thiểu trước khi bỏ cuộc trên node
pub const WEB3_LOGQUERY_MIN_BLOCK_RANGE: u64 = 50;
/// Chunk block khi lấy log qua indexer
pub const INDEXER_LOGQUERY_BLOCK_STEP: u64 = 300_000;
/// Chunk tối thiểu trên indexer
pub const INDEXER_LOGQUERY_MIN_BLOCK_STEP: u64 = 100;
/// Số dòng tối đa mỗi trang log của indexer
pub const INDEXER_LOGS_PAGE_LIMIT: usize = 1000;

/// Số lời gọi mặc định trong một lần multicall
pub const DEFAULT_MULTICALL_CHUNK_SIZE: usize = 20;

/// Thông điệp lỗi node khi khoảng log quá lớn
pub const NODE_LOG_OVERFLOW_MESSAGES: [&str; 2] =
    ["query returned more than 10000 results", "query timeout exceeded"];
/// Thông điệp lỗi indexer khi khoảng log quá lớn
pub const INDEXER_LOG_OVERFLOW_MESSAGE: &str = "Please select a smaller result dataset";

/// Receipt cố định trả về cho hash genesis
pub fn genesis_receipt() -> CanonicalReceipt {
    CanonicalReceipt {
        tx_hash: GENESIS_HASH,
        block_number: 0,
        transaction_index: 0,
        status: 1,
        cumulative_gas_used: U256::zero(),
        gas_used: U256::zero(),
        contract_address: None,
        logs: Vec::new(),
    }
}
