// Third party imports
use ethers::providers::{ProviderError, RpcError};
use ethers::types::{Address, H256};
use thiserror::Error;

// Internal imports
use nodeweave_common::CommonError;

/// Lỗi của bộ truy vấn đa nguồn
#[derive(Debug, Error)]
pub enum InquirerError {
    /// Lỗi từ dịch vụ từ xa (indexer, node trả lời sai)
    #[error("Remote error: {0}")]
    Remote(String),
    /// Lỗi kết nối, timeout
    #[error("Transport error: {0}")]
    Transport(String),
    /// Node trả về JSON-RPC error
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Blockchain query error: {0}")]
    BlockchainQuery(String),
    #[error("Block not found: {0}")]
    BlockNotFound(String),
    /// Response sai định dạng
    #[error("Bad response format: {0}")]
    BadResponse(String),
    #[error("Transaction {0:#x} not found")]
    TransactionNotFound(H256),
    #[error("Event {event} not found in contract ABI")]
    EventNotInAbi { event: String },
    #[error("Contract {0:#x} is not ERC721 conformant")]
    NotErc721Conformant(Address),
    /// Lỗi encode lời gọi (hàm không có trong ABI, sai tham số)
    #[error("ABI error: {0}")]
    Abi(String),
    #[error("ABI decode error: {0}")]
    AbiDecode(String),
    /// Cửa sổ log bị thu nhỏ dưới ngưỡng tối thiểu
    #[error("Log query window for {address:#x} shrank below {floor} blocks at block {block}")]
    LogRangeExhausted { address: Address, floor: u64, block: u64 },
    /// Indexer trả trang đầy trong một block duy nhất, không phân trang tiếp được
    #[error("Indexer returned a full page of {limit} logs for {address:#x} inside block {block}, result would be incomplete")]
    LogPageOverflow { address: Address, block: u64, limit: usize },
    #[error("Failed to query {method} after trying the following nodes: [{}]", .nodes.join(", "))]
    AllNodesFailed { method: String, nodes: Vec<String> },
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Phân loại lỗi cho vòng lặp thử node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Thử node tiếp theo
    Transient,
    /// Transaction không tồn tại
    NotFound(H256),
    /// Dừng ngay, không thử node khác
    Fatal,
}

impl InquirerError {
    /// Phân loại lỗi
    pub fn kind(&self) -> ErrorKind {
        match self {
            InquirerError::Remote(_)
            | InquirerError::Transport(_)
            | InquirerError::Rpc { .. }
            | InquirerError::BlockchainQuery(_)
            | InquirerError::BlockNotFound(_)
            | InquirerError::BadResponse(_)
            | InquirerError::AbiDecode(_) => ErrorKind::Transient,
            InquirerError::TransactionNotFound(hash) => ErrorKind::NotFound(*hash),
            _ => ErrorKind::Fatal,
        }
    }

    /// Lỗi có nên thử node khác không
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Thông điệp gốc của lỗi RPC, dùng để nhận diện lỗi quá tải từ node
    pub fn rpc_message(&self) -> Option<&str> {
        match self {
            InquirerError::Rpc { message, .. } => Some(message.as_str()),
            InquirerError::Remote(message) => Some(message.as_str()),
            _ => None,
        }
    }
}

impl From<ProviderError> for InquirerError {
    fn from(err: ProviderError) -> Self {
        if let Some(response) = err.as_error_response() {
            return InquirerError::Rpc {
                code: response.code,
                message: response.message.clone(),
            };
        }
        if let Some(serde_error) = err.as_serde_error() {
            return InquirerError::BadResponse(serde_error.to_string());
        }
        match err {
            ProviderError::SerdeJson(e) => InquirerError::BadResponse(e.to_string()),
            ProviderError::HexError(e) => InquirerError::BadResponse(format!("hex: {}", e)),
            ProviderError::HTTPError(e) => InquirerError::Transport(e.to_string()),
            other => InquirerError::Transport(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for InquirerError {
    fn from(err: reqwest::Error) -> Self {
        InquirerError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for InquirerError {
    fn from(err: serde_json::Error) -> Self {
        InquirerError::BadResponse(err.to_string())
    }
}

impl From<ethers::abi::Error> for InquirerError {
    fn from(err: ethers::abi::Error) -> Self {
        InquirerError::AbiDecode(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for InquirerError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        InquirerError::Transport(format!("request timed out: {}", err))
    }
}

/// Kiểu kết quả của crate
pub type InquirerResult<T> = Result<T, InquirerError>;

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(InquirerError::Transport("timeout".into()).is_retryable());
        assert!(InquirerError::Rpc { code: -32005, message: "query timeout exceeded".into() }.is_retryable());
        assert_eq!(
            InquirerError::TransactionNotFound(H256::zero()).kind(),
            ErrorKind::NotFound(H256::zero())
        );
        assert_eq!(
            InquirerError::EventNotInAbi { event: "Transfer".into() }.kind(),
            ErrorKind::Fatal
        );
        assert_eq!(InquirerError::NotErc721Conformant(Address::zero()).kind(), ErrorKind::Fatal);
    }

    #[test]
    fn test_all_nodes_failed_lists_nodes() {
        let err = InquirerError::AllNodesFailed {
            method: "get_logs".into(),
            nodes: vec!["etherscan".into(), "mainnet-a".into()],
        };
        assert_eq!(
            err.to_string(),
            "Failed to query get_logs after trying the following nodes: [etherscan, mainnet-a]"
        );
    }

    #[test]
    fn test_provider_error_conversion() {
        let err: InquirerError = ProviderError::CustomError("connection refused".into()).into();
        assert!(matches!(err, InquirerError::Transport(_)));
    }
}
