// Third party imports
use thiserror::Error;

/// Lỗi chung của các crate nodeweave
#[derive(Debug, Error)]
pub enum CommonError {
    /// Lỗi cấu hình
    #[error("Config error: {0}")]
    Config(String),
    /// Lỗi khởi tạo logging
    #[error("Logging error: {0}")]
    Logging(String),
    /// Lỗi parse dữ liệu
    #[error("Parse error: {0}")]
    Parse(String),
    /// Lỗi I/O
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for CommonError {
    fn from(err: config::ConfigError) -> Self {
        CommonError::Config(err.to_string())
    }
}

impl From<hex::FromHexError> for CommonError {
    fn from(err: hex::FromHexError) -> Self {
        CommonError::Parse(format!("invalid hex: {}", err))
    }
}

/// Kiểu kết quả chung
pub type CommonResult<T> = Result<T, CommonError>;

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let error = CommonError::Config("missing chain".to_string());
        assert_eq!(error.to_string(), "Config error: missing chain");

        let error: CommonError = hex::decode("zz").unwrap_err().into();
        assert!(error.to_string().starts_with("Parse error: invalid hex"));
    }
}
