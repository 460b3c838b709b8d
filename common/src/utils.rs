// Third party imports
use ethers::types::U256;

// Internal imports
use crate::error::{CommonError, CommonResult};

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Parse số nguyên hex dạng `0x..`. Chuỗi `0x` rỗng được hiểu là 0.
pub fn parse_hex_u64(value: &str) -> CommonResult<u64> {
    let digits = strip_hex_prefix(value.trim());
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| CommonError::Parse(format!("{}: {}", value, e)))
}

/// Parse U256 từ chuỗi hex. Chuỗi `0x` rỗng được hiểu là 0.
pub fn parse_hex_u256(value: &str) -> CommonResult<U256> {
    let digits = strip_hex_prefix(value.trim());
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(digits, 16).map_err(|e| CommonError::Parse(format!("{}: {}", value, e)))
}

/// Parse số nguyên có thể ở dạng thập phân hoặc hex có tiền tố `0x`
pub fn parse_int_flexible(value: &str) -> CommonResult<u64> {
    let value = value.trim();
    if value.starts_with("0x") || value.starts_with("0X") {
        return parse_hex_u64(value);
    }
    value
        .parse::<u64>()
        .map_err(|e| CommonError::Parse(format!("{}: {}", value, e)))
}

/// Như `parse_int_flexible` nhưng cho U256
pub fn parse_u256_flexible(value: &str) -> CommonResult<U256> {
    let value = value.trim();
    if value.starts_with("0x") || value.starts_with("0X") {
        return parse_hex_u256(value);
    }
    U256::from_dec_str(value).map_err(|e| CommonError::Parse(format!("{}: {}", value, e)))
}

/// Decode chuỗi hex (có hoặc không có `0x`) thành bytes
pub fn hex_to_bytes(value: &str) -> CommonResult<Vec<u8>> {
    Ok(hex::decode(strip_hex_prefix(value.trim()))?)
}

/// Thêm scheme `http://` nếu endpoint không có scheme
pub fn with_default_scheme(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}
