// Standard library imports
use std::sync::Arc;

// Third party imports
use ethers::abi::{Abi, Event, Function, Token};
use ethers::types::{Address, Bytes};

// Internal imports
use crate::error::{InquirerError, InquirerResult};

const ERC20_ABI: &str = include_str!("erc20.json");
const ERC721_ABI: &str = include_str!("erc721.json");
const UNIV1_LP_ABI: &str = include_str!("univ1_lp.json");
const MULTICALL_ABI: &str = include_str!("multicall.json");
const BALANCE_SCANNER_ABI: &str = include_str!("balance_scanner.json");

/// Đọc ABI từ chuỗi JSON
pub fn parse_abi(name: &str, raw: &str) -> InquirerResult<Abi> {
    serde_json::from_str(raw).map_err(|e| InquirerError::Abi(format!("cannot parse {} ABI: {}", name, e)))
}

/// Các ABI nhúng sẵn mà bộ truy vấn dùng
#[derive(Debug, Clone)]
pub struct AbiRegistry {
    pub erc20: Arc<Abi>,
    pub erc721: Arc<Abi>,
    /// Biến thể ERC20 trả `bytes32` cho name/symbol
    pub univ1_lp: Arc<Abi>,
    pub multicall: Arc<Abi>,
    pub balance_scanner: Arc<Abi>,
}

impl AbiRegistry {
    pub fn load() -> InquirerResult<Self> {
        Ok(Self {
            erc20: Arc::new(parse_abi("ERC20", ERC20_ABI)?),
            erc721: Arc::new(parse_abi("ERC721", ERC721_ABI)?),
            univ1_lp: Arc::new(parse_abi("UNIV1_LP", UNIV1_LP_ABI)?),
            multicall: Arc::new(parse_abi("MULTICALL", MULTICALL_ABI)?),
            balance_scanner: Arc::new(parse_abi("BALANCE_SCANNER", BALANCE_SCANNER_ABI)?),
        })
    }
}

/// Contract trên chuỗi: địa chỉ + ABI
#[derive(Debug, Clone)]
pub struct EvmContract {
    pub address: Address,
    pub abi: Arc<Abi>,
    pub deployed_block: Option<u64>,
}

impl EvmContract {
    pub fn new(address: Address, abi: Arc<Abi>) -> Self {
        Self { address, abi, deployed_block: None }
    }

    pub fn with_deployed_block(mut self, block: u64) -> Self {
        self.deployed_block = Some(block);
        self
    }

    fn function(&self, method: &str) -> InquirerResult<&Function> {
        self.abi.function(method).map_err(|_| {
            InquirerError::Abi(format!("function {} not found in ABI of {:#x}", method, self.address))
        })
    }

    /// Encode calldata cho `method`
    pub fn encode(&self, method: &str, args: &[Token]) -> InquirerResult<Bytes> {
        let data = self
            .function(method)?
            .encode_input(args)
            .map_err(|e| InquirerError::Abi(format!("cannot encode {}: {}", method, e)))?;
        Ok(data.into())
    }

    /// Decode output của `method`
    pub fn decode(&self, method: &str, output: &[u8]) -> InquirerResult<Vec<Token>> {
        self.function(method)?
            .decode_output(output)
            .map_err(|e| InquirerError::AbiDecode(format!("cannot decode {} output: {}", method, e)))
    }

    /// Tìm event theo tên
    pub fn event(&self, name: &str) -> InquirerResult<&Event> {
        self.abi
            .event(name)
            .map_err(|_| InquirerError::EventNotInAbi { event: name.to_string() })
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::encode;

    #[test]
    fn test_embedded_abis_parse() {
        let registry = AbiRegistry::load().unwrap();
        assert!(registry.erc20.function("decimals").is_ok());
        assert!(registry.multicall.function("tryAggregate").is_ok());
        assert!(registry.balance_scanner.function("etherBalances").is_ok());
        assert!(registry.erc721.event("Transfer").is_ok());
    }

    #[test]
    fn test_encode_decode() {
        let registry = AbiRegistry::load().unwrap();
        let contract = EvmContract::new(Address::repeat_byte(1), registry.erc20.clone());
        let data = contract.encode("balanceOf", &[Token::Address(Address::repeat_byte(2))]).unwrap();
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);

        let output = encode(&[Token::String("Dai Stablecoin".into())]);
        let tokens = contract.decode("name", &output).unwrap();
        assert_eq!(tokens, vec![Token::String("Dai Stablecoin".into())]);

        assert!(matches!(contract.encode("missing", &[]), Err(InquirerError::Abi(_))));
        assert!(matches!(contract.event("Missing"), Err(InquirerError::EventNotInAbi { .. })));
    }
}
