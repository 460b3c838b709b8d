// Standard library imports
use std::sync::Arc;

// Third party imports
use dashmap::DashMap;
use ethers::abi::Token;
use ethers::types::{Address, Bytes, U256};
use tracing::{error, warn};

// Internal imports
use crate::abi::{AbiRegistry, EvmContract};
use crate::error::{InquirerError, InquirerResult};
use crate::multicall::{ContractCall, MulticallBatcher};
use crate::types::{Erc20Info, Erc721Info, WeightedNode};

const ERC20_PROPERTIES: [&str; 3] = ["decimals", "symbol", "name"];
const ERC721_PROPERTIES: [&str; 2] = ["symbol", "name"];
const DEFAULT_DECIMALS: u8 = 18;

/// Giá trị một thuộc tính đã decode
#[derive(Debug, Clone, PartialEq, Eq)]
enum PropertyValue {
    Decimals(u8),
    Text(String),
}

fn token_to_value(method: &str, token: Token) -> InquirerResult<PropertyValue> {
    match token {
        Token::Uint(value) => {
            if value > U256::from(u8::MAX) {
                return Err(InquirerError::AbiDecode(format!("{} value {} overflows u8", method, value)));
            }
            Ok(PropertyValue::Decimals(value.low_u32() as u8))
        }
        Token::String(text) => Ok(PropertyValue::Text(text)),
        Token::FixedBytes(bytes) | Token::Bytes(bytes) => {
            let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |pos| pos + 1);
            String::from_utf8(bytes[..end].to_vec())
                .map(PropertyValue::Text)
                .map_err(|e| InquirerError::AbiDecode(format!("{} is not utf8: {}", method, e)))
        }
        other => Err(InquirerError::AbiDecode(format!("unexpected {} token {:?}", method, other))),
    }
}

/// Lỗi khi decode thuộc tính
#[derive(Debug)]
enum PropertyError {
    /// Output không khớp kiểu trong ABI (thiếu dữ liệu, offset tràn)
    Abi(InquirerError),
    /// Output decode được nhưng giá trị không dùng được
    Value(InquirerError),
}

impl From<PropertyError> for InquirerError {
    fn from(error: PropertyError) -> Self {
        match error {
            PropertyError::Abi(e) | PropertyError::Value(e) => e,
        }
    }
}

/// Decode kết quả multicall cho từng thuộc tính. Lời gọi thất bại cho `None`.
fn decode_properties(
    contract: &EvmContract,
    properties: &[&str],
    outputs: &[(bool, Bytes)],
) -> Result<Vec<Option<PropertyValue>>, PropertyError> {
    properties
        .iter()
        .zip(outputs.iter())
        .map(|(method, (success, data))| {
            if !success || data.is_empty() {
                return Ok(None);
            }
            let token = contract
                .decode(method, data)
                .map_err(PropertyError::Abi)?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    PropertyError::Abi(InquirerError::AbiDecode(format!("{} returned nothing", method)))
                })?;
            token_to_value(method, token).map(Some).map_err(PropertyError::Value)
        })
        .collect()
}

fn text(value: &Option<PropertyValue>) -> Option<String> {
    match value {
        Some(PropertyValue::Text(text)) => Some(text.clone()),
        _ => None,
    }
}

/// Metadata ERC20/ERC721 qua multicall, cache theo địa chỉ
pub struct ContractInfoResolver {
    batcher: MulticallBatcher,
    abis: Arc<AbiRegistry>,
    erc20_cache: DashMap<Address, Erc20Info>,
    erc721_cache: DashMap<Address, Erc721Info>,
}

impl ContractInfoResolver {
    pub fn new(batcher: MulticallBatcher, abis: Arc<AbiRegistry>) -> Self {
        Self {
            batcher,
            abis,
            erc20_cache: DashMap::new(),
            erc721_cache: DashMap::new(),
        }
    }

    async fn query_properties(
        &self,
        contract: &EvmContract,
        properties: &[&str],
        call_order: &[WeightedNode],
    ) -> InquirerResult<Vec<(bool, Bytes)>> {
        let calls = properties
            .iter()
            .map(|method| Ok(ContractCall::new(contract.address, contract.encode(method, &[])?)))
            .collect::<InquirerResult<Vec<_>>>()?;
        match self.batcher.try_aggregate(&calls, false, call_order, None).await {
            Ok(outputs) => Ok(outputs),
            Err(e) if e.is_retryable() || matches!(e, InquirerError::AllNodesFailed { .. }) => {
                warn!(
                    "Multicall for contract info of {:#x} failed, treating all properties as missing: {}",
                    contract.address, e
                );
                Ok(vec![(false, Bytes::default()); properties.len()])
            }
            Err(e) => Err(e),
        }
    }

    /// Thông tin ERC20, decimals mặc định 18
    pub async fn get_erc20_contract_info(
        &self,
        address: Address,
        call_order: &[WeightedNode],
    ) -> InquirerResult<Erc20Info> {
        if let Some(info) = self.erc20_cache.get(&address) {
            return Ok(info.clone());
        }

        let contract = EvmContract::new(address, Arc::clone(&self.abis.erc20));
        let outputs = self.query_properties(&contract, &ERC20_PROPERTIES, call_order).await?;
        let decoded = match decode_properties(&contract, &ERC20_PROPERTIES, &outputs) {
            Ok(decoded) => decoded,
            Err(PropertyError::Abi(e)) => {
                // name/symbol kiểu bytes32
                error!(
                    "{:#x} follows ERC20 methods but returned unexpected types, retrying with bytes32 ABI: {}",
                    address, e
                );
                let fallback = EvmContract::new(address, Arc::clone(&self.abis.univ1_lp));
                decode_properties(&fallback, &ERC20_PROPERTIES, &outputs)?
            }
            Err(e) => return Err(e.into()),
        };

        let decimals = match decoded[0] {
            Some(PropertyValue::Decimals(decimals)) => decimals,
            _ => DEFAULT_DECIMALS,
        };
        let info = Erc20Info {
            decimals,
            symbol: text(&decoded[1]),
            name: text(&decoded[2]),
        };
        self.erc20_cache.insert(address, info.clone());
        Ok(info)
    }

    /// Thông tin ERC721. Output không decode được nghĩa là contract không tuân thủ ERC721.
    pub async fn get_erc721_contract_info(
        &self,
        address: Address,
        call_order: &[WeightedNode],
    ) -> InquirerResult<Erc721Info> {
        if let Some(info) = self.erc721_cache.get(&address) {
            return Ok(info.clone());
        }

        let contract = EvmContract::new(address, Arc::clone(&self.abis.erc721));
        let outputs = self.query_properties(&contract, &ERC721_PROPERTIES, call_order).await?;
        let decoded = decode_properties(&contract, &ERC721_PROPERTIES, &outputs)
            .map_err(|_| InquirerError::NotErc721Conformant(address))?;

        let info = Erc721Info {
            symbol: text(&decoded[0]),
            name: text(&decoded[1]),
        };
        self.erc721_cache.insert(address, info.clone());
        Ok(info)
    }

    pub fn cached_erc20(&self, address: &Address) -> Option<Erc20Info> {
        self.erc20_cache.get(address).map(|info| info.clone())
    }
}
