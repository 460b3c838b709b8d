// Third party imports
use ethers::abi::Token;
use ethers::types::{Address, Bytes};
use tracing::debug;

// Internal imports
use crate::abi::EvmContract;
use crate::error::{InquirerError, InquirerResult};
use crate::query::QueryOrchestrator;
use crate::types::WeightedNode;

/// Một lời gọi contract đã encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub target: Address,
    pub data: Bytes,
}

impl ContractCall {
    pub fn new(target: Address, data: Bytes) -> Self {
        Self { target, data }
    }
}

fn calls_token(calls: &[ContractCall]) -> Token {
    Token::Array(
        calls
            .iter()
            .map(|call| Token::Tuple(vec![Token::Address(call.target), Token::Bytes(call.data.to_vec())]))
            .collect(),
    )
}

fn bad_output(method: &str) -> InquirerError {
    InquirerError::AbiDecode(format!("unexpected {} output shape", method))
}

/// Tách `(blockNumber, bytes[])` của `aggregate`
pub(crate) fn parse_aggregate_output(tokens: Vec<Token>) -> InquirerResult<Vec<Bytes>> {
    let mut tokens = tokens.into_iter();
    let _block_number = tokens.next();
    match tokens.next() {
        Some(Token::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Token::Bytes(bytes) => Ok(Bytes::from(bytes)),
                _ => Err(bad_output("aggregate")),
            })
            .collect(),
        _ => Err(bad_output("aggregate")),
    }
}

/// Tách `(bool, bytes)[]` của `tryAggregate`
pub(crate) fn parse_try_aggregate_output(tokens: Vec<Token>) -> InquirerResult<Vec<(bool, Bytes)>> {
    match tokens.into_iter().next() {
        Some(Token::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Token::Tuple(fields) => match fields.as_slice() {
                    [Token::Bool(success), Token::Bytes(data)] => Ok((*success, Bytes::from(data.clone()))),
                    _ => Err(bad_output("tryAggregate")),
                },
                _ => Err(bad_output("tryAggregate")),
            })
            .collect(),
        _ => Err(bad_output("tryAggregate")),
    }
}

/// Gộp nhiều lời gọi contract qua contract multicall, chia theo chunk
#[derive(Clone)]
pub struct MulticallBatcher {
    orchestrator: QueryOrchestrator,
    contract: EvmContract,
    chunk_size: usize,
}

impl MulticallBatcher {
    pub fn new(orchestrator: QueryOrchestrator, contract: EvmContract, chunk_size: usize) -> Self {
        Self {
            orchestrator,
            contract,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn contract(&self) -> &EvmContract {
        &self.contract
    }

    /// Chế độ strict: một lời gọi lỗi làm cả chunk lỗi. Kết quả giữ thứ tự đầu vào.
    pub async fn aggregate(
        &self,
        calls: &[ContractCall],
        call_order: &[WeightedNode],
        block: Option<u64>,
    ) -> InquirerResult<Vec<Bytes>> {
        let mut output = Vec::with_capacity(calls.len());
        for (index, chunk) in calls.chunks(self.chunk_size).enumerate() {
            debug!("multicall aggregate chunk {} ({} calls)", index, chunk.len());
            let data = self.contract.encode("aggregate", &[calls_token(chunk)])?;
            let raw = self
                .orchestrator
                .eth_call(self.contract.address, data, call_order, block)
                .await?;
            let tokens = self.contract.decode("aggregate", &raw)?;
            output.extend(parse_aggregate_output(tokens)?);
        }
        Ok(output)
    }

    /// Chế độ lenient: mỗi lời gọi có `(success, bytes)` riêng
    pub async fn try_aggregate(
        &self,
        calls: &[ContractCall],
        require_success: bool,
        call_order: &[WeightedNode],
        block: Option<u64>,
    ) -> InquirerResult<Vec<(bool, Bytes)>> {
        let mut output = Vec::with_capacity(calls.len());
        for (index, chunk) in calls.chunks(self.chunk_size).enumerate() {
            debug!("multicall tryAggregate chunk {} ({} calls)", index, chunk.len());
            let data = self
                .contract
                .encode("tryAggregate", &[Token::Bool(require_success), calls_token(chunk)])?;
            let raw = self
                .orchestrator
                .eth_call(self.contract.address, data, call_order, block)
                .await?;
            let tokens = self.contract.decode("tryAggregate", &raw)?;
            output.extend(parse_try_aggregate_output(tokens)?);
        }
        Ok(output)
    }

    /// Gọi một method trên nhiều bộ tham số rồi decode từng kết quả
    pub async fn multicall_specific(
        &self,
        contract: &EvmContract,
        method: &str,
        arguments: &[Vec<Token>],
        call_order: &[WeightedNode],
        block: Option<u64>,
    ) -> InquirerResult<Vec<Vec<Token>>> {
        let calls = arguments
            .iter()
            .map(|args| Ok(ContractCall::new(contract.address, contract.encode(method, args)?)))
            .collect::<InquirerResult<Vec<_>>>()?;
        self.aggregate(&calls, call_order, block)
            .await?
            .iter()
            .map(|output| contract.decode(method, output))
            .collect()
    }
}
