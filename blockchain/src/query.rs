// Standard library imports
use std::{future::Future, sync::Arc};

// Third party imports
use ethers::types::{Address, Bytes, H256, U256};
use tracing::{debug, warn};

// Internal imports
use crate::connection::{ConnectionManager, LiveConnection};
use crate::error::{ErrorKind, InquirerError, InquirerResult};
use crate::etherscan::IndexerClient;
use crate::types::{BlockInfo, BlockTarget, CanonicalReceipt, RawTransaction, WeightedNode};

/// Các phương thức đi qua vòng lặp thử node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMethod {
    LatestBlockNumber,
    BlockByNumber,
    Code,
    Balance,
    MultiBalance,
    CallContract,
    TransactionReceipt,
    TransactionByHash,
    Logs,
}

impl QueryMethod {
    pub fn name(&self) -> &'static str {
        match self {
            QueryMethod::LatestBlockNumber => "get_latest_block_number",
            QueryMethod::BlockByNumber => "get_block_by_number",
            QueryMethod::Code => "get_code",
            QueryMethod::Balance => "get_balance",
            QueryMethod::MultiBalance => "get_multi_balance",
            QueryMethod::CallContract => "call_contract",
            QueryMethod::TransactionReceipt => "get_transaction_receipt",
            QueryMethod::TransactionByHash => "get_transaction_by_hash",
            QueryMethod::Logs => "get_logs",
        }
    }

    /// Node pruned không trả lời được các phương thức này
    pub fn queries_past_data(&self) -> bool {
        matches!(
            self,
            QueryMethod::TransactionReceipt | QueryMethod::TransactionByHash | QueryMethod::Logs
        )
    }
}

/// Nguồn dữ liệu đã resolve cho một ứng viên
#[derive(Clone)]
pub enum Backend {
    Node(Arc<LiveConnection>),
    Indexer(Arc<dyn IndexerClient>),
}

impl Backend {
    pub fn is_indexer(&self) -> bool {
        matches!(self, Backend::Indexer(_))
    }

    pub async fn latest_block_number(&self) -> InquirerResult<u64> {
        match self {
            Backend::Node(conn) => conn.client.block_number().await,
            Backend::Indexer(indexer) => indexer.get_latest_block_number().await,
        }
    }

    pub async fn get_block(&self, target: BlockTarget) -> InquirerResult<BlockInfo> {
        match self {
            Backend::Node(conn) => conn.client.get_block(target).await,
            Backend::Indexer(indexer) => {
                let number = match target {
                    BlockTarget::Number(number) => number,
                    BlockTarget::Latest => indexer.get_latest_block_number().await?,
                };
                indexer.get_block_by_number(number).await
            }
        }
    }

    pub async fn get_code(&self, account: Address) -> InquirerResult<Bytes> {
        match self {
            Backend::Node(conn) => conn.client.get_code(account).await,
            Backend::Indexer(indexer) => indexer.get_code(account).await,
        }
    }

    /// Indexer chỉ trả lời số dư hiện tại
    pub async fn get_balance(&self, account: Address, block: Option<u64>) -> InquirerResult<U256> {
        match (self, block) {
            (Backend::Node(conn), _) => conn.client.get_balance(account, block).await,
            (Backend::Indexer(indexer), None) => indexer.get_balance(account).await,
            (Backend::Indexer(_), Some(block)) => Err(InquirerError::BlockchainQuery(format!(
                "indexer cannot query balance at historical block {}",
                block
            ))),
        }
    }

    /// `eth_call`; indexer không gọi được tại block cũ và trả `0x` khi thất bại
    pub async fn call(&self, to: Address, data: Bytes, block: Option<u64>) -> InquirerResult<Bytes> {
        match (self, block) {
            (Backend::Node(conn), _) => conn.client.call(to, data, block).await,
            (Backend::Indexer(indexer), None) => {
                let result = indexer.eth_call(to, data).await?;
                if result.is_empty() {
                    return Err(InquirerError::BlockchainQuery(format!(
                        "indexer eth_call to {:#x} returned 0x",
                        to
                    )));
                }
                Ok(result)
            }
            (Backend::Indexer(_), Some(block)) => Err(InquirerError::BlockchainQuery(format!(
                "indexer cannot call contracts at historical block {}",
                block
            ))),
        }
    }

    pub async fn get_transaction(&self, hash: H256) -> InquirerResult<Option<RawTransaction>> {
        match self {
            Backend::Node(conn) => conn.client.get_transaction(hash).await,
            Backend::Indexer(indexer) => indexer.get_transaction_by_hash(hash).await,
        }
    }

    pub async fn get_transaction_receipt(&self, hash: H256) -> InquirerResult<Option<CanonicalReceipt>> {
        match self {
            Backend::Node(conn) => conn.client.get_transaction_receipt(hash).await,
            Backend::Indexer(indexer) => indexer.get_transaction_receipt(hash).await,
        }
    }
}

/// Kết quả một lần thử trên một ứng viên
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    SkippedByPolicy,
    TransientFailure(InquirerError),
    NotFound(H256),
    FatalFailure(InquirerError),
}

/// Vòng lặp thử lần lượt từng ứng viên cho tới khi một ứng viên trả lời
#[derive(Clone)]
pub struct QueryOrchestrator {
    connections: ConnectionManager,
    indexer: Arc<dyn IndexerClient>,
    indexer_node_name: String,
}

impl QueryOrchestrator {
    pub fn new(connections: ConnectionManager, indexer: Arc<dyn IndexerClient>, indexer_node_name: &str) -> Self {
        Self {
            connections,
            indexer,
            indexer_node_name: indexer_node_name.to_string(),
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn indexer(&self) -> &Arc<dyn IndexerClient> {
        &self.indexer
    }

    /// Resolve ứng viên thành nguồn dữ liệu, `None` nếu phải bỏ qua
    pub fn resolve(&self, candidate: &WeightedNode, method: QueryMethod) -> Option<Backend> {
        if candidate.node_info.name == self.indexer_node_name {
            return Some(Backend::Indexer(Arc::clone(&self.indexer)));
        }
        let connection = self.connections.get_connection(&candidate.node_info.name)?;
        if connection.is_pruned && method.queries_past_data() {
            return None;
        }
        Some(Backend::Node(connection))
    }

    async fn attempt<T, F, Fut>(&self, method: QueryMethod, candidate: &WeightedNode, operation: &F) -> Attempt<T>
    where
        F: Fn(Backend) -> Fut,
        Fut: Future<Output = InquirerResult<T>>,
    {
        let Some(backend) = self.resolve(candidate, method) else {
            return Attempt::SkippedByPolicy;
        };
        match operation(backend).await {
            Ok(value) => Attempt::Success(value),
            Err(error) => match error.kind() {
                ErrorKind::Transient => Attempt::TransientFailure(error),
                ErrorKind::NotFound(hash) => Attempt::NotFound(hash),
                ErrorKind::Fatal => Attempt::FatalFailure(error),
            },
        }
    }

    /// Thực thi `operation` trên từng ứng viên theo thứ tự.
    ///
    /// Trả về `Ok(None)` khi transaction không tồn tại và `must_exist` là false.
    pub async fn query<T, F, Fut>(
        &self,
        method: QueryMethod,
        call_order: &[WeightedNode],
        must_exist: bool,
        operation: F,
    ) -> InquirerResult<Option<T>>
    where
        F: Fn(Backend) -> Fut,
        Fut: Future<Output = InquirerResult<T>>,
    {
        let mut missing: Option<H256> = None;
        for candidate in call_order {
            let node = &candidate.node_info;
            match self.attempt(method, candidate, &operation).await {
                Attempt::Success(value) => return Ok(Some(value)),
                Attempt::SkippedByPolicy => {
                    debug!("Skipping {} for {}", node, method.name());
                }
                Attempt::TransientFailure(error) => {
                    warn!("Failed to query {} for {} due to {}", node, method.name(), error);
                }
                Attempt::NotFound(hash) => {
                    if !must_exist {
                        return Ok(None);
                    }
                    // node khác có thể đã index transaction này
                    warn!("Transaction {:#x} was not found via {} for {}", hash, node, method.name());
                    missing = Some(hash);
                }
                Attempt::FatalFailure(error) => return Err(error),
            }
        }

        let nodes: Vec<String> = call_order.iter().map(|c| c.node_info.name.clone()).collect();
        if let Some(hash) = missing {
            return Err(InquirerError::Remote(format!(
                "Transaction {:#x} was not found on {} after trying the following nodes: [{}]",
                hash,
                self.connections.chain(),
                nodes.join(", ")
            )));
        }
        Err(InquirerError::AllNodesFailed {
            method: method.name().to_string(),
            nodes,
        })
    }

    /// Như `query` nhưng kết quả luôn phải có
    pub async fn query_value<T, F, Fut>(
        &self,
        method: QueryMethod,
        call_order: &[WeightedNode],
        operation: F,
    ) -> InquirerResult<T>
    where
        F: Fn(Backend) -> Fut,
        Fut: Future<Output = InquirerResult<T>>,
    {
        self.query(method, call_order, true, operation)
            .await?
            .ok_or_else(|| InquirerError::Remote(format!("{} returned no result", method.name())))
    }

    /// `eth_call` thô qua vòng lặp thử node
    pub async fn eth_call(
        &self,
        to: Address,
        data: Bytes,
        call_order: &[WeightedNode],
        block: Option<u64>,
    ) -> InquirerResult<Bytes> {
        self.query_value(QueryMethod::CallContract, call_order, |backend| {
            let data = data.clone();
            async move { backend.call(to, data, block).await }
        })
        .await
    }
}
