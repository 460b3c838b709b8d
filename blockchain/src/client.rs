// Standard library imports
use std::{sync::Arc, time::Duration};

// Third party imports
use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::{
        Address, Block, BlockId, BlockNumber, Bytes, Filter, Log, Transaction, TransactionReceipt,
        TransactionRequest, H256, U256, U64,
    },
};
use serde_json::Value;
use tracing::debug;
use url::Url;

// Internal imports
use crate::error::{InquirerError, InquirerResult};
use crate::types::{
    BlockInfo, BlockTarget, CanonicalReceipt, ChainId, LogEntry, LogFilter, NodeName, RawTransaction,
};
use nodeweave_common::utils::{parse_hex_u256, parse_hex_u64, with_default_scheme};

/// Giao diện JSON-RPC tối thiểu mà bộ truy vấn cần từ một node
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// `web3_clientVersion`, dùng làm liveness probe
    async fn client_version(&self) -> InquirerResult<String>;
    /// `net_version`
    async fn network_id(&self) -> InquirerResult<u64>;
    async fn block_number(&self) -> InquirerResult<u64>;
    /// Số dư tại block cho trước, `None` là block mới nhất
    async fn get_balance(&self, account: Address, block: Option<u64>) -> InquirerResult<U256>;
    /// Block không tồn tại trả về `BlockNotFound`
    async fn get_block(&self, target: BlockTarget) -> InquirerResult<BlockInfo>;
    async fn get_code(&self, account: Address) -> InquirerResult<Bytes>;
    async fn get_transaction(&self, hash: H256) -> InquirerResult<Option<RawTransaction>>;
    async fn get_transaction_receipt(&self, hash: H256) -> InquirerResult<Option<CanonicalReceipt>>;
    async fn get_logs(&self, filter: &LogFilter) -> InquirerResult<Vec<LogEntry>>;
    /// `eth_call`
    async fn call(&self, to: Address, data: Bytes, block: Option<u64>) -> InquirerResult<Bytes>;
}

/// Mở handle tới một endpoint
#[async_trait]
pub trait NodeConnector: Send + Sync {
    async fn connect(&self, node: &NodeName, chain: ChainId) -> InquirerResult<Arc<dyn NodeClient>>;
}

/// Kết nối HTTP qua ethers, không gắn middleware nào
#[derive(Debug, Clone)]
pub struct HttpNodeConnector {
    timeout: Duration,
}

impl HttpNodeConnector {
    /// Tạo connector với timeout cố định cho mọi request
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl NodeConnector for HttpNodeConnector {
    async fn connect(&self, node: &NodeName, chain: ChainId) -> InquirerResult<Arc<dyn NodeClient>> {
        let client = EthersNodeClient::new(&node.endpoint, self.timeout, chain.requires_poa())?;
        Ok(Arc::new(client))
    }
}

/// Client JSON-RPC trên `Provider<Http>` của ethers
#[derive(Debug, Clone)]
pub struct EthersNodeClient {
    provider: Provider<Http>,
    poa: bool,
}

impl EthersNodeClient {
    /// Tạo client mới. Endpoint không có scheme được coi là `http://`.
    pub fn new(endpoint: &str, timeout: Duration, poa: bool) -> InquirerResult<Self> {
        let url = Url::parse(&with_default_scheme(endpoint))
            .map_err(|e| InquirerError::Config(format!("invalid endpoint {}: {}", endpoint, e)))?;
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        let provider = Provider::new(Http::new_with_client(url, http_client));
        Ok(Self { provider, poa })
    }

    /// Decode block lỏng cho chain proof-of-authority: chỉ lấy các trường cần thiết
    async fn get_block_lenient(&self, target: BlockTarget) -> InquirerResult<BlockInfo> {
        let tag = match target {
            BlockTarget::Number(number) => format!("{:#x}", number),
            BlockTarget::Latest => "latest".to_string(),
        };
        let raw: Value = self
            .provider
            .request("eth_getBlockByNumber", (tag.clone(), false))
            .await?;
        if raw.is_null() {
            return Err(InquirerError::BlockNotFound(tag));
        }
        block_from_json(&raw)
    }
}

#[async_trait]
impl NodeClient for EthersNodeClient {
    async fn client_version(&self) -> InquirerResult<String> {
        Ok(self.provider.client_version().await?)
    }

    async fn network_id(&self) -> InquirerResult<u64> {
        let version = self.provider.get_net_version().await?;
        version
            .trim()
            .parse::<u64>()
            .map_err(|e| InquirerError::BadResponse(format!("net_version {}: {}", version, e)))
    }

    async fn block_number(&self) -> InquirerResult<u64> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    async fn get_balance(&self, account: Address, block: Option<u64>) -> InquirerResult<U256> {
        Ok(self.provider.get_balance(account, block.map(block_id)).await?)
    }

    async fn get_block(&self, target: BlockTarget) -> InquirerResult<BlockInfo> {
        if self.poa {
            return self.get_block_lenient(target).await;
        }
        let id = match target {
            BlockTarget::Number(number) => block_id(number),
            BlockTarget::Latest => BlockId::Number(BlockNumber::Latest),
        };
        match self.provider.get_block(id).await? {
            Some(block) => block_from_ethers(block),
            None => Err(InquirerError::BlockNotFound(format!("{:?}", target))),
        }
    }

    async fn get_code(&self, account: Address) -> InquirerResult<Bytes> {
        Ok(self.provider.get_code(account, None).await?)
    }

    async fn get_transaction(&self, hash: H256) -> InquirerResult<Option<RawTransaction>> {
        Ok(self.provider.get_transaction(hash).await?.map(transaction_from_ethers))
    }

    async fn get_transaction_receipt(&self, hash: H256) -> InquirerResult<Option<CanonicalReceipt>> {
        match self.provider.get_transaction_receipt(hash).await? {
            Some(receipt) => Ok(Some(receipt_from_ethers(receipt)?)),
            None => Ok(None),
        }
    }

    async fn get_logs(&self, filter: &LogFilter) -> InquirerResult<Vec<LogEntry>> {
        let mut ethers_filter = Filter::new()
            .address(filter.address)
            .from_block(filter.from_block)
            .to_block(filter.to_block);
        for (position, topic) in filter.topics.iter().enumerate().take(4) {
            if let Some(topic) = topic {
                ethers_filter.topics[position] = Some((*topic).into());
            }
        }
        debug!(
            "eth_getLogs {:#x} [{}, {}]",
            filter.address, filter.from_block, filter.to_block
        );
        self.provider
            .get_logs(&ethers_filter)
            .await?
            .into_iter()
            .map(log_from_ethers)
            .collect()
    }

    async fn call(&self, to: Address, data: Bytes, block: Option<u64>) -> InquirerResult<Bytes> {
        let tx = TransactionRequest::new().to(to).data(data);
        Ok(self.provider.call(&tx.into(), block.map(block_id)).await?)
    }
}

fn block_id(number: u64) -> BlockId {
    BlockId::Number(BlockNumber::Number(U64::from(number)))
}

fn required<T>(value: Option<T>, field: &str) -> InquirerResult<T> {
    value.ok_or_else(|| InquirerError::BadResponse(format!("missing {}", field)))
}

pub(crate) fn block_from_ethers(block: Block<H256>) -> InquirerResult<BlockInfo> {
    Ok(BlockInfo {
        number: required(block.number, "block number")?.as_u64(),
        hash: required(block.hash, "block hash")?,
        parent_hash: block.parent_hash,
        timestamp: block.timestamp.low_u64(),
        miner: block.author.unwrap_or_default(),
        gas_limit: block.gas_limit,
        gas_used: block.gas_used,
        transactions: block.transactions,
    })
}

fn json_str<'a>(raw: &'a Value, field: &str) -> Option<&'a str> {
    raw.get(field).and_then(Value::as_str)
}

fn json_h256(raw: &Value, field: &str) -> InquirerResult<H256> {
    match json_str(raw, field) {
        Some(value) => value
            .parse::<H256>()
            .map_err(|e| InquirerError::BadResponse(format!("{} {}: {}", field, value, e))),
        None => Ok(H256::zero()),
    }
}

pub(crate) fn block_from_json(raw: &Value) -> InquirerResult<BlockInfo> {
    let number = json_str(raw, "number")
        .ok_or_else(|| InquirerError::BadResponse("missing block number".into()))?;
    let transactions = raw
        .get("transactions")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().or_else(|| json_str(item, "hash")))
                .filter_map(|hash| hash.parse::<H256>().ok())
                .collect()
        })
        .unwrap_or_default();
    Ok(BlockInfo {
        number: parse_hex_u64(number).map_err(|e| InquirerError::BadResponse(e.to_string()))?,
        hash: json_h256(raw, "hash")?,
        parent_hash: json_h256(raw, "parentHash")?,
        timestamp: parse_hex_u64(json_str(raw, "timestamp").unwrap_or("0x"))
            .map_err(|e| InquirerError::BadResponse(e.to_string()))?,
        miner: json_str(raw, "miner")
            .and_then(|value| value.parse::<Address>().ok())
            .unwrap_or_default(),
        gas_limit: parse_hex_u256(json_str(raw, "gasLimit").unwrap_or("0x"))
            .map_err(|e| InquirerError::BadResponse(e.to_string()))?,
        gas_used: parse_hex_u256(json_str(raw, "gasUsed").unwrap_or("0x"))
            .map_err(|e| InquirerError::BadResponse(e.to_string()))?,
        transactions,
    })
}

pub(crate) fn transaction_from_ethers(tx: Transaction) -> RawTransaction {
    RawTransaction {
        hash: tx.hash,
        block_number: tx.block_number.map(|n| n.as_u64()),
        from: tx.from,
        to: tx.to,
        value: tx.value,
        gas: tx.gas,
        gas_price: tx.gas_price.or(tx.max_fee_per_gas).unwrap_or_default(),
        input: tx.input,
        nonce: tx.nonce.low_u64(),
    }
}

pub(crate) fn log_from_ethers(log: Log) -> InquirerResult<LogEntry> {
    Ok(LogEntry {
        address: log.address,
        topics: log.topics,
        data: log.data,
        block_number: required(log.block_number, "log block number")?.as_u64(),
        block_hash: log.block_hash,
        transaction_hash: required(log.transaction_hash, "log transaction hash")?,
        transaction_index: required(log.transaction_index, "log transaction index")?.as_u64(),
        log_index: required(log.log_index, "log index")?.low_u64(),
        timestamp: None,
        gas_price: None,
        gas_used: None,
    })
}

pub(crate) fn receipt_from_ethers(receipt: TransactionReceipt) -> InquirerResult<CanonicalReceipt> {
    let logs = receipt
        .logs
        .into_iter()
        .map(log_from_ethers)
        .collect::<InquirerResult<Vec<_>>>()?;
    Ok(CanonicalReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: required(receipt.block_number, "receipt block number")?.as_u64(),
        transaction_index: receipt.transaction_index.as_u64(),
        status: receipt.status.map(|s| s.as_u64()).unwrap_or(1),
        cumulative_gas_used: receipt.cumulative_gas_used,
        gas_used: receipt.gas_used.unwrap_or_default(),
        contract_address: receipt.contract_address,
        logs,
    })
}
