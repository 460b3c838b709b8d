// Standard library imports
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

// Third party imports
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use ethers::types::{Address, Bytes, Transaction, TransactionReceipt, H256, U256};
use serde_json::Value;
use tracing::{debug, warn};

// Internal imports
use crate::client::{block_from_json, receipt_from_ethers, transaction_from_ethers};
use crate::config::IndexerSettings;
use crate::error::{InquirerError, InquirerResult};
use crate::types::{BlockInfo, CanonicalReceipt, ChainId, Closest, LogEntry, RawTransaction};
use nodeweave_common::utils::{hex_to_bytes, parse_hex_u256, parse_hex_u64, parse_int_flexible, parse_u256_flexible};

/// Các action mà response thiếu `result` nghĩa là "không có"
const NULLABLE_ACTIONS: [&str; 3] = [
    "eth_getTransactionByHash",
    "eth_getTransactionReceipt",
    "getcontractcreation",
];
const TRANSACTION_LIST_ACTIONS: [&str; 3] = ["txlist", "txlistinternal", "tokentx"];

/// Giao diện của dịch vụ indexer kiểu block explorer
#[async_trait]
pub trait IndexerClient: Send + Sync {
    async fn get_latest_block_number(&self) -> InquirerResult<u64>;
    async fn get_block_by_number(&self, number: u64) -> InquirerResult<BlockInfo>;
    async fn get_code(&self, account: Address) -> InquirerResult<Bytes>;
    /// Chỉ hỗ trợ số dư tại block mới nhất
    async fn get_balance(&self, account: Address) -> InquirerResult<U256>;
    async fn eth_call(&self, to: Address, data: Bytes) -> InquirerResult<Bytes>;
    async fn get_transaction_by_hash(&self, hash: H256) -> InquirerResult<Option<RawTransaction>>;
    async fn get_transaction_receipt(&self, hash: H256) -> InquirerResult<Option<CanonicalReceipt>>;
    /// Tối đa 1000 log mỗi lần gọi
    async fn get_logs(
        &self,
        address: Address,
        topics: &[Option<H256>],
        from_block: u64,
        to_block: u64,
    ) -> InquirerResult<Vec<LogEntry>>;
    async fn get_blocknumber_by_time(&self, timestamp: u64, closest: Closest) -> InquirerResult<u64>;
    /// `None` nếu địa chỉ không phải contract
    async fn get_contract_creation_hash(&self, address: Address) -> InquirerResult<Option<H256>>;
}

/// Kết quả diễn giải một response của indexer
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IndexerResponse {
    Data(Option<Value>),
    RateLimited,
}

/// Diễn giải body JSON của indexer theo action đã gọi
pub(crate) fn interpret_response(action: &str, body: &Value) -> InquirerResult<IndexerResponse> {
    let result = match body.get("result") {
        Some(result) if !result.is_null() => result,
        _ => {
            if NULLABLE_ACTIONS.contains(&action) {
                return Ok(IndexerResponse::Data(None));
            }
            return Err(InquirerError::Remote(format!(
                "Unexpected indexer response for {}: missing result. Response was: {}",
                action, body
            )));
        }
    };

    // proxy call thành công không có status
    let status = match body.get("status") {
        None => 1,
        Some(Value::String(s)) => s.parse::<i64>().unwrap_or(-1),
        Some(Value::Number(n)) => n.as_i64().unwrap_or(-1),
        Some(_) => -1,
    };
    if status == 1 {
        return Ok(IndexerResponse::Data(Some(result.clone())));
    }

    let result_text = result.as_str().unwrap_or_default();
    let message = body.get("message").and_then(Value::as_str).unwrap_or_default();
    if status == 0 {
        if result_text == "Contract source code not verified" {
            return Ok(IndexerResponse::Data(None));
        }
        if result_text.contains("rate limit reached") {
            return Ok(IndexerResponse::RateLimited);
        }
        if (message == "No transactions found" && TRANSACTION_LIST_ACTIONS.contains(&action))
            || (message == "No records found" && action.contains("getLogs"))
        {
            return Ok(IndexerResponse::Data(Some(Value::Array(Vec::new()))));
        }
    }
    Err(InquirerError::Remote(format!("Indexer returned error response: {}", body)))
}

fn field<'a>(entry: &'a Value, name: &str) -> InquirerResult<&'a str> {
    entry
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| InquirerError::BadResponse(format!("indexer log entry missing {}", name)))
}

fn bad(e: impl std::fmt::Display) -> InquirerError {
    InquirerError::BadResponse(e.to_string())
}

/// Parse một log từ endpoint getLogs của indexer
pub(crate) fn parse_log_entry(entry: &Value) -> InquirerResult<LogEntry> {
    let topics = entry
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| InquirerError::BadResponse("indexer log entry missing topics".into()))?
        .iter()
        .filter_map(Value::as_str)
        .map(|topic| topic.parse::<H256>().map_err(bad))
        .collect::<InquirerResult<Vec<_>>>()?;
    let optional_u256 = |name: &str| -> InquirerResult<Option<U256>> {
        entry
            .get(name)
            .and_then(Value::as_str)
            .map(|value| parse_hex_u256(value).map_err(bad))
            .transpose()
    };

    Ok(LogEntry {
        address: field(entry, "address")?.parse::<Address>().map_err(bad)?,
        topics,
        data: hex_to_bytes(field(entry, "data")?).map_err(bad)?.into(),
        block_number: parse_hex_u64(field(entry, "blockNumber")?).map_err(bad)?,
        block_hash: entry
            .get("blockHash")
            .and_then(Value::as_str)
            .and_then(|hash| hash.parse::<H256>().ok()),
        transaction_hash: field(entry, "transactionHash")?.parse::<H256>().map_err(bad)?,
        transaction_index: parse_hex_u64(field(entry, "transactionIndex")?).map_err(bad)?,
        log_index: parse_hex_u64(field(entry, "logIndex")?).map_err(bad)?,
        timestamp: entry
            .get("timeStamp")
            .and_then(Value::as_str)
            .map(|ts| parse_hex_u64(ts).map_err(bad))
            .transpose()?,
        gas_price: optional_u256("gasPrice")?,
        gas_used: optional_u256("gasUsed")?,
    })
}

/// Client HTTP cho API kiểu etherscan
pub struct Etherscan {
    chain: ChainId,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    timeout: Duration,
    settings: IndexerSettings,
    warning_given: AtomicBool,
}

impl Etherscan {
    /// Tạo client mới cho chain
    pub fn new(chain: ChainId, settings: &IndexerSettings) -> InquirerResult<Self> {
        let host = settings
            .host
            .clone()
            .unwrap_or_else(|| chain.default_indexer_host().to_string());
        let base_url = if host.contains("://") {
            format!("{}/api", host.trim_end_matches('/'))
        } else {
            format!("https://{}/api", host)
        };
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            chain,
            base_url,
            api_key: settings.api_key.clone().filter(|key| !key.is_empty()),
            client,
            timeout: settings.timeout(),
            settings: settings.clone(),
            warning_given: AtomicBool::new(false),
        })
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff::default();
        backoff.initial_interval = Duration::from_millis(self.settings.backoff_initial_ms);
        backoff.max_interval = Duration::from_secs(self.settings.backoff_max_secs);
        backoff.multiplier = 2.0;
        backoff.randomization_factor = 0.0;
        backoff.max_elapsed_time = Some(Duration::from_secs(self.settings.backoff_max_elapsed_secs));
        backoff
    }

    async fn query(
        &self,
        module: &str,
        action: &str,
        options: &[(String, String)],
        timeout: Duration,
    ) -> InquirerResult<Option<Value>> {
        let mut params: Vec<(String, String)> = vec![
            ("module".to_string(), module.to_string()),
            ("action".to_string(), action.to_string()),
        ];
        params.extend(options.iter().cloned());
        match &self.api_key {
            Some(key) => params.push(("apikey".to_string(), key.clone())),
            None => {
                if !self.warning_given.swap(true, Ordering::Relaxed) {
                    warn!("Không có API key cho indexer {}, truy vấn sẽ bị giới hạn", self.chain);
                }
            }
        }

        let operation = || self.send_once(action, &params, timeout);
        backoff::future::retry(self.create_backoff(), operation).await
    }

    async fn send_once(
        &self,
        action: &str,
        params: &[(String, String)],
        timeout: Duration,
    ) -> Result<Option<Value>, backoff::Error<InquirerError>> {
        debug!("Querying {} indexer: action={}", self.chain, action);
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    debug!("Indexer {} không kết nối được, thử lại sau backoff", self.chain);
                    backoff::Error::transient(InquirerError::Remote(format!(
                        "{} indexer connection failed: {}",
                        self.chain, e
                    )))
                } else {
                    backoff::Error::permanent(InquirerError::Remote(format!(
                        "{} indexer request failed due to {}",
                        self.chain, e
                    )))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| backoff::Error::permanent(InquirerError::Remote(e.to_string())))?;
        if !status.is_success() {
            return Err(backoff::Error::permanent(InquirerError::Remote(format!(
                "{} indexer request {} failed with HTTP status code {} and text {}",
                self.chain, action, status, text
            ))));
        }
        let body: Value = serde_json::from_str(&text).map_err(|_| {
            backoff::Error::permanent(InquirerError::Remote(format!(
                "{} indexer request {} returned invalid JSON response: {}",
                self.chain, action, text
            )))
        })?;

        match interpret_response(action, &body).map_err(backoff::Error::permanent)? {
            IndexerResponse::Data(result) => Ok(result),
            IndexerResponse::RateLimited => {
                debug!("Indexer {} báo rate limit, thử lại sau backoff", self.chain);
                Err(backoff::Error::transient(InquirerError::Remote(format!(
                    "{} indexer rate limit reached",
                    self.chain
                ))))
            }
        }
    }

    async fn query_required(
        &self,
        module: &str,
        action: &str,
        options: &[(String, String)],
    ) -> InquirerResult<Value> {
        self.query(module, action, options, self.timeout)
            .await?
            .ok_or_else(|| InquirerError::Remote(format!("{} indexer returned no result for {}", self.chain, action)))
    }

    fn as_str<'a>(&self, value: &'a Value, action: &str) -> InquirerResult<&'a str> {
        value.as_str().ok_or_else(|| {
            InquirerError::Remote(format!("{} indexer returned non-string result for {}: {}", self.chain, action, value))
        })
    }
}

fn opt(name: &str, value: impl ToString) -> (String, String) {
    (name.to_string(), value.to_string())
}

#[async_trait]
impl IndexerClient for Etherscan {
    async fn get_latest_block_number(&self) -> InquirerResult<u64> {
        let result = self.query_required("proxy", "eth_blockNumber", &[]).await?;
        parse_hex_u64(self.as_str(&result, "eth_blockNumber")?).map_err(bad)
    }

    async fn get_block_by_number(&self, number: u64) -> InquirerResult<BlockInfo> {
        let options = [opt("tag", format!("{:#x}", number)), opt("boolean", "false")];
        let result = self.query_required("proxy", "eth_getBlockByNumber", &options).await?;
        block_from_json(&result)
    }

    async fn get_code(&self, account: Address) -> InquirerResult<Bytes> {
        let options = [opt("address", format!("{:#x}", account)), opt("tag", "latest")];
        let result = self.query_required("proxy", "eth_getCode", &options).await?;
        Ok(hex_to_bytes(self.as_str(&result, "eth_getCode")?).map_err(bad)?.into())
    }

    async fn get_balance(&self, account: Address) -> InquirerResult<U256> {
        let options = [opt("address", format!("{:#x}", account)), opt("tag", "latest")];
        let result = self.query_required("account", "balance", &options).await?;
        parse_u256_flexible(self.as_str(&result, "balance")?).map_err(bad)
    }

    async fn eth_call(&self, to: Address, data: Bytes) -> InquirerResult<Bytes> {
        let options = [opt("to", format!("{:#x}", to)), opt("data", data)];
        let result = self.query_required("proxy", "eth_call", &options).await?;
        Ok(hex_to_bytes(self.as_str(&result, "eth_call")?).map_err(bad)?.into())
    }

    async fn get_transaction_by_hash(&self, hash: H256) -> InquirerResult<Option<RawTransaction>> {
        let options = [opt("txhash", format!("{:#x}", hash))];
        match self.query("proxy", "eth_getTransactionByHash", &options, self.timeout).await? {
            Some(raw) => {
                let tx: Transaction = serde_json::from_value(raw)?;
                Ok(Some(transaction_from_ethers(tx)))
            }
            None => Ok(None),
        }
    }

    async fn get_transaction_receipt(&self, hash: H256) -> InquirerResult<Option<CanonicalReceipt>> {
        let options = [opt("txhash", format!("{:#x}", hash))];
        match self.query("proxy", "eth_getTransactionReceipt", &options, self.timeout).await? {
            Some(raw) => {
                let receipt: TransactionReceipt = serde_json::from_value(raw)?;
                Ok(Some(receipt_from_ethers(receipt)?))
            }
            None => Ok(None),
        }
    }

    async fn get_logs(
        &self,
        address: Address,
        topics: &[Option<H256>],
        from_block: u64,
        to_block: u64,
    ) -> InquirerResult<Vec<LogEntry>> {
        let mut options = vec![
            opt("fromBlock", from_block),
            opt("toBlock", to_block),
            opt("address", format!("{:#x}", address)),
        ];
        for (idx, topic) in topics.iter().enumerate() {
            if let Some(topic) = topic {
                options.push(opt(&format!("topic{}", idx), format!("{:#x}", topic)));
                options.push(opt(&format!("topic{}_{}opr", idx, idx + 1), "and"));
            }
        }
        let result = self
            .query("logs", "getLogs", &options, self.timeout * 2)
            .await?
            .unwrap_or(Value::Array(Vec::new()));
        result
            .as_array()
            .ok_or_else(|| InquirerError::Remote(format!("{} indexer getLogs result is not a list: {}", self.chain, result)))?
            .iter()
            .map(parse_log_entry)
            .collect()
    }

    async fn get_blocknumber_by_time(&self, timestamp: u64, closest: Closest) -> InquirerResult<u64> {
        // indexer không xử lý tốt các timestamp gần genesis
        if timestamp < self.chain.indexer_earliest_timestamp() {
            return Ok(0);
        }
        let options = [opt("timestamp", timestamp), opt("closest", closest.as_str())];
        let result = self.query_required("block", "getblocknobytime", &options).await?;
        let text = self.as_str(&result, "getblocknobytime")?;
        parse_int_flexible(text).map_err(|_| {
            InquirerError::Remote(format!(
                "Could not read blocknumber from indexer getblocknobytime result {}",
                text
            ))
        })
    }

    async fn get_contract_creation_hash(&self, address: Address) -> InquirerResult<Option<H256>> {
        let options = [opt("contractaddresses", format!("{:#x}", address))];
        let result = match self.query("contract", "getcontractcreation", &options, self.timeout).await? {
            Some(result) => result,
            None => return Ok(None),
        };
        let hash = result
            .get(0)
            .and_then(|entry| entry.get("txHash"))
            .and_then(Value::as_str)
            .ok_or_else(|| InquirerError::Remote(format!("{} indexer getcontractcreation missing txHash: {}", self.chain, result)))?;
        Ok(Some(hash.parse::<H256>().map_err(bad)?))
    }
}
