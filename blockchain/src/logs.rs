// Standard library imports
use std::{collections::HashSet, sync::Arc};

// Third party imports
use ethers::abi::{Event, RawTopicFilter, Token, Topic};
use ethers::types::{Address, H256};
use tracing::debug;

// Internal imports
use crate::abi::EvmContract;
use crate::client::NodeClient;
use crate::constants::{
    INDEXER_LOGQUERY_BLOCK_STEP, INDEXER_LOGQUERY_MIN_BLOCK_STEP, INDEXER_LOGS_PAGE_LIMIT,
    INDEXER_LOG_OVERFLOW_MESSAGE, NODE_LOG_OVERFLOW_MESSAGES, WEB3_LOGQUERY_MIN_BLOCK_RANGE,
};
use crate::error::{InquirerError, InquirerResult};
use crate::etherscan::IndexerClient;
use crate::hooks::ChainHooks;
use crate::query::{Backend, QueryMethod, QueryOrchestrator};
use crate::types::{BlockTarget, LogEntry, LogFilter, WeightedNode};

fn to_topic(token: Option<&Token>) -> Topic<Token> {
    match token {
        Some(token) => Topic::This(token.clone()),
        None => Topic::Any,
    }
}

/// Tính topics từ chữ ký event và bộ lọc tham số indexed (theo thứ tự khai báo)
pub fn event_topics(event: &Event, argument_filters: &[Option<Token>]) -> InquirerResult<Vec<Option<H256>>> {
    let raw = RawTopicFilter {
        topic0: to_topic(argument_filters.first().and_then(Option::as_ref)),
        topic1: to_topic(argument_filters.get(1).and_then(Option::as_ref)),
        topic2: to_topic(argument_filters.get(2).and_then(Option::as_ref)),
    };
    let filter = event
        .filter(raw)
        .map_err(|e| InquirerError::Abi(format!("cannot build topics for {}: {}", event.name, e)))?;

    let mut topics: Vec<Option<H256>> = [filter.topic0, filter.topic1, filter.topic2, filter.topic3]
        .into_iter()
        .map(|topic| match topic {
            Topic::This(hash) => Some(hash),
            _ => None,
        })
        .collect();
    while topics.last() == Some(&None) {
        topics.pop();
    }
    Ok(topics)
}

fn is_node_overflow(error: &InquirerError) -> bool {
    error
        .rpc_message()
        .map_or(false, |message| NODE_LOG_OVERFLOW_MESSAGES.iter().any(|m| message.contains(m)))
}

fn is_indexer_overflow(error: &InquirerError) -> bool {
    error
        .rpc_message()
        .map_or(false, |message| message.contains(INDEXER_LOG_OVERFLOW_MESSAGE))
}

/// Lấy log qua node: cửa sổ bị chia đôi khi node báo quá tải, trở lại kích thước ban đầu sau mỗi lần thành công
pub async fn query_node_logs(
    client: &dyn NodeClient,
    address: Address,
    topics: &[Option<H256>],
    from_block: u64,
    to_block: u64,
    initial_range: u64,
) -> InquirerResult<Vec<LogEntry>> {
    let initial_range = initial_range.max(1);
    let mut logs = Vec::new();
    let mut start = from_block;
    let mut range = initial_range;

    while start <= to_block {
        let end = start.saturating_add(range).min(to_block);
        let filter = LogFilter {
            address,
            topics: topics.to_vec(),
            from_block: start,
            to_block: end,
        };
        match client.get_logs(&filter).await {
            Ok(batch) => {
                logs.extend(batch);
                range = initial_range;
                if end == to_block {
                    break;
                }
                start = end + 1;
            }
            Err(e) if is_node_overflow(&e) => {
                range /= 2;
                if range < WEB3_LOGQUERY_MIN_BLOCK_RANGE {
                    return Err(InquirerError::LogRangeExhausted {
                        address,
                        floor: WEB3_LOGQUERY_MIN_BLOCK_RANGE,
                        block: start,
                    });
                }
                debug!("Node log query overflow at {}, halving window to {}", start, range);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(logs)
}

/// Lấy log qua indexer theo chunk, phân trang theo block cuối cùng và bỏ bản ghi trùng ở biên trang
pub async fn query_indexer_logs(
    indexer: &dyn IndexerClient,
    address: Address,
    topics: &[Option<H256>],
    from_block: u64,
    to_block: u64,
) -> InquirerResult<Vec<LogEntry>> {
    let mut logs = Vec::new();
    let mut seen: HashSet<(u64, u64, H256)> = HashSet::new();
    let mut start = from_block;
    let mut step = INDEXER_LOGQUERY_BLOCK_STEP;

    while start <= to_block {
        let end = start.saturating_add(step).min(to_block);
        let batch = match indexer.get_logs(address, topics, start, end).await {
            Ok(batch) => batch,
            Err(e) if is_indexer_overflow(&e) => {
                step /= 2;
                if step < INDEXER_LOGQUERY_MIN_BLOCK_STEP {
                    return Err(InquirerError::LogRangeExhausted {
                        address,
                        floor: INDEXER_LOGQUERY_MIN_BLOCK_STEP,
                        block: start,
                    });
                }
                debug!("Indexer log query overflow at {}, halving step to {}", start, step);
                continue;
            }
            Err(e) => return Err(e),
        };

        let full_page = batch.len() >= INDEXER_LOGS_PAGE_LIMIT;
        let last_block = batch.last().map(|log| log.block_number);
        for log in batch {
            if seen.insert(log.identity()) {
                logs.push(log);
            }
        }

        match (full_page, last_block) {
            (true, Some(last)) if last > start => {
                // còn log trong khoảng này, đọc tiếp từ block cuối cùng
                start = last;
            }
            (true, Some(last)) => {
                return Err(InquirerError::LogPageOverflow {
                    address,
                    block: last,
                    limit: INDEXER_LOGS_PAGE_LIMIT,
                });
            }
            _ => {
                if end == to_block {
                    break;
                }
                start = end + 1;
            }
        }
    }
    Ok(logs)
}

/// Sắp theo (block, log index) và bỏ bản ghi trùng
pub fn normalize_logs(mut logs: Vec<LogEntry>) -> Vec<LogEntry> {
    logs.sort_by_key(|log| (log.block_number, log.log_index));
    let mut seen = HashSet::new();
    logs.retain(|log| seen.insert(log.identity()));
    logs
}

/// Truy vấn log qua vòng lặp thử node
#[derive(Clone)]
pub struct LogQueryEngine {
    orchestrator: QueryOrchestrator,
    hooks: Arc<dyn ChainHooks>,
}

impl LogQueryEngine {
    pub fn new(orchestrator: QueryOrchestrator, hooks: Arc<dyn ChainHooks>) -> Self {
        Self { orchestrator, hooks }
    }

    async fn logs_from_backend(
        &self,
        backend: Backend,
        address: Address,
        topics: &[Option<H256>],
        from_block: u64,
        to_block: BlockTarget,
    ) -> InquirerResult<Vec<LogEntry>> {
        let to_block = match to_block {
            BlockTarget::Number(number) => number,
            BlockTarget::Latest => backend.latest_block_number().await?,
        };
        match backend {
            Backend::Node(connection) => {
                let range = self.hooks.logquery_block_range(address);
                query_node_logs(connection.client.as_ref(), address, topics, from_block, to_block, range).await
            }
            Backend::Indexer(indexer) => {
                query_indexer_logs(indexer.as_ref(), address, topics, from_block, to_block).await
            }
        }
    }

    /// Log của `event_name` trên `contract` trong `[from_block, to_block]`, tăng dần
    pub async fn get_logs(
        &self,
        contract: &EvmContract,
        event_name: &str,
        argument_filters: &[Option<Token>],
        from_block: u64,
        to_block: BlockTarget,
        call_order: &[WeightedNode],
    ) -> InquirerResult<Vec<LogEntry>> {
        let event = contract.event(event_name)?;
        let topics = event_topics(event, argument_filters)?;
        let address = contract.address;

        let logs = self
            .orchestrator
            .query_value(QueryMethod::Logs, call_order, |backend| {
                let topics = topics.clone();
                async move {
                    self.logs_from_backend(backend, address, &topics, from_block, to_block)
                        .await
                }
            })
            .await?;
        Ok(normalize_logs(logs))
    }
}
