// Standard library imports
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

// Third party imports
use async_trait::async_trait;
use ethers::abi::{encode, Token};
use ethers::types::{Address, Bytes, H256, U256};
use rand::{rngs::StdRng, SeedableRng};

// Internal imports
use crate::abi::AbiRegistry;
use crate::client::{NodeClient, NodeConnector};
use crate::config::{ArchiveFixture, InquirerSettings};
use crate::connection::LiveConnection;
use crate::error::{InquirerError, InquirerResult};
use crate::etherscan::IndexerClient;
use crate::hooks::ChainHooks;
use crate::inquirer::{EvmNodeInquirer, InquirerDeps};
use crate::registry::StaticNodeRegistry;
use crate::types::{
    BlockInfo, BlockTarget, CanonicalReceipt, ChainId, Closest, LogEntry, LogFilter, NodeName,
    RawTransaction, WeightedNode,
};

pub type CallHandler = Arc<dyn Fn(Address, &[u8]) -> InquirerResult<Bytes> + Send + Sync>;
pub type ErrorFactory = Arc<dyn Fn() -> InquirerError + Send + Sync>;

/// Ép closure về `CallHandler`
pub fn call_handler<F>(handler: F) -> CallHandler
where
    F: Fn(Address, &[u8]) -> InquirerResult<Bytes> + Send + Sync + 'static,
{
    Arc::new(handler)
}

pub fn transport_error() -> ErrorFactory {
    Arc::new(|| InquirerError::Transport("connection reset".into()))
}

pub fn weighted(name: &str, owned: bool, weight: f64) -> WeightedNode {
    WeightedNode::new(
        NodeName::new(name, format!("http://{}.example.org", name), owned, ChainId::Ethereum),
        weight,
        true,
    )
}

pub fn indexer_node() -> WeightedNode {
    WeightedNode::new(NodeName::new("etherscan", "", false, ChainId::Ethereum), 0.3, true)
}

pub fn make_log(block_number: u64, log_index: u64) -> LogEntry {
    LogEntry {
        address: Address::repeat_byte(0x11),
        topics: vec![H256::repeat_byte(0x22)],
        data: Bytes::default(),
        block_number,
        block_hash: None,
        transaction_hash: H256::from_low_u64_be(block_number * 1000 + log_index),
        transaction_index: 0,
        log_index,
        timestamp: None,
        gas_price: None,
        gas_used: None,
    }
}

pub fn make_receipt(hash: H256, block_number: u64) -> CanonicalReceipt {
    CanonicalReceipt {
        tx_hash: hash,
        block_number,
        transaction_index: 3,
        status: 1,
        cumulative_gas_used: U256::from(100_000u64),
        gas_used: U256::from(21_000u64),
        contract_address: None,
        logs: Vec::new(),
    }
}

pub fn make_transaction(hash: H256, block_number: u64) -> RawTransaction {
    RawTransaction {
        hash,
        block_number: Some(block_number),
        from: Address::repeat_byte(0x01),
        to: Some(Address::repeat_byte(0x02)),
        value: U256::from(1_000u64),
        gas: U256::from(50_000u64),
        gas_price: U256::from(7u64),
        input: Bytes::default(),
        nonce: 5,
    }
}

pub fn make_block(number: u64) -> BlockInfo {
    BlockInfo {
        number,
        hash: H256::from_low_u64_be(number),
        parent_hash: H256::from_low_u64_be(number.saturating_sub(1)),
        timestamp: 1_600_000_000 + number,
        miner: Address::zero(),
        gas_limit: U256::from(30_000_000u64),
        gas_used: U256::zero(),
        transactions: Vec::new(),
    }
}

/// RPC node giả, đếm số lần bị gọi
pub struct FakeNode {
    pub name: String,
    pub network_id: u64,
    pub block_number: u64,
    pub calls: AtomicUsize,
    pub failure: Option<ErrorFactory>,
    pub version_fails: bool,
    pub balances: HashMap<(Address, Option<u64>), U256>,
    pub transactions: HashMap<H256, RawTransaction>,
    pub receipts: HashMap<H256, CanonicalReceipt>,
    pub logs: Vec<LogEntry>,
    /// Khoảng block lớn hơn giá trị này bị từ chối với "query timeout exceeded"
    pub max_log_range: Option<u64>,
    pub log_queries: Mutex<Vec<(u64, u64)>>,
    pub call_handler: Option<CallHandler>,
}

impl FakeNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            network_id: 1,
            block_number: 17_000_000,
            calls: AtomicUsize::new(0),
            failure: None,
            version_fails: false,
            balances: HashMap::new(),
            transactions: HashMap::new(),
            receipts: HashMap::new(),
            logs: Vec::new(),
            max_log_range: None,
            log_queries: Mutex::new(Vec::new()),
            call_handler: None,
        }
    }

    pub fn failing(mut self, failure: ErrorFactory) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InquirerResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(factory) => Err(factory()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NodeClient for FakeNode {
    async fn client_version(&self) -> InquirerResult<String> {
        if self.version_fails {
            return Err(InquirerError::Transport("connection refused".into()));
        }
        Ok("Geth/v1.13.0".to_string())
    }

    async fn network_id(&self) -> InquirerResult<u64> {
        Ok(self.network_id)
    }

    async fn block_number(&self) -> InquirerResult<u64> {
        self.enter()?;
        Ok(self.block_number)
    }

    async fn get_balance(&self, account: Address, block: Option<u64>) -> InquirerResult<U256> {
        self.enter()?;
        self.balances
            .get(&(account, block))
            .copied()
            .ok_or_else(|| InquirerError::Rpc { code: -32000, message: "missing trie node".into() })
    }

    async fn get_block(&self, target: BlockTarget) -> InquirerResult<BlockInfo> {
        self.enter()?;
        Ok(match target {
            BlockTarget::Number(number) => make_block(number),
            BlockTarget::Latest => make_block(self.block_number),
        })
    }

    async fn get_code(&self, _account: Address) -> InquirerResult<Bytes> {
        self.enter()?;
        Ok(Bytes::from(vec![0x60, 0x80]))
    }

    async fn get_transaction(&self, hash: H256) -> InquirerResult<Option<RawTransaction>> {
        self.enter()?;
        Ok(self.transactions.get(&hash).cloned())
    }

    async fn get_transaction_receipt(&self, hash: H256) -> InquirerResult<Option<CanonicalReceipt>> {
        self.enter()?;
        Ok(self.receipts.get(&hash).cloned())
    }

    async fn get_logs(&self, filter: &LogFilter) -> InquirerResult<Vec<LogEntry>> {
        self.enter()?;
        self.log_queries
            .lock()
            .unwrap()
            .push((filter.from_block, filter.to_block));
        if let Some(max) = self.max_log_range {
            if filter.to_block - filter.from_block > max {
                return Err(InquirerError::Rpc {
                    code: -32005,
                    message: "query timeout exceeded".into(),
                });
            }
        }
        Ok(self
            .logs
            .iter()
            .filter(|log| log.block_number >= filter.from_block && log.block_number <= filter.to_block)
            .cloned()
            .collect())
    }

    async fn call(&self, to: Address, data: Bytes, _block: Option<u64>) -> InquirerResult<Bytes> {
        self.enter()?;
        match &self.call_handler {
            Some(handler) => handler(to, &data),
            None => Err(InquirerError::Rpc { code: 3, message: "execution reverted".into() }),
        }
    }
}

/// Indexer giả với giới hạn trang 1000 log
pub struct FakeIndexer {
    pub latest_block: u64,
    pub calls: AtomicUsize,
    pub failure: Option<ErrorFactory>,
    pub logs: Vec<LogEntry>,
    pub page_limit: usize,
    /// Khoảng block lớn hơn giá trị này bị từ chối với "Please select a smaller result dataset"
    pub max_log_range: Option<u64>,
    pub log_queries: Mutex<Vec<(u64, u64)>>,
    pub transactions: HashMap<H256, RawTransaction>,
    pub receipts: HashMap<H256, CanonicalReceipt>,
    pub creation_hashes: HashMap<Address, H256>,
    pub call_handler: Option<CallHandler>,
}

impl FakeIndexer {
    pub fn new() -> Self {
        Self {
            latest_block: 17_000_010,
            calls: AtomicUsize::new(0),
            failure: None,
            logs: Vec::new(),
            page_limit: 1000,
            max_log_range: None,
            log_queries: Mutex::new(Vec::new()),
            transactions: HashMap::new(),
            receipts: HashMap::new(),
            creation_hashes: HashMap::new(),
            call_handler: None,
        }
    }

    pub fn failing(mut self, failure: ErrorFactory) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InquirerResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(factory) => Err(factory()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IndexerClient for FakeIndexer {
    async fn get_latest_block_number(&self) -> InquirerResult<u64> {
        self.enter()?;
        Ok(self.latest_block)
    }

    async fn get_block_by_number(&self, number: u64) -> InquirerResult<BlockInfo> {
        self.enter()?;
        Ok(make_block(number))
    }

    async fn get_code(&self, _account: Address) -> InquirerResult<Bytes> {
        self.enter()?;
        Ok(Bytes::default())
    }

    async fn get_balance(&self, _account: Address) -> InquirerResult<U256> {
        self.enter()?;
        Ok(U256::from(42u64))
    }

    async fn eth_call(&self, to: Address, data: Bytes) -> InquirerResult<Bytes> {
        self.enter()?;
        match &self.call_handler {
            Some(handler) => handler(to, &data),
            None => Ok(Bytes::default()),
        }
    }

    async fn get_transaction_by_hash(&self, hash: H256) -> InquirerResult<Option<RawTransaction>> {
        self.enter()?;
        Ok(self.transactions.get(&hash).cloned())
    }

    async fn get_transaction_receipt(&self, hash: H256) -> InquirerResult<Option<CanonicalReceipt>> {
        self.enter()?;
        Ok(self.receipts.get(&hash).cloned())
    }

    async fn get_logs(
        &self,
        _address: Address,
        _topics: &[Option<H256>],
        from_block: u64,
        to_block: u64,
    ) -> InquirerResult<Vec<LogEntry>> {
        self.enter()?;
        self.log_queries.lock().unwrap().push((from_block, to_block));
        if let Some(max) = self.max_log_range {
            if to_block - from_block > max {
                return Err(InquirerError::Remote(
                    "Indexer returned error response: {\"status\":\"0\",\"message\":\"NOTOK\",\"result\":\"Please select a smaller result dataset\"}".into(),
                ));
            }
        }
        let mut matching: Vec<LogEntry> = self
            .logs
            .iter()
            .filter(|log| log.block_number >= from_block && log.block_number <= to_block)
            .cloned()
            .collect();
        matching.sort_by_key(|log| (log.block_number, log.log_index));
        matching.truncate(self.page_limit);
        Ok(matching)
    }

    async fn get_blocknumber_by_time(&self, timestamp: u64, _closest: Closest) -> InquirerResult<u64> {
        self.enter()?;
        Ok(timestamp / 12)
    }

    async fn get_contract_creation_hash(&self, address: Address) -> InquirerResult<Option<H256>> {
        self.enter()?;
        Ok(self.creation_hashes.get(&address).copied())
    }
}

/// Connector trả về node giả theo tên
#[derive(Default)]
pub struct FakeConnector {
    pub nodes: HashMap<String, Arc<FakeNode>>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn with_nodes(nodes: Vec<Arc<FakeNode>>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.name.clone(), n)).collect(),
            connects: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NodeConnector for FakeConnector {
    async fn connect(&self, node: &NodeName, _chain: ChainId) -> InquirerResult<Arc<dyn NodeClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        // nhường để các task kết nối khác kịp chạy song song
        tokio::task::yield_now().await;
        match self.nodes.get(&node.name) {
            Some(fake) => Ok(Arc::clone(fake) as Arc<dyn NodeClient>),
            None => Err(InquirerError::Transport(format!("cannot reach {}", node.endpoint))),
        }
    }
}

/// Hook cố định
pub struct FixedHooks {
    pub highest_block: InquirerResult<u64>,
    pub archive: Option<ArchiveFixture>,
    pub pruned: Option<H256>,
    pub block_range: u64,
}

impl FixedHooks {
    pub fn new(highest_block: u64) -> Self {
        Self {
            highest_block: Ok(highest_block),
            archive: None,
            pruned: None,
            block_range: 250_000,
        }
    }
}

#[async_trait]
impl ChainHooks for FixedHooks {
    async fn query_highest_block(&self) -> InquirerResult<u64> {
        match &self.highest_block {
            Ok(number) => Ok(*number),
            Err(e) => Err(InquirerError::Remote(e.to_string())),
        }
    }

    async fn get_blocknumber_by_time(&self, timestamp: u64, _closest: Closest) -> InquirerResult<u64> {
        Ok(timestamp / 12)
    }

    fn archive_check_data(&self) -> Option<ArchiveFixture> {
        self.archive.clone()
    }

    fn pruned_check_tx_hash(&self) -> Option<H256> {
        self.pruned
    }

    fn logquery_block_range(&self, _contract: Address) -> u64 {
        self.block_range
    }
}

/// Một bộ truy vấn dựng trên các thành phần giả
pub struct Harness {
    pub inquirer: EvmNodeInquirer,
    pub indexer: Arc<FakeIndexer>,
    pub registry: Arc<StaticNodeRegistry>,
    pub connector: Arc<FakeConnector>,
}

impl Harness {
    pub fn new(
        settings: InquirerSettings,
        registry_nodes: Vec<WeightedNode>,
        connector: FakeConnector,
        indexer: FakeIndexer,
        hooks: Arc<dyn ChainHooks>,
    ) -> Self {
        let indexer = Arc::new(indexer);
        let registry = Arc::new(StaticNodeRegistry::new(registry_nodes));
        let connector = Arc::new(connector);
        let deps = InquirerDeps {
            connector: Arc::clone(&connector) as Arc<dyn NodeConnector>,
            indexer: Arc::clone(&indexer) as Arc<dyn IndexerClient>,
            hooks,
            registry: Arc::clone(&registry) as Arc<dyn crate::registry::NodeRegistry>,
        };
        let inquirer = EvmNodeInquirer::new(&settings, deps)
            .unwrap()
            .with_rng(StdRng::seed_from_u64(42));
        Self { inquirer, indexer, registry, connector }
    }

    /// Bộ truy vấn mặc định với indexer cho trước và không có node nào
    pub fn with_indexer(indexer: FakeIndexer) -> Self {
        Self::new(
            InquirerSettings::for_chain(ChainId::Ethereum),
            Vec::new(),
            FakeConnector::default(),
            indexer,
            Arc::new(FixedHooks::new(17_000_000)),
        )
    }

    /// Cài trực tiếp một kết nối sống
    pub fn install(&self, node: &Arc<FakeNode>, owned: bool, is_pruned: bool) -> WeightedNode {
        let weighted = weighted(&node.name, owned, 0.5);
        self.inquirer.connections().install_connection(LiveConnection {
            node: weighted.node_info.clone(),
            client: Arc::clone(node) as Arc<dyn NodeClient>,
            is_archive: true,
            is_pruned,
        });
        weighted
    }
}

/// Handler hiểu `aggregate` và `tryAggregate`, chuyển từng lời gọi con cho `inner`.
/// `inner` trả `None` nghĩa là lời gọi con thất bại.
pub fn multicall_handler<F>(aggregate_calls: Arc<AtomicUsize>, inner: F) -> CallHandler
where
    F: Fn(Address, &[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
{
    let registry = AbiRegistry::load().unwrap();
    let aggregate = registry.multicall.function("aggregate").unwrap().clone();
    let try_aggregate = registry.multicall.function("tryAggregate").unwrap().clone();

    call_handler(move |to: Address, data: &[u8]| {
        let selector = &data[..4];
        let sub_calls = |tokens: Token| -> Vec<(Address, Vec<u8>)> {
            match tokens {
                Token::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Token::Tuple(fields) => match (fields[0].clone(), fields[1].clone()) {
                            (Token::Address(a), Token::Bytes(b)) => (a, b),
                            _ => panic!("bad call tuple"),
                        },
                        _ => panic!("bad call"),
                    })
                    .collect(),
                _ => panic!("bad calls"),
            }
        };

        if selector == aggregate.short_signature() {
            aggregate_calls.fetch_add(1, Ordering::SeqCst);
            let args = aggregate.decode_input(&data[4..]).unwrap();
            let mut results = Vec::new();
            for (target, call) in sub_calls(args[0].clone()) {
                match inner(target, &call) {
                    Some(output) => results.push(Token::Bytes(output)),
                    None => {
                        return Err(InquirerError::Rpc { code: 3, message: "execution reverted".into() })
                    }
                }
            }
            Ok(Bytes::from(encode(&[Token::Uint(U256::from(17_000_000u64)), Token::Array(results)])))
        } else if selector == try_aggregate.short_signature() {
            aggregate_calls.fetch_add(1, Ordering::SeqCst);
            let args = try_aggregate.decode_input(&data[4..]).unwrap();
            let require_success = matches!(args[0], Token::Bool(true));
            let mut results = Vec::new();
            for (target, call) in sub_calls(args[1].clone()) {
                match inner(target, &call) {
                    Some(output) => results.push(Token::Tuple(vec![Token::Bool(true), Token::Bytes(output)])),
                    None if require_success => {
                        return Err(InquirerError::Rpc { code: 3, message: "execution reverted".into() })
                    }
                    None => results.push(Token::Tuple(vec![Token::Bool(false), Token::Bytes(Vec::new())])),
                }
            }
            Ok(Bytes::from(encode(&[Token::Array(results)])))
        } else {
            inner(to, data)
                .map(Bytes::from)
                .ok_or_else(|| InquirerError::Rpc { code: 3, message: "execution reverted".into() })
        }
    })
}
