// Standard library imports
use std::{collections::HashMap, sync::Arc};

// Third party imports
use ethers::abi::Token;
use futures::future::try_join_all;
use ethers::types::{Address, Bytes, H256, U256};
use rand::rngs::StdRng;
use tracing::{debug, info};

// Internal imports
use crate::abi::{AbiRegistry, EvmContract};
use crate::call_order::CallOrderPolicy;
use crate::client::{HttpNodeConnector, NodeConnector};
use crate::config::InquirerSettings;
use crate::connection::{ConnectOutcome, ConnectionManager};
use crate::constants::{genesis_receipt, GENESIS_HASH};
use crate::contract_info::ContractInfoResolver;
use crate::error::{InquirerError, InquirerResult};
use crate::etherscan::{Etherscan, IndexerClient};
use crate::hooks::{ChainHooks, IndexerChainHooks};
use crate::logs::LogQueryEngine;
use crate::multicall::{ContractCall, MulticallBatcher};
use crate::query::{QueryMethod, QueryOrchestrator};
use crate::registry::{NodeRegistry, StaticNodeRegistry};
use crate::types::{
    BlockInfo, BlockTarget, CanonicalReceipt, CanonicalTransaction, ChainId, Closest, Erc20Info,
    Erc721Info, LogEntry, NodeName, WeightedNode,
};

/// Các cộng tác viên bên ngoài của bộ truy vấn
pub struct InquirerDeps {
    pub connector: Arc<dyn NodeConnector>,
    pub indexer: Arc<dyn IndexerClient>,
    pub hooks: Arc<dyn ChainHooks>,
    pub registry: Arc<dyn NodeRegistry>,
}

/// Bộ truy vấn dữ liệu EVM đa nguồn cho một chain
pub struct EvmNodeInquirer {
    chain: ChainId,
    connections: ConnectionManager,
    policy: CallOrderPolicy,
    orchestrator: QueryOrchestrator,
    logs: LogQueryEngine,
    multicall: MulticallBatcher,
    contract_info: ContractInfoResolver,
    abis: Arc<AbiRegistry>,
    balance_scanner: Option<EvmContract>,
    hooks: Arc<dyn ChainHooks>,
}

impl EvmNodeInquirer {
    /// Tạo bộ truy vấn với các cộng tác viên cho trước
    pub fn new(settings: &InquirerSettings, deps: InquirerDeps) -> InquirerResult<Self> {
        settings.validate()?;
        let chain = settings.chain;
        let indexer_name = settings.indexer.node_name.as_str();
        let abis = Arc::new(AbiRegistry::load()?);

        let connections = ConnectionManager::new(
            chain,
            deps.connector,
            Arc::clone(&deps.hooks),
            deps.registry,
            settings.capability_overrides.clone(),
            indexer_name,
        );
        let orchestrator = QueryOrchestrator::new(connections.clone(), deps.indexer, indexer_name);
        let multicall_contract = EvmContract::new(settings.multicall_address()?, Arc::clone(&abis.multicall));
        let multicall = MulticallBatcher::new(
            orchestrator.clone(),
            multicall_contract,
            settings.multicall_chunk_size,
        );
        let balance_scanner = settings
            .balance_scanner_address()?
            .map(|address| EvmContract::new(address, Arc::clone(&abis.balance_scanner)));

        Ok(Self {
            chain,
            policy: CallOrderPolicy::new(settings.indexer.weighted_node(chain)),
            logs: LogQueryEngine::new(orchestrator.clone(), Arc::clone(&deps.hooks)),
            contract_info: ContractInfoResolver::new(multicall.clone(), Arc::clone(&abis)),
            connections,
            orchestrator,
            multicall,
            abis,
            balance_scanner,
            hooks: deps.hooks,
        })
    }

    /// Tạo bộ truy vấn thật: HTTP node, indexer etherscan, registry từ cấu hình
    pub fn from_settings(settings: &InquirerSettings) -> InquirerResult<Self> {
        let indexer: Arc<dyn IndexerClient> = Arc::new(Etherscan::new(settings.chain, &settings.indexer)?);
        let hooks: Arc<dyn ChainHooks> = Arc::new(IndexerChainHooks::from_settings(settings, Arc::clone(&indexer)));
        let deps = InquirerDeps {
            connector: Arc::new(HttpNodeConnector::new(settings.rpc_timeout())),
            indexer,
            hooks,
            registry: Arc::new(StaticNodeRegistry::new(settings.nodes.clone())),
        };
        Self::new(settings, deps)
    }

    /// RNG cố định cho thứ tự gọi
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.policy = self.policy.with_rng(rng);
        self
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn abis(&self) -> &AbiRegistry {
        &self.abis
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    fn order(&self, call_order: Option<&[WeightedNode]>) -> Vec<WeightedNode> {
        match call_order {
            Some(order) => order.to_vec(),
            None => self.default_call_order(false),
        }
    }

    // -- connection management --

    pub fn default_call_order(&self, skip_indexer: bool) -> Vec<WeightedNode> {
        self.policy.default_call_order(&self.connections, skip_indexer)
    }

    pub async fn attempt_connect(&self, node: &NodeName, connectivity_check: bool) -> ConnectOutcome {
        self.connections.attempt_connect(node, connectivity_check).await
    }

    pub fn connect_to_multiple_nodes(&self, nodes: &[WeightedNode]) {
        self.connections.connect_to_multiple_nodes(nodes)
    }

    pub fn maybe_connect_to_nodes(&self, when_tracked_accounts: bool) {
        self.connections.maybe_connect_to_nodes(when_tracked_accounts)
    }

    pub async fn wait_for_pending_connections(&self) {
        self.connections.wait_for_pending_connections().await
    }

    pub fn connected_to_any_node(&self) -> bool {
        self.connections.connected_to_any_node()
    }

    pub fn get_own_node_info(&self) -> Option<NodeName> {
        self.connections.get_own_node_info()
    }

    pub fn get_connected_nodes(&self) -> Vec<NodeName> {
        self.connections.get_connected_nodes()
    }

    // -- basic queries --

    pub async fn get_latest_block_number(&self, call_order: Option<&[WeightedNode]>) -> InquirerResult<u64> {
        let order = self.order(call_order);
        self.orchestrator
            .query_value(QueryMethod::LatestBlockNumber, &order, |backend| async move {
                backend.latest_block_number().await
            })
            .await
    }

    pub async fn get_block_by_number(
        &self,
        target: BlockTarget,
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<BlockInfo> {
        let order = self.order(call_order);
        self.orchestrator
            .query_value(QueryMethod::BlockByNumber, &order, |backend| async move {
                backend.get_block(target).await
            })
            .await
    }

    pub async fn get_code(&self, account: Address, call_order: Option<&[WeightedNode]>) -> InquirerResult<Bytes> {
        let order = self.order(call_order);
        self.orchestrator
            .query_value(QueryMethod::Code, &order, |backend| async move { backend.get_code(account).await })
            .await
    }

    /// Số dư native, `block = None` là block mới nhất
    pub async fn get_balance(
        &self,
        account: Address,
        block: Option<u64>,
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<U256> {
        let order = self.order(call_order);
        self.orchestrator
            .query_value(QueryMethod::Balance, &order, |backend| async move {
                backend.get_balance(account, block).await
            })
            .await
    }

    /// Số dư của nhiều tài khoản, qua balance scanner nếu chain có
    pub async fn get_multi_balance(
        &self,
        accounts: &[Address],
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<HashMap<Address, U256>> {
        let order = self.order(call_order);
        let Some(scanner) = &self.balance_scanner else {
            let order = order.as_slice();
            let balances = try_join_all(accounts.iter().map(|account| async move {
                let balance = self.get_balance(*account, None, Some(order)).await?;
                Ok::<_, InquirerError>((*account, balance))
            }))
            .await?;
            return Ok(balances.into_iter().collect());
        };

        let argument = Token::Array(accounts.iter().map(|a| Token::Address(*a)).collect());
        let output = self
            .call_contract_in(QueryMethod::MultiBalance, scanner, "etherBalances", &[argument], &order, None)
            .await?;
        let values = match output.into_iter().next() {
            Some(Token::Array(values)) => values,
            _ => return Err(InquirerError::AbiDecode("unexpected etherBalances output".into())),
        };
        if values.len() != accounts.len() {
            return Err(InquirerError::AbiDecode(format!(
                "etherBalances returned {} values for {} accounts",
                values.len(),
                accounts.len()
            )));
        }
        accounts
            .iter()
            .zip(values)
            .map(|(account, value)| match value {
                Token::Uint(balance) => Ok((*account, balance)),
                other => Err(InquirerError::AbiDecode(format!("unexpected balance token {:?}", other))),
            })
            .collect()
    }

    /// Số dư tại block cũ qua node riêng, mọi lỗi trả về `None`
    pub async fn get_historical_balance(&self, account: Address, block: u64) -> Option<U256> {
        self.connections.get_historical_balance(account, block, None).await
    }

    async fn call_contract_in(
        &self,
        method: QueryMethod,
        contract: &EvmContract,
        function: &str,
        args: &[Token],
        call_order: &[WeightedNode],
        block: Option<u64>,
    ) -> InquirerResult<Vec<Token>> {
        let data = contract.encode(function, args)?;
        self.orchestrator
            .query_value(method, call_order, |backend| {
                let data = data.clone();
                async move {
                    let raw = backend.call(contract.address, data, block).await?;
                    contract.decode(function, &raw)
                }
            })
            .await
    }

    /// Gọi một hàm view của contract và decode kết quả
    pub async fn call_contract(
        &self,
        contract: &EvmContract,
        function: &str,
        args: &[Token],
        call_order: Option<&[WeightedNode]>,
        block: Option<u64>,
    ) -> InquirerResult<Vec<Token>> {
        let order = self.order(call_order);
        self.call_contract_in(QueryMethod::CallContract, contract, function, args, &order, block)
            .await
    }

    // -- transactions --

    /// Receipt nếu có, `None` nếu transaction không tồn tại
    pub async fn maybe_get_transaction_receipt(
        &self,
        tx_hash: H256,
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<Option<CanonicalReceipt>> {
        self.transaction_receipt(tx_hash, call_order, false).await
    }

    /// Receipt bắt buộc phải tồn tại
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<CanonicalReceipt> {
        self.transaction_receipt(tx_hash, call_order, true)
            .await?
            .ok_or(InquirerError::TransactionNotFound(tx_hash))
    }

    async fn transaction_receipt(
        &self,
        tx_hash: H256,
        call_order: Option<&[WeightedNode]>,
        must_exist: bool,
    ) -> InquirerResult<Option<CanonicalReceipt>> {
        if tx_hash == GENESIS_HASH {
            return Ok(Some(genesis_receipt()));
        }
        let order = self.order(call_order);
        self.orchestrator
            .query(QueryMethod::TransactionReceipt, &order, must_exist, |backend| async move {
                backend
                    .get_transaction_receipt(tx_hash)
                    .await?
                    .ok_or(InquirerError::TransactionNotFound(tx_hash))
            })
            .await
    }

    /// Transaction chuẩn hóa cùng receipt, `None` nếu không tồn tại
    pub async fn maybe_get_transaction_by_hash(
        &self,
        tx_hash: H256,
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<Option<(CanonicalTransaction, CanonicalReceipt)>> {
        self.transaction_by_hash(tx_hash, call_order, false).await
    }

    /// Transaction bắt buộc phải tồn tại
    pub async fn get_transaction_by_hash(
        &self,
        tx_hash: H256,
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<(CanonicalTransaction, CanonicalReceipt)> {
        self.transaction_by_hash(tx_hash, call_order, true)
            .await?
            .ok_or(InquirerError::TransactionNotFound(tx_hash))
    }

    async fn transaction_by_hash(
        &self,
        tx_hash: H256,
        call_order: Option<&[WeightedNode]>,
        must_exist: bool,
    ) -> InquirerResult<Option<(CanonicalTransaction, CanonicalReceipt)>> {
        let order = self.order(call_order);
        let raw = self
            .orchestrator
            .query(QueryMethod::TransactionByHash, &order, must_exist, |backend| async move {
                backend
                    .get_transaction(tx_hash)
                    .await?
                    .ok_or(InquirerError::TransactionNotFound(tx_hash))
            })
            .await?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let receipt = self.get_transaction_receipt(tx_hash, Some(&order)).await?;
        let block = self
            .get_block_by_number(BlockTarget::Number(receipt.block_number), Some(&order))
            .await?;
        let transaction = CanonicalTransaction {
            tx_hash,
            chain_id: self.chain,
            timestamp: block.timestamp,
            block_number: receipt.block_number,
            from_address: raw.from,
            to_address: raw.to,
            value: raw.value,
            gas: raw.gas,
            gas_price: raw.gas_price,
            gas_used: receipt.gas_used,
            input_data: raw.input,
            nonce: raw.nonce,
        };
        Ok(Some((transaction, receipt)))
    }

    // -- logs --

    /// Log của event trên contract. Thứ tự mặc định: node riêng rồi indexer.
    pub async fn get_logs(
        &self,
        contract: &EvmContract,
        event_name: &str,
        argument_filters: &[Option<Token>],
        from_block: u64,
        to_block: BlockTarget,
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<Vec<LogEntry>> {
        let order = match call_order {
            Some(order) => order.to_vec(),
            None => self.policy.logs_call_order(&self.connections),
        };
        let logs = self
            .logs
            .get_logs(contract, event_name, argument_filters, from_block, to_block, &order)
            .await?;
        debug!(
            "Got {} {} logs of {:#x} from block {}",
            logs.len(),
            event_name,
            contract.address,
            from_block
        );
        Ok(logs)
    }

    /// Timestamp của log: từ indexer nếu có, không thì từ block
    pub async fn get_event_timestamp(
        &self,
        log: &LogEntry,
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<u64> {
        if let Some(timestamp) = log.timestamp {
            return Ok(timestamp);
        }
        let block = self
            .get_block_by_number(BlockTarget::Number(log.block_number), call_order)
            .await?;
        Ok(block.timestamp)
    }

    // -- multicall --

    pub async fn multicall(
        &self,
        calls: &[ContractCall],
        call_order: Option<&[WeightedNode]>,
        block: Option<u64>,
    ) -> InquirerResult<Vec<Bytes>> {
        let order = self.order(call_order);
        self.multicall.aggregate(calls, &order, block).await
    }

    pub async fn multicall_2(
        &self,
        calls: &[ContractCall],
        require_success: bool,
        call_order: Option<&[WeightedNode]>,
        block: Option<u64>,
    ) -> InquirerResult<Vec<(bool, Bytes)>> {
        let order = self.order(call_order);
        self.multicall
            .try_aggregate(calls, require_success, &order, block)
            .await
    }

    pub async fn multicall_specific(
        &self,
        contract: &EvmContract,
        method: &str,
        arguments: &[Vec<Token>],
        call_order: Option<&[WeightedNode]>,
        block: Option<u64>,
    ) -> InquirerResult<Vec<Vec<Token>>> {
        let order = self.order(call_order);
        self.multicall
            .multicall_specific(contract, method, arguments, &order, block)
            .await
    }

    // -- contract metadata --

    pub async fn get_erc20_contract_info(
        &self,
        address: Address,
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<Erc20Info> {
        let order = self.order(call_order);
        self.contract_info.get_erc20_contract_info(address, &order).await
    }

    pub async fn get_erc721_contract_info(
        &self,
        address: Address,
        call_order: Option<&[WeightedNode]>,
    ) -> InquirerResult<Erc721Info> {
        let order = self.order(call_order);
        self.contract_info.get_erc721_contract_info(address, &order).await
    }

    /// Block triển khai contract, `None` nếu địa chỉ không phải contract
    pub async fn get_contract_deployed_block(&self, address: Address) -> InquirerResult<Option<u64>> {
        let Some(creation_hash) = self
            .orchestrator
            .indexer()
            .get_contract_creation_hash(address)
            .await?
        else {
            return Ok(None);
        };
        let (transaction, _) = self.get_transaction_by_hash(creation_hash, None).await?;
        info!("Contract {:#x} deployed at block {}", address, transaction.block_number);
        Ok(Some(transaction.block_number))
    }

    pub async fn get_blocknumber_by_time(&self, timestamp: u64, closest: Closest) -> InquirerResult<u64> {
        self.hooks.get_blocknumber_by_time(timestamp, closest).await
    }
}
