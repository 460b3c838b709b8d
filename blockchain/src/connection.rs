// Standard library imports
use std::sync::Arc;

// Third party imports
use dashmap::DashMap;
use ethers::types::{Address, U256};
use tracing::{debug, info, warn};
use url::Url;

// Internal imports
use crate::client::{NodeClient, NodeConnector};
use crate::config::CapabilityOverride;
use crate::constants::SYNC_TOLERANCE_BLOCKS;
use crate::hooks::ChainHooks;
use crate::registry::NodeRegistry;
use crate::types::{ChainId, NodeName, WeightedNode};
use nodeweave_common::utils::with_default_scheme;
use nodeweave_common::TaskManager;

/// Một kết nối đang sống tới RPC node cùng năng lực đã xác định
pub struct LiveConnection {
    pub node: NodeName,
    pub client: Arc<dyn NodeClient>,
    pub is_archive: bool,
    pub is_pruned: bool,
}

impl std::fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConnection")
            .field("node", &self.node)
            .field("is_archive", &self.is_archive)
            .field("is_pruned", &self.is_pruned)
            .finish()
    }
}

/// Kết quả một lần thử kết nối
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub connected: bool,
    pub message: String,
}

impl ConnectOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self { connected: true, message: message.into() }
    }

    fn failure(message: String) -> Self {
        Self { connected: false, message }
    }
}

/// Quản lý tập kết nối sống tới các RPC node của một chain
#[derive(Clone)]
pub struct ConnectionManager {
    chain: ChainId,
    connections: Arc<DashMap<String, Arc<LiveConnection>>>,
    tasks: TaskManager,
    connector: Arc<dyn NodeConnector>,
    hooks: Arc<dyn ChainHooks>,
    registry: Arc<dyn NodeRegistry>,
    overrides: Arc<Vec<CapabilityOverride>>,
    indexer_node_name: String,
}

impl ConnectionManager {
    /// Tạo manager mới, chưa có kết nối nào
    pub fn new(
        chain: ChainId,
        connector: Arc<dyn NodeConnector>,
        hooks: Arc<dyn ChainHooks>,
        registry: Arc<dyn NodeRegistry>,
        overrides: Vec<CapabilityOverride>,
        indexer_node_name: &str,
    ) -> Self {
        Self {
            chain,
            connections: Arc::new(DashMap::new()),
            tasks: TaskManager::new(),
            connector,
            hooks,
            registry,
            overrides: Arc::new(overrides),
            indexer_node_name: indexer_node_name.to_string(),
        }
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn registry(&self) -> &Arc<dyn NodeRegistry> {
        &self.registry
    }

    pub fn hooks(&self) -> &Arc<dyn ChainHooks> {
        &self.hooks
    }

    fn task_prefix(&self) -> String {
        format!("Attempt connection to {} node", self.chain)
    }

    /// Tên task kết nối, dùng để chặn các lần thử trùng
    pub fn task_name(&self, node: &NodeName) -> String {
        format!("{} {}", self.task_prefix(), node.name)
    }

    /// Thử kết nối một node. Không bao giờ trả lỗi, thất bại nằm trong `ConnectOutcome`.
    pub async fn attempt_connect(&self, node: &NodeName, connectivity_check: bool) -> ConnectOutcome {
        if self.connections.contains_key(&node.name) {
            return ConnectOutcome::success(format!("Already connected to {}", node));
        }

        let client = match self.connector.connect(node, self.chain).await {
            Ok(client) => client,
            Err(e) => {
                let message = format!(
                    "Failed to connect to {} at endpoint {} due to {}",
                    node, node.endpoint, e
                );
                warn!("{}", message);
                return ConnectOutcome::failure(message);
            }
        };

        if let Err(e) = client.client_version().await {
            let message = format!(
                "Failed to connect to {} at endpoint {} due to {}",
                node, node.endpoint, e
            );
            warn!("{}", message);
            return ConnectOutcome::failure(message);
        }

        if connectivity_check {
            let network_id = match client.network_id().await {
                Ok(id) => id,
                Err(e) => {
                    let message = format!(
                        "Connected to {} at endpoint {} but could not query its network id due to {}",
                        node, node.endpoint, e
                    );
                    warn!("{}", message);
                    return ConnectOutcome::failure(message);
                }
            };
            if network_id != self.chain.id() {
                let message = format!(
                    "Connected to {} at endpoint {} but it specifies chain id {} while {} has {}",
                    node,
                    node.endpoint,
                    network_id,
                    self.chain,
                    self.chain.id()
                );
                warn!("{}", message);
                return ConnectOutcome::failure(message);
            }

            let (synchronized, message) = self.is_synchronized(client.as_ref()).await;
            if !synchronized {
                warn!("{}", message);
            }
        }

        let (is_pruned, is_archive) = match self.capability_override(&node.endpoint) {
            Some(found) => {
                debug!("Dùng năng lực cố định cho {}: pruned={} archive={}", node, found.is_pruned, found.is_archive);
                (found.is_pruned, found.is_archive)
            }
            None => self.determine_capabilities(&client).await,
        };

        self.install_connection(LiveConnection {
            node: node.clone(),
            client,
            is_archive,
            is_pruned,
        });
        info!(
            "Connected {} at {} (archive={}, pruned={})",
            node, node.endpoint, is_archive, is_pruned
        );
        ConnectOutcome::success("")
    }

    /// So sánh độ cao node với đỉnh chuỗi. Chỉ dùng để cảnh báo.
    pub async fn is_synchronized(&self, client: &dyn NodeClient) -> (bool, String) {
        let current_block = match client.block_number().await {
            Ok(number) => number,
            Err(e) => {
                return (false, format!("Could not query current block of {} node: {}", self.chain, e));
            }
        };
        let latest_block = match self.hooks.query_highest_block().await {
            Ok(number) => number,
            Err(e) => {
                return (
                    false,
                    format!("Could not query latest {} block to check node synchronization: {}", self.chain, e),
                );
            }
        };
        if current_block < latest_block.saturating_sub(SYNC_TOLERANCE_BLOCKS) {
            return (
                false,
                format!(
                    "Found {} node but it is out of sync. {} / {}. Will use it anyway",
                    self.chain, current_block, latest_block
                ),
            );
        }
        (true, String::new())
    }

    fn capability_override(&self, endpoint: &str) -> Option<&CapabilityOverride> {
        let url = Url::parse(&with_default_scheme(endpoint)).ok()?;
        let host = url.host_str()?.to_string();
        self.overrides
            .iter()
            .find(|entry| host.ends_with(entry.host_suffix.as_str()))
    }

    /// Trả về (is_pruned, is_archive)
    pub async fn determine_capabilities(&self, client: &Arc<dyn NodeClient>) -> (bool, bool) {
        let is_archive = self.have_archive(client).await;
        let is_pruned = self.is_pruned(client).await;
        (is_pruned, is_archive)
    }

    async fn have_archive(&self, client: &Arc<dyn NodeClient>) -> bool {
        let Some(fixture) = self.hooks.archive_check_data() else {
            return false;
        };
        self.get_historical_balance(fixture.account, fixture.block, Some(client))
            .await
            .map_or(false, |balance| balance == fixture.balance)
    }

    /// Không có transaction mẫu thì không chứng minh được node giữ dữ liệu cũ, coi như pruned
    async fn is_pruned(&self, client: &Arc<dyn NodeClient>) -> bool {
        let Some(tx_hash) = self.hooks.pruned_check_tx_hash() else {
            debug!("No pruned check transaction for {}, treating node as pruned", self.chain);
            return true;
        };
        !matches!(client.get_transaction(tx_hash).await, Ok(Some(_)))
    }

    /// Số dư tại một block cũ qua client cho trước hoặc node riêng. Mọi lỗi trả về `None`.
    pub async fn get_historical_balance(
        &self,
        account: Address,
        block: u64,
        client: Option<&Arc<dyn NodeClient>>,
    ) -> Option<U256> {
        let client = match client {
            Some(client) => Arc::clone(client),
            None => self.get_own_node_client()?,
        };
        match client.get_balance(account, Some(block)).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                debug!("Không lấy được số dư {:#x} tại block {}: {}", account, block, e);
                None
            }
        }
    }

    /// Cài đặt kết nối, thay thế nguyên entry cũ nếu có
    pub fn install_connection(&self, connection: LiveConnection) {
        self.connections
            .insert(connection.node.name.clone(), Arc::new(connection));
    }

    /// Kết nối song song tới các node trong task nền
    pub fn connect_to_multiple_nodes(&self, nodes: &[WeightedNode]) {
        for weighted in nodes {
            let node = weighted.node_info.clone();
            if node.name == self.indexer_node_name {
                continue;
            }
            if self.connections.contains_key(&node.name) {
                debug!("Đã kết nối tới {}, bỏ qua", node);
                continue;
            }
            let manager = self.clone();
            let task_name = self.task_name(&node);
            self.tasks.spawn_and_track(&task_name, async move {
                manager.attempt_connect(&node, true).await;
            });
        }
    }

    /// Kết nối tới các node active nếu chưa có kết nối và số tài khoản theo dõi khớp điều kiện
    pub fn maybe_connect_to_nodes(&self, when_tracked_accounts: bool) {
        if self.connected_to_any_node() || self.tasks.has_task_with_prefix(&self.task_prefix()) {
            return;
        }
        let has_accounts = self.registry.tracked_accounts(self.chain) != 0;
        if has_accounts != when_tracked_accounts {
            return;
        }
        let nodes = self.registry.get_rpc_nodes(self.chain, true);
        self.connect_to_multiple_nodes(&nodes);
    }

    /// Chờ các lần thử kết nối đang chạy
    pub async fn wait_for_pending_connections(&self) {
        self.tasks.join_all().await;
    }

    /// Có lần thử kết nối nào đang chạy
    pub fn has_pending_connections(&self) -> bool {
        self.tasks.has_task_with_prefix(&self.task_prefix())
    }

    pub fn connected_to_any_node(&self) -> bool {
        !self.connections.is_empty()
    }

    pub fn get_connection(&self, name: &str) -> Option<Arc<LiveConnection>> {
        self.connections.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Node riêng đang kết nối, nếu có
    pub fn get_own_node_info(&self) -> Option<NodeName> {
        self.connections
            .iter()
            .find(|entry| entry.value().node.owned)
            .map(|entry| entry.value().node.clone())
    }

    pub fn get_own_node_client(&self) -> Option<Arc<dyn NodeClient>> {
        self.connections
            .iter()
            .find(|entry| entry.value().node.owned)
            .map(|entry| Arc::clone(&entry.value().client))
    }

    /// Danh sách node đang kết nối, sắp theo tên
    pub fn get_connected_nodes(&self) -> Vec<NodeName> {
        let mut nodes: Vec<NodeName> = self
            .connections
            .iter()
            .map(|entry| entry.value().node.clone())
            .collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }

    /// Ngắt kết nối một node
    pub fn disconnect(&self, name: &str) -> bool {
        self.connections.remove(name).is_some()
    }
}
