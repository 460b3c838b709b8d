// Third party imports
use dashmap::DashMap;

// Internal imports
use crate::types::{ChainId, WeightedNode};

/// Nguồn cấu hình RPC node, được đọc lại mỗi lần dựng thứ tự gọi
pub trait NodeRegistry: Send + Sync {
    /// Danh sách node của chain, sắp theo tên
    fn get_rpc_nodes(&self, chain: ChainId, only_active: bool) -> Vec<WeightedNode>;

    /// Số tài khoản đang theo dõi trên chain
    fn tracked_accounts(&self, chain: ChainId) -> usize;
}

/// Registry trong bộ nhớ, nạp từ cấu hình
#[derive(Debug, Default)]
pub struct StaticNodeRegistry {
    nodes: DashMap<(ChainId, String), WeightedNode>,
    tracked: DashMap<ChainId, usize>,
}

impl StaticNodeRegistry {
    pub fn new(nodes: impl IntoIterator<Item = WeightedNode>) -> Self {
        let registry = Self::default();
        for node in nodes {
            registry.upsert(node);
        }
        registry
    }

    /// Thêm hoặc thay thế node cùng tên
    pub fn upsert(&self, node: WeightedNode) {
        let key = (node.node_info.blockchain, node.node_info.name.clone());
        self.nodes.insert(key, node);
    }

    /// Bật tắt node, trả về `false` nếu không có node này
    pub fn set_active(&self, chain: ChainId, name: &str, active: bool) -> bool {
        match self.nodes.get_mut(&(chain, name.to_string())) {
            Some(mut node) => {
                node.active = active;
                true
            }
            None => false,
        }
    }

    pub fn set_tracked_accounts(&self, chain: ChainId, count: usize) {
        self.tracked.insert(chain, count);
    }
}

impl NodeRegistry for StaticNodeRegistry {
    fn get_rpc_nodes(&self, chain: ChainId, only_active: bool) -> Vec<WeightedNode> {
        let mut nodes: Vec<WeightedNode> = self
            .nodes
            .iter()
            .filter(|entry| entry.key().0 == chain)
            .filter(|entry| !only_active || entry.value().active)
            .map(|entry| entry.value().clone())
            .collect();
        nodes.sort_by(|a, b| a.node_info.name.cmp(&b.node_info.name));
        nodes
    }

    fn tracked_accounts(&self, chain: ChainId) -> usize {
        self.tracked.get(&chain).map_or(0, |count| *count)
    }
}
