// Standard library imports
use std::sync::Mutex;

// Third party imports
use rand::{distributions::WeightedIndex, prelude::Distribution, rngs::StdRng, Rng};

// Internal imports
use crate::connection::ConnectionManager;
use crate::types::WeightedNode;

/// Bốc thăm có trọng số, không hoàn lại: node trọng số cao hay đứng trước.
///
/// Khi mọi trọng số còn lại bằng 0 thì bốc đều.
pub fn weighted_order<R: Rng + ?Sized>(mut nodes: Vec<WeightedNode>, rng: &mut R) -> Vec<WeightedNode> {
    let mut ordered = Vec::with_capacity(nodes.len());
    while !nodes.is_empty() {
        let index = match WeightedIndex::new(nodes.iter().map(|n| n.weight.max(0.0))) {
            Ok(distribution) => distribution.sample(rng),
            Err(_) => rng.gen_range(0..nodes.len()),
        };
        ordered.push(nodes.remove(index));
    }
    ordered
}

/// Dựng danh sách ứng viên cho mỗi truy vấn
pub struct CallOrderPolicy {
    indexer_node: WeightedNode,
    rng: Option<Mutex<StdRng>>,
}

impl CallOrderPolicy {
    /// `indexer_node` được thêm vào nếu registry chưa có node cùng tên
    pub fn new(indexer_node: WeightedNode) -> Self {
        Self { indexer_node, rng: None }
    }

    /// Dùng RNG cố định, cho kết quả lặp lại được
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Some(Mutex::new(rng));
        self
    }

    pub fn indexer_node(&self) -> &WeightedNode {
        &self.indexer_node
    }

    fn shuffle(&self, nodes: Vec<WeightedNode>) -> Vec<WeightedNode> {
        match &self.rng {
            Some(rng) => {
                let mut guard = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                weighted_order(nodes, &mut *guard)
            }
            None => weighted_order(nodes, &mut rand::thread_rng()),
        }
    }

    /// Node riêng đang kết nối, trọng số 1, sắp theo tên
    fn owned_connected(&self, connections: &ConnectionManager) -> Vec<WeightedNode> {
        connections
            .get_connected_nodes()
            .into_iter()
            .filter(|node| node.owned)
            .map(|node| WeightedNode::new(node, 1.0, true))
            .collect()
    }

    /// Thứ tự gọi mặc định: node riêng trước, phần còn lại bốc thăm theo trọng số
    pub fn default_call_order(&self, connections: &ConnectionManager, skip_indexer: bool) -> Vec<WeightedNode> {
        let indexer_name = self.indexer_node.node_info.name.as_str();
        let mut candidates: Vec<WeightedNode> = connections
            .registry()
            .get_rpc_nodes(connections.chain(), true)
            .into_iter()
            .filter(|node| !node.node_info.owned)
            .collect();
        let indexer_registered = candidates.iter().any(|node| node.node_info.name == indexer_name);
        if skip_indexer {
            candidates.retain(|node| node.node_info.name != indexer_name);
        } else if !indexer_registered && self.indexer_node.active {
            candidates.push(self.indexer_node.clone());
        }

        let mut order = self.owned_connected(connections);
        order.extend(self.shuffle(candidates));
        order
    }

    /// Thứ tự cho truy vấn log: node riêng trước, rồi indexer
    pub fn logs_call_order(&self, connections: &ConnectionManager) -> Vec<WeightedNode> {
        let mut order = self.owned_connected(connections);
        order.push(self.indexer_node.clone());
        order
    }
}

/// Module tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChainId, NodeName};
    use rand::SeedableRng;

    fn node(name: &str, weight: f64) -> WeightedNode {
        WeightedNode::new(NodeName::new(name, "", false, ChainId::Ethereum), weight, true)
    }

    #[test]
    fn test_weighted_order_is_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let nodes = vec![node("a", 0.1), node("b", 0.0), node("c", 0.9), node("d", 0.0)];
        let ordered = weighted_order(nodes, &mut rng);
        let mut names: Vec<_> = ordered.iter().map(|n| n.node_info.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        // trọng số 0 luôn đứng sau
        assert!(ordered[..2].iter().all(|n| n.weight > 0.0));
    }

    #[test]
    fn test_all_zero_weights_uniform() {
        let mut rng = StdRng::seed_from_u64(1);
        let ordered = weighted_order(vec![node("a", 0.0), node("b", 0.0)], &mut rng);
        assert_eq!(ordered.len(), 2);
    }
}
