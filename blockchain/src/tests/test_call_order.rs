// Standard library imports
use std::{collections::HashMap, sync::Arc};

// Third party imports
use rand::{rngs::StdRng, SeedableRng};

// Internal imports
use super::mock::*;
use crate::call_order::weighted_order;
use crate::config::InquirerSettings;
use crate::types::ChainId;

/// Tần suất đứng đầu xấp xỉ trọng số chuẩn hóa
#[test]
fn test_weighted_first_pick_frequency() {
    let nodes = vec![
        weighted("a", false, 0.5),
        weighted("b", false, 0.3),
        weighted("c", false, 0.2),
    ];
    let mut rng = StdRng::seed_from_u64(1234);
    let trials = 20_000;
    let mut firsts: HashMap<String, usize> = HashMap::new();
    for _ in 0..trials {
        let order = weighted_order(nodes.clone(), &mut rng);
        assert_eq!(order.len(), 3);
        *firsts.entry(order[0].node_info.name.clone()).or_default() += 1;
    }

    for (name, expected) in [("a", 0.5), ("b", 0.3), ("c", 0.2)] {
        let observed = firsts.get(name).copied().unwrap_or(0) as f64 / trials as f64;
        assert!(
            (observed - expected).abs() < 0.02,
            "{} picked first {:.3} of the time, expected {:.2}",
            name,
            observed,
            expected
        );
    }
}

/// Node riêng đã kết nối luôn đứng đầu, indexer được thêm khi registry không có
#[tokio::test]
async fn test_owned_node_always_first() {
    let own = Arc::new(FakeNode::new("own"));
    let registry_nodes = vec![
        weighted("own", true, 1.0),
        weighted("public1", false, 0.4),
        weighted("public2", false, 0.6),
    ];
    let harness = Harness::new(
        InquirerSettings::for_chain(ChainId::Ethereum),
        registry_nodes,
        FakeConnector::default(),
        FakeIndexer::new(),
        Arc::new(FixedHooks::new(17_000_000)),
    );
    harness.install(&own, true, false);

    for _ in 0..200 {
        let order = harness.inquirer.default_call_order(false);
        assert_eq!(order[0].node_info.name, "own");
        assert_eq!(order[0].weight, 1.0);
        let names: Vec<&str> = order.iter().map(|n| n.node_info.name.as_str()).collect();
        assert_eq!(names.len(), 4);
        assert!(names.contains(&"etherscan"));
        assert_eq!(names.iter().filter(|n| **n == "own").count(), 1);
    }

    let order = harness.inquirer.default_call_order(true);
    assert!(order.iter().all(|n| n.node_info.name != "etherscan"));
}

#[tokio::test]
async fn test_inactive_nodes_are_left_out() {
    let harness = Harness::new(
        InquirerSettings::for_chain(ChainId::Ethereum),
        vec![weighted("public1", false, 0.4), weighted("public2", false, 0.6)],
        FakeConnector::default(),
        FakeIndexer::new(),
        Arc::new(FixedHooks::new(17_000_000)),
    );
    assert!(harness.registry.set_active(ChainId::Ethereum, "public2", false));

    let order = harness.inquirer.default_call_order(false);
    let names: Vec<&str> = order.iter().map(|n| n.node_info.name.as_str()).collect();
    assert!(names.contains(&"public1"));
    assert!(!names.contains(&"public2"));
}
