//! Tests for the Query Plan Model

use super::*;
use pretty_assertions::assert_eq;

fn join_plan() -> Plan {
    // Build a tree:
    //        Hash Join
    //       /         \
    //   Seq Scan      Hash
    //                   |
    //               Seq Scan
    let outer = PlanNode::new("Seq Scan").with_relation("orders").with_rows(500.0);
    let inner = PlanNode::new("Hash")
        .with_child(PlanNode::new("Seq Scan").with_relation("users").with_rows(20.0));
    Plan::new(
        PlanNode::new("Hash Join")
            .with_cost(42.5)
            .with_child(outer)
            .with_child(inner),
    )
}

#[test]
fn test_plan_total_cost_from_root() {
    let plan = join_plan();
    assert_eq!(plan.total_cost, 42.5);
}

#[test]
fn test_iter_nodes_is_preorder() {
    let plan = join_plan();
    let order: Vec<String> = plan
        .iter_nodes()
        .map(|n| match &n.relation_name {
            Some(rel) => format!("{} {}", n.node_type, rel),
            None => n.node_type.clone(),
        })
        .collect();
    assert_eq!(
        order,
        vec!["Hash Join", "Seq Scan orders", "Hash", "Seq Scan users"]
    );
}

#[test]
fn test_type_matching_ignores_case() {
    let node = PlanNode::new("Bitmap Heap Scan");
    assert!(node.is_type("bitmap heap scan"));
    assert!(node.type_contains("HEAP"));
    assert!(!node.is_type("heap"));
}

#[test]
fn test_depth_and_count() {
    let plan = join_plan();
    assert_eq!(plan.root.depth(), 3);
    assert_eq!(plan.node_count(), 4);
    assert!(plan.has_node_type("hash"));
    assert!(!plan.has_node_type("sort"));
}

#[test]
fn test_deep_plan_does_not_overflow() {
    let mut node = PlanNode::new("Seq Scan");
    for _ in 0..50_000 {
        node = PlanNode::new("Materialize").with_child(node);
    }
    let plan = Plan::new(node);
    assert_eq!(plan.node_count(), 50_001);
    assert_eq!(plan.root.depth(), 50_001);
    // Nested Vec drops recurse, so tear the tree down iteratively
    let mut stack = vec![plan.root];
    while let Some(mut n) = stack.pop() {
        stack.append(&mut n.plans);
    }
}

#[test]
fn test_display_tree() {
    let plan = Plan::new(
        PlanNode::new("Limit")
            .with_rows(10.0)
            .with_cost(1.5)
            .with_child(
                PlanNode::new("Seq Scan")
                    .with_relation("users")
                    .with_alias("u")
                    .with_rows(100.0)
                    .with_cost(1.0)
                    .with_filter("(age = 42)"),
            )
            .with_child(PlanNode::new("Result")),
    );
    let expected = "└─ Limit (rows=10, cost=1.5)\n   \
                    ├─ Seq Scan on users as u (rows=100, cost=1) [filter=(age = 42)]\n   \
                    └─ Result (rows=0, cost=0)\n";
    assert_eq!(plan.to_string(), expected);
}
