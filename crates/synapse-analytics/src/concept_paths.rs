use std::collections::HashSet;

use synapse_core::analysis::PathAnalysis;
use synapse_core::entity::{category, Entity, Graph, NodeType};
use synapse_reasoning::ReasoningEngine;

pub const KEY_NODE_WEIGHT: f64 = 1.5;
pub const MAX_KEY_NODES: usize = 10;
pub const MIN_PATH_HOPS: usize = 2;
pub const MAX_PATH_HOPS: usize = 4;
pub const TOP_CONCEPT_PATHS: usize = 5;

pub fn is_key_node(node: &Entity) -> bool {
    node.node_type == NodeType::Tool || node.category == category::PROFESSIONAL_TERM || node.weight > KEY_NODE_WEIGHT
}

/// Multi-hop paths of 2 to 4 hops between the heaviest key nodes, best five
/// by confidence.
pub async fn analyze_concept_paths(reasoning: &ReasoningEngine, graph: &Graph) -> PathAnalysis {
    let mut key_nodes: Vec<&Entity> = graph.nodes.iter().filter(|n| is_key_node(n)).collect();
    key_nodes.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.name.cmp(&b.name)));
    key_nodes.truncate(MAX_KEY_NODES);

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut paths = Vec::new();
    for (i, start) in key_nodes.iter().enumerate() {
        for end in &key_nodes[i + 1..] {
            for path in reasoning
                .find_multi_hop_paths(graph, &start.id, &end.id, MAX_PATH_HOPS)
                .await
            {
                if (MIN_PATH_HOPS..=MAX_PATH_HOPS).contains(&path.hops()) && seen.insert(path.nodes.clone()) {
                    paths.push(path);
                }
            }
        }
    }

    paths.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(b.score.total_cmp(&a.score))
    });
    paths.truncate(TOP_CONCEPT_PATHS);

    PathAnalysis {
        key_nodes: key_nodes.iter().map(|n| n.id.clone()).collect(),
        paths,
    }
}
