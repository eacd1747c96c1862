use synapse_core::entity::{category, Entity, Graph, NodeType, Relation};
use synapse_core::error::SynapseError;
use synapse_reasoning::ReasoningEngine;

fn concept(name: &str, weight: f64) -> Entity {
    Entity::new(name, NodeType::Concept, category::CORE_CONCEPT, weight)
}

/// 用户画像 -> 内容营销 -> 转化率 -> ROI, with a shortcut and a bad weight.
fn funnel() -> (Graph, Vec<Entity>) {
    let nodes = vec![
        concept("用户画像", 2.5),
        concept("内容营销", 2.5),
        concept("转化率", 3.0),
        concept("ROI", 3.0),
        concept("品牌", f64::NAN),
    ];
    let links = vec![
        Relation::new(&nodes[0].id, &nodes[1].id, "improves", 0.8),
        Relation::new(&nodes[1].id, &nodes[2].id, "influences", 0.7),
        Relation::new(&nodes[2].id, &nodes[3].id, "causes", 0.9),
        Relation::new(&nodes[0].id, &nodes[2].id, "optimizes", 0.6),
        Relation::new(&nodes[4].id, &nodes[3].id, "related_to", f64::INFINITY),
    ];
    (Graph::new(nodes.clone(), links), nodes)
}

// ---------------------------------------------------------------------------
// Multi-hop paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn path_confidence_is_always_a_unit_value() {
    let (graph, nodes) = funnel();
    let engine = ReasoningEngine::default();
    for start in &nodes {
        for end in &nodes {
            if start.id == end.id {
                continue;
            }
            for path in engine.find_multi_hop_paths(&graph, &start.id, &end.id, 6).await {
                assert!((0.0..=1.0).contains(&path.confidence), "confidence {}", path.confidence);
                assert!(path.score.is_finite());
                assert_eq!(path.nodes.first(), Some(&start.id));
                assert_eq!(path.nodes.last(), Some(&end.id));
            }
        }
    }
}

#[tokio::test]
async fn repeated_queries_hit_the_cache() {
    let (graph, nodes) = funnel();
    let engine = ReasoningEngine::new(4);
    let first = engine.find_multi_hop_paths(&graph, &nodes[0].id, &nodes[3].id, 4).await;
    let second = engine.find_multi_hop_paths(&graph, &nodes[0].id, &nodes[3].id, 4).await;
    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(engine.cached_queries().await, 1);
}

// ---------------------------------------------------------------------------
// Reverse reasoning
// ---------------------------------------------------------------------------

#[test]
fn reverse_reasoning_without_incoming_edges_is_empty() {
    let (graph, nodes) = funnel();
    let engine = ReasoningEngine::default();
    let result = engine
        .reverse_reasoning(&graph, &nodes[0].id, 3)
        .expect("known node should not fail");
    assert!(result.potential_causes.is_empty());
}

#[test]
fn reverse_reasoning_walks_back_from_the_effect() {
    let (graph, nodes) = funnel();
    let result = ReasoningEngine::default()
        .reverse_reasoning(&graph, &nodes[3].id, 3)
        .expect("known node should not fail");
    assert!(result.potential_causes.iter().any(|c| c.id == nodes[2].id));
    assert!(result
        .potential_causes
        .iter()
        .all(|c| (0.0..=1.0).contains(&c.confidence)));
}

#[test]
fn reverse_reasoning_on_unknown_node_is_not_found() {
    let (graph, _) = funnel();
    let err = ReasoningEngine::default()
        .reverse_reasoning(&graph, "missing", 3)
        .unwrap_err();
    assert!(matches!(err, SynapseError::NotFound(_)));
}

// ---------------------------------------------------------------------------
// Causal chains
// ---------------------------------------------------------------------------

#[test]
fn textual_causal_cues_form_a_chain() {
    let (graph, nodes) = funnel();
    let text = "用户画像导致内容营销更精准，内容营销导致转化率上升，转化率导致ROI增长";
    let analysis = ReasoningEngine::default().build_causal_chains(&graph, text);
    assert!(!analysis.relations.is_empty());
    assert!(analysis
        .chains
        .iter()
        .any(|c| {
            let ids = c.node_ids();
            ids.first() == Some(&nodes[0].id.as_str()) && ids.last() == Some(&nodes[3].id.as_str())
        }));
}
