use synapse_core::delta::DeltaType;
use synapse_core::entity::{category, Entity, Graph, NodeType, Relation};
use synapse_graph::{apply_delta, compute_delta, merge_entities, GraphStateManager, CHANGE_LOG_CAPACITY};

fn concept(name: &str, weight: f64) -> Entity {
    Entity::new(name, NodeType::Concept, category::CORE_CONCEPT, weight)
}

fn sorted_nodes(graph: &Graph) -> Vec<Entity> {
    let mut nodes = graph.nodes.clone();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    nodes
}

fn sorted_links(graph: &Graph) -> Vec<(String, String, String, u64)> {
    let mut links: Vec<_> = graph
        .links
        .iter()
        .map(|l| (l.source.clone(), l.target.clone(), l.relation_type.clone(), l.weight.to_bits()))
        .collect();
    links.sort();
    links
}

fn before() -> Graph {
    let (a, b, c) = (concept("ROI", 3.0), concept("转化率", 3.0), concept("品牌", 2.0));
    Graph::new(
        vec![a.clone(), b.clone(), c.clone()],
        vec![
            Relation::new(&a.id, &b.id, "related_to", 0.5),
            Relation::new(&b.id, &c.id, "influences", 0.7),
        ],
    )
}

fn after() -> Graph {
    let a = concept("ROI", 3.4).with_property("frequency", 2);
    let b = concept("转化率", 3.0);
    let d = Entity::new("Google Analytics", NodeType::Tool, category::TOOL, 2.5);
    Graph::new(
        vec![a.clone(), b.clone(), d.clone()],
        vec![
            Relation::new(&a.id, &b.id, "related_to", 0.9),
            Relation::new(&d.id, &a.id, "used_for", 0.8),
        ],
    )
}

// ---------------------------------------------------------------------------
// Delta computation
// ---------------------------------------------------------------------------

#[test]
fn initial_delta_adds_everything() {
    let graph = after();
    let delta = compute_delta(&graph, None);
    assert_eq!(delta.delta_type, DeltaType::Initial);
    assert_eq!(delta.added_nodes, graph.nodes);
    assert_eq!(delta.added_links, graph.links);
    assert!(delta.modified_nodes.is_empty());
    assert!(delta.deleted_nodes.is_empty());
}

#[test]
fn applying_a_delta_reproduces_the_new_graph() {
    let (old, new) = (before(), after());
    let delta = compute_delta(&new, Some(&old));
    assert_eq!(delta.delta_type, DeltaType::Incremental);

    let summary = delta.summary();
    assert_eq!(summary.added_nodes, 1);
    assert_eq!(summary.modified_nodes, 1);
    assert_eq!(summary.deleted_nodes, 1);
    assert_eq!(summary.added_links, 1);
    assert_eq!(summary.modified_links, 1);
    assert_eq!(summary.deleted_links, 1);

    let rebuilt = apply_delta(&old, &delta);
    assert_eq!(sorted_nodes(&rebuilt), sorted_nodes(&new));
    assert_eq!(sorted_links(&rebuilt), sorted_links(&new));
    assert_eq!(rebuilt.metadata.change_count, old.metadata.change_count + 1);
    assert!(rebuilt.metadata.updated_at.is_some());
}

#[test]
fn identical_graphs_produce_an_empty_delta() {
    let graph = before();
    assert!(compute_delta(&graph, Some(&graph)).is_empty());
}

// ---------------------------------------------------------------------------
// Change log
// ---------------------------------------------------------------------------

#[tokio::test]
async fn change_log_keeps_the_last_hundred_most_recent_first() {
    let manager = GraphStateManager::new();
    for i in 0..=CHANGE_LOG_CAPACITY {
        let delta = compute_delta(&Graph::new(vec![concept(&format!("概念{i}"), 1.0)], vec![]), None);
        manager.apply_delta(&format!("g{i}"), delta).await;
    }

    let history = manager.history(CHANGE_LOG_CAPACITY * 2).await;
    assert_eq!(history.len(), CHANGE_LOG_CAPACITY);
    assert_eq!(history[0].graph_id.as_deref(), Some("g100"));
    assert_eq!(history[CHANGE_LOG_CAPACITY - 1].graph_id.as_deref(), Some("g1"));
    assert!(history.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test]
async fn commit_tracks_change_count_per_graph() {
    let manager = GraphStateManager::new();
    let first = manager.commit("g", before()).await;
    assert_eq!(first.delta.delta_type, DeltaType::Initial);
    assert_eq!(first.graph.metadata.change_count, 0);

    let second = manager.commit("g", after()).await;
    assert_eq!(second.delta.delta_type, DeltaType::Incremental);
    assert_eq!(second.graph.metadata.change_count, 1);
    assert_ne!(first.change_id, second.change_id);
    assert_eq!(manager.snapshot("g").await.map(|g| g.nodes.len()), Some(3));
}

// ---------------------------------------------------------------------------
// Entity merge
// ---------------------------------------------------------------------------

#[test]
fn merge_is_idempotent_on_dissimilar_entities() {
    let entities = vec![
        concept("ROI", 3.0),
        concept("转化率", 3.0),
        Entity::new("Python", NodeType::Tool, category::TOOL, 2.5),
        concept("machine learning", 2.0),
    ];
    let once = merge_entities(entities.clone());
    assert_eq!(once.len(), entities.len());
    assert_eq!(merge_entities(once.clone()), once);
}

#[test]
fn merge_collapses_near_duplicates_once() {
    let entities = vec![concept("数据分析", 2.0), concept("数据分析师", 1.5), concept("品牌", 2.0)];
    let once = merge_entities(entities);
    assert_eq!(once.len(), 2);
    let merged = once.iter().find(|e| e.name == "数据分析").expect("representative kept");
    assert_eq!(merged.weight, 2.0);
    assert_eq!(merge_entities(once.clone()), once);
}
