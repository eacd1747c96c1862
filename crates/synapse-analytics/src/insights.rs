//! Aggregate summaries of a graph: statistics, insights, knowledge gaps and
//! cross-document connections. Nothing here calls out of process.

use std::collections::{BTreeMap, HashMap, HashSet};

use synapse_core::analysis::{
    AnalyticsBackendKind, CentralityScore, Community, CrossDocConnection, GapKind, GraphStatistics, KnowledgeGap,
};
use synapse_core::entity::{category, Entity, Graph, NodeType};
use synapse_core::numeric::{round_to, safe_div};

/// Below this density a graph is reported as sparse.
pub const SPARSE_DENSITY: f64 = 0.1;
pub const IMPORTANT_WEIGHT: f64 = 1.5;
const TOP_CENTRAL: usize = 3;

pub fn is_important(node: &Entity) -> bool {
    node.weight > IMPORTANT_WEIGHT
        || node.category == category::CORE_CONCEPT
        || node.category == category::PROFESSIONAL_TERM
}

fn undirected_degrees(graph: &Graph) -> HashMap<&str, usize> {
    let mut degrees: HashMap<&str, usize> = graph.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    for link in &graph.links {
        if link.source == link.target
            || !degrees.contains_key(link.source.as_str())
            || !degrees.contains_key(link.target.as_str())
        {
            continue;
        }
        for end in [link.source.as_str(), link.target.as_str()] {
            if let Some(d) = degrees.get_mut(end) {
                *d += 1;
            }
        }
    }
    degrees
}

pub fn graph_statistics(graph: &Graph, backend: AnalyticsBackendKind) -> GraphStatistics {
    let n = graph.nodes.len() as f64;
    let mut node_types = BTreeMap::new();
    let mut categories = BTreeMap::new();
    let mut relation_types = BTreeMap::new();
    for node in &graph.nodes {
        *node_types.entry(node.node_type.as_str().to_string()).or_insert(0) += 1;
        *categories.entry(node.category.clone()).or_insert(0) += 1;
    }
    for link in &graph.links {
        *relation_types.entry(link.relation_type.clone()).or_insert(0) += 1;
    }

    GraphStatistics {
        node_count: graph.nodes.len(),
        link_count: graph.links.len(),
        density: round_to(safe_div(graph.links.len() as f64, n * (n - 1.0), 0.0), 4),
        average_degree: round_to(safe_div(2.0 * graph.links.len() as f64, n, 0.0), 4),
        node_types,
        categories,
        relation_types,
        backend,
    }
}

/// Human-readable observations drawn from counts only.
pub fn generate_insights(
    graph: &Graph,
    centrality: &[CentralityScore],
    communities: &[Community],
    statistics: &GraphStatistics,
) -> Vec<String> {
    if graph.nodes.is_empty() {
        return vec!["The graph is empty; no insights available".to_string()];
    }
    let mut insights = Vec::new();

    let central: Vec<String> = centrality
        .iter()
        .filter(|c| c.degree > 0)
        .take(TOP_CENTRAL)
        .map(|c| format!("{} ({} connections)", c.name, c.degree))
        .collect();
    if !central.is_empty() {
        insights.push(format!("Central concepts: {}", central.join(", ")));
    }

    let tools = graph.nodes.iter().filter(|n| n.node_type == NodeType::Tool).count();
    let concepts = graph.nodes.iter().filter(|n| n.node_type == NodeType::Concept).count();
    if tools > 0 || concepts > 0 {
        let balance = if tools == 0 {
            "the text is purely conceptual".to_string()
        } else if concepts == 0 {
            "the text is purely about tooling".to_string()
        } else {
            format!("tool/concept ratio {:.2}", tools as f64 / concepts as f64)
        };
        insights.push(format!("{} tool(s) and {} concept(s): {}", tools, concepts, balance));
    }

    if graph.nodes.len() > 1 {
        if statistics.density < SPARSE_DENSITY {
            insights.push(format!(
                "Connections are sparse (density {:.3}); many concepts are discussed in isolation",
                statistics.density
            ));
        } else {
            insights.push(format!("Concepts are well connected (density {:.3})", statistics.density));
        }
    }

    if let Some(largest) = communities.first() {
        insights.push(format!(
            "{} thematic cluster(s); the largest is {} ({} members)",
            communities.len(),
            largest.theme,
            largest.members.len()
        ));
    }

    insights
}

/// Important nodes with no or a single connection, and categories whose
/// members never link to each other.
pub fn find_knowledge_gaps(graph: &Graph) -> Vec<KnowledgeGap> {
    let degrees = undirected_degrees(graph);
    let mut gaps = Vec::new();

    let important: Vec<&Entity> = graph.nodes.iter().filter(|n| is_important(n)).collect();
    let isolated: Vec<&Entity> = important
        .iter()
        .copied()
        .filter(|n| degrees.get(n.id.as_str()).copied().unwrap_or(0) == 0)
        .collect();
    if !isolated.is_empty() {
        gaps.push(KnowledgeGap {
            kind: GapKind::IsolatedConcept,
            description: format!(
                "{} important concept(s) have no connections: {}",
                isolated.len(),
                names(&isolated)
            ),
            node_ids: isolated.iter().map(|n| n.id.clone()).collect(),
        });
    }

    let weak: Vec<&Entity> = important
        .iter()
        .copied()
        .filter(|n| degrees.get(n.id.as_str()).copied().unwrap_or(0) == 1)
        .collect();
    if !weak.is_empty() {
        gaps.push(KnowledgeGap {
            kind: GapKind::WeaklyConnected,
            description: format!(
                "{} important concept(s) hang on a single connection: {}",
                weak.len(),
                names(&weak)
            ),
            node_ids: weak.iter().map(|n| n.id.clone()).collect(),
        });
    }

    let category_of: HashMap<&str, &str> =
        graph.nodes.iter().map(|n| (n.id.as_str(), n.category.as_str())).collect();
    let linked: HashSet<&str> = graph
        .links
        .iter()
        .filter(|l| l.source != l.target)
        .filter_map(|l| {
            let (s, t) = (category_of.get(l.source.as_str())?, category_of.get(l.target.as_str())?);
            (s == t).then_some(*s)
        })
        .collect();
    let mut members: BTreeMap<&str, Vec<&Entity>> = BTreeMap::new();
    for node in &graph.nodes {
        members.entry(node.category.as_str()).or_default().push(node);
    }
    for (cat, nodes) in members {
        if nodes.len() >= 2 && !linked.contains(cat) {
            gaps.push(KnowledgeGap {
                kind: GapKind::DisconnectedCategory,
                description: format!("No links between the {} '{}' entities", nodes.len(), cat),
                node_ids: nodes.iter().map(|n| n.id.clone()).collect(),
            });
        }
    }

    gaps
}

fn names(nodes: &[&Entity]) -> String {
    nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>().join(", ")
}

/// Nodes whose provenance spans two or more documents.
pub fn cross_document_connections(graph: &Graph) -> Vec<CrossDocConnection> {
    let mut found: Vec<CrossDocConnection> = graph
        .nodes
        .iter()
        .filter_map(|n| {
            let documents = n.documents();
            (documents.len() >= 2).then(|| CrossDocConnection {
                node_id: n.id.clone(),
                name: n.name.clone(),
                documents: documents.into_iter().collect(),
            })
        })
        .collect();
    found.sort_by(|a, b| b.documents.len().cmp(&a.documents.len()).then_with(|| a.name.cmp(&b.name)));
    found
}
