use std::collections::HashMap;

use synapse_core::analysis::CentralityScore;
use synapse_core::entity::Graph;
use synapse_core::numeric::{round_to, safe_div};

/// In/out degree per node over valid, non-self-loop links, highest first.
pub fn degree_centrality(graph: &Graph) -> Vec<CentralityScore> {
    let mut degrees: HashMap<&str, (usize, usize)> =
        graph.nodes.iter().map(|n| (n.id.as_str(), (0, 0))).collect();
    for link in &graph.links {
        if link.source == link.target
            || !degrees.contains_key(link.source.as_str())
            || !degrees.contains_key(link.target.as_str())
        {
            continue;
        }
        if let Some(d) = degrees.get_mut(link.source.as_str()) {
            d.1 += 1;
        }
        if let Some(d) = degrees.get_mut(link.target.as_str()) {
            d.0 += 1;
        }
    }

    let denominator = graph.nodes.len().saturating_sub(1) as f64;
    let mut scores: Vec<CentralityScore> = graph
        .nodes
        .iter()
        .map(|n| {
            let (in_degree, out_degree) = degrees.get(n.id.as_str()).copied().unwrap_or_default();
            let degree = in_degree + out_degree;
            CentralityScore {
                id: n.id.clone(),
                name: n.name.clone(),
                degree,
                in_degree,
                out_degree,
                normalized_degree: round_to(safe_div(degree as f64, denominator, 0.0), 4),
                betweenness: None,
                pagerank: None,
            }
        })
        .collect();

    scores.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.name.cmp(&b.name)));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::entity::{category, Entity, NodeType, Relation};

    #[test]
    fn test_degree_counts_direction() {
        let a = Entity::new("a", NodeType::Concept, category::KEY_PHRASE, 1.0);
        let b = Entity::new("b", NodeType::Concept, category::KEY_PHRASE, 1.0);
        let c = Entity::new("c", NodeType::Concept, category::KEY_PHRASE, 1.0);
        let graph = Graph::new(
            vec![a.clone(), b.clone(), c.clone()],
            vec![
                Relation::new(&a.id, &b.id, "used_for", 0.5),
                Relation::new(&a.id, &c.id, "used_for", 0.5),
                Relation::new(&a.id, &a.id, "related_to", 0.5),
            ],
        );
        let scores = degree_centrality(&graph);
        assert_eq!(scores[0].name, "a");
        assert_eq!((scores[0].out_degree, scores[0].in_degree), (2, 0));
        assert_eq!(scores[0].normalized_degree, 1.0);
        assert_eq!(scores[1].degree, 1);
        assert!(scores.iter().all(|s| s.pagerank.is_none()));
    }

    #[test]
    fn test_empty_graph() {
        assert!(degree_centrality(&Graph::default()).is_empty());
    }
}
