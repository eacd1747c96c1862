//! Reverse (effect-to-cause) inference and analogical reasoning.

use std::collections::{BTreeSet, HashMap, HashSet};

use synapse_core::entity::Graph;
use synapse_core::error::{Result, SynapseError};
use synapse_core::numeric::{clamp_unit, round_to, safe_div, safe_number, safe_sqrt};
use synapse_core::reasoning::{Analogy, ConceptualMapping, PotentialCause, ReverseReasoning};

use crate::view::GraphView;

pub const DEFAULT_REVERSE_DEPTH: usize = 3;
pub const MAX_REVERSE_DEPTH: usize = 6;
/// Analogies at or below this similarity are discarded.
pub const ANALOGY_THRESHOLD: f64 = 0.6;

/// How strongly each relation type implies causation.
pub const CAUSAL_MULTIPLIERS: &[(&str, f64)] = &[
    ("causes", 0.9),
    ("generates", 0.85),
    ("optimizes", 0.8),
    ("improves", 0.8),
    ("influences", 0.7),
    ("requires", 0.65),
    ("used_for", 0.6),
    ("implements", 0.6),
    ("contains", 0.55),
    ("related_to", 0.5),
];

pub fn causal_multiplier(relation_type: &str) -> f64 {
    CAUSAL_MULTIPLIERS
        .iter()
        .find(|(t, _)| *t == relation_type)
        .map(|(_, m)| *m)
        .unwrap_or(0.5)
}

/// Walks incoming edges back from `effect_id`. Each candidate scores
/// `edge weight x sqrt(cause x effect normalized weight) x type multiplier`,
/// compounded with its parent's confidence beyond the first level.
pub fn reverse_reasoning(graph: &Graph, effect_id: &str, max_depth: usize) -> Result<ReverseReasoning> {
    let view = GraphView::new(graph);
    let effect_index = view
        .index_of(effect_id)
        .ok_or_else(|| SynapseError::NotFound(format!("Entity {} not found", effect_id)))?;
    let max_depth = max_depth.clamp(1, MAX_REVERSE_DEPTH);

    let mut incoming: HashMap<&str, Vec<(&str, f64, &str)>> = HashMap::new();
    for link in &graph.links {
        if link.source == link.target || view.index_of(&link.source).is_none() {
            continue;
        }
        incoming
            .entry(link.target.as_str())
            .or_default()
            .push((link.source.as_str(), safe_number(link.weight, 0.0), link.relation_type.as_str()));
    }

    let mut best: HashMap<String, PotentialCause> = HashMap::new();
    let mut visited: HashSet<&str> = HashSet::from([effect_id]);
    // (node, its confidence as a cause)
    let mut frontier: Vec<(&str, f64)> = vec![(effect_id, 1.0)];

    for depth in 1..=max_depth {
        let mut next = Vec::new();
        for &(target, parent_confidence) in &frontier {
            let Some(target_index) = view.index_of(target) else {
                continue;
            };
            let Some(edges) = incoming.get(target) else {
                continue;
            };
            for &(source, weight, relation_type) in edges {
                if source == effect_id {
                    continue;
                }
                let Some(source_index) = view.index_of(source) else {
                    continue;
                };
                let mut confidence = weight
                    * safe_sqrt(view.normalized_weight(source_index) * view.normalized_weight(target_index))
                    * causal_multiplier(relation_type);
                if depth > 1 {
                    confidence *= parent_confidence;
                }
                let confidence = round_to(clamp_unit(confidence), 4);

                let candidate = PotentialCause {
                    id: source.to_string(),
                    name: view.node(source_index).name.clone(),
                    relation_type: relation_type.to_string(),
                    confidence,
                    depth,
                    via: (depth > 1).then(|| view.node(target_index).name.clone()),
                };
                match best.get(source) {
                    Some(existing) if existing.confidence >= confidence => {}
                    _ => {
                        best.insert(source.to_string(), candidate);
                    }
                }
                if visited.insert(source) {
                    next.push((source, confidence));
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    let mut potential_causes: Vec<PotentialCause> = best.into_values().collect();
    potential_causes.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.depth.cmp(&b.depth))
            .then_with(|| a.name.cmp(&b.name))
    });

    Ok(ReverseReasoning {
        effect_id: effect_id.to_string(),
        effect_name: view.node(effect_index).name.clone(),
        max_depth,
        potential_causes,
    })
}

struct Signature {
    degree: usize,
    relation_types: BTreeSet<String>,
}

fn signature(graph: &Graph, view: &GraphView, index: usize) -> Signature {
    let id = view.node(index).id.as_str();
    Signature {
        degree: view.degree(index),
        relation_types: graph
            .links
            .iter()
            .filter(|l| l.source != l.target && (l.source == id || l.target == id))
            .map(|l| l.relation_type.clone())
            .collect(),
    }
}

fn degree_similarity(a: usize, b: usize) -> f64 {
    let max = a.max(b);
    if max == 0 {
        return 1.0;
    }
    1.0 - a.abs_diff(b) as f64 / max as f64
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    safe_div(a.intersection(b).count() as f64, union as f64, 0.0)
}

/// Finds nodes in `target_category` structurally similar to `source_id`:
/// `0.4 x degree similarity + 0.6 x Jaccard of incident relation types`.
pub fn analogical_reasoning(graph: &Graph, source_id: &str, target_category: &str) -> Result<Vec<Analogy>> {
    let view = GraphView::new(graph);
    let source_index = view
        .index_of(source_id)
        .ok_or_else(|| SynapseError::NotFound(format!("Entity {} not found", source_id)))?;
    let source = signature(graph, &view, source_index);
    let source_name = &view.node(source_index).name;

    let mut analogies: Vec<Analogy> = Vec::new();
    for (index, node) in graph.nodes.iter().enumerate() {
        if index == source_index || node.category != target_category {
            continue;
        }
        let target = signature(graph, &view, index);
        let similarity = 0.4 * degree_similarity(source.degree, target.degree)
            + 0.6 * jaccard(&source.relation_types, &target.relation_types);
        if similarity <= ANALOGY_THRESHOLD {
            continue;
        }

        let mapping = ConceptualMapping {
            shared_connection_types: source.relation_types.intersection(&target.relation_types).cloned().collect(),
            source_unique: source.relation_types.difference(&target.relation_types).cloned().collect(),
            target_unique: target.relation_types.difference(&source.relation_types).cloned().collect(),
        };
        let predictions = mapping
            .source_unique
            .iter()
            .map(|t| format!("'{}' may also form a '{}' connection, as '{}' does", node.name, t, source_name))
            .collect();

        analogies.push(Analogy {
            source_id: source_id.to_string(),
            target_id: node.id.clone(),
            target_name: node.name.clone(),
            similarity: round_to(similarity, 4),
            mapping,
            predictions,
        });
    }

    analogies.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then_with(|| a.target_name.cmp(&b.target_name)));
    Ok(analogies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::entity::{category, Entity, NodeType, Relation};

    fn node(name: &str, weight: f64) -> Entity {
        Entity::new(name, NodeType::Concept, category::KEY_PHRASE, weight)
    }

    #[test]
    fn test_reverse_reasoning_walks_back() {
        let (a, b, c) = (node("a", 2.0), node("b", 2.0), node("c", 2.0));
        let graph = Graph::new(
            vec![a.clone(), b.clone(), c.clone()],
            vec![
                Relation::new(&b.id, &c.id, "causes", 1.0),
                Relation::new(&a.id, &b.id, "influences", 0.5),
            ],
        );
        let result = reverse_reasoning(&graph, &c.id, 3).unwrap();
        assert_eq!(result.potential_causes.len(), 2);
        let first = &result.potential_causes[0];
        assert_eq!(first.name, "b");
        assert!((first.confidence - 0.9).abs() < 1e-9);
        let second = &result.potential_causes[1];
        assert_eq!(second.depth, 2);
        assert_eq!(second.via.as_deref(), Some("b"));
        assert!((second.confidence - 0.315).abs() < 1e-9);
    }

    #[test]
    fn test_reverse_reasoning_edge_cases() {
        let a = node("a", 1.0);
        let graph = Graph::new(vec![a.clone()], Vec::new());
        let result = reverse_reasoning(&graph, &a.id, 3).unwrap();
        assert!(result.potential_causes.is_empty());
        assert!(matches!(reverse_reasoning(&graph, "missing", 3), Err(SynapseError::NotFound(_))));
    }

    #[test]
    fn test_reverse_depth_limit() {
        let (a, b, c) = (node("a", 1.0), node("b", 1.0), node("c", 1.0));
        let graph = Graph::new(
            vec![a.clone(), b.clone(), c.clone()],
            vec![
                Relation::new(&b.id, &c.id, "causes", 1.0),
                Relation::new(&a.id, &b.id, "causes", 1.0),
            ],
        );
        let result = reverse_reasoning(&graph, &c.id, 1).unwrap();
        assert_eq!(result.potential_causes.len(), 1);
    }

    #[test]
    fn test_analogy_by_shared_structure() {
        let python = Entity::new("Python", NodeType::Tool, category::TOOL, 2.5);
        let rust = Entity::new("Rust", NodeType::Tool, category::TOOL, 2.5);
        let excel = Entity::new("Excel", NodeType::Tool, category::TOOL, 2.5);
        let ml = node("机器学习", 2.0);
        let web = node("web", 1.0);
        let graph = Graph::new(
            vec![python.clone(), rust.clone(), excel.clone(), ml.clone(), web.clone()],
            vec![
                Relation::new(&python.id, &ml.id, "used_for", 0.8),
                Relation::new(&python.id, &web.id, "implements", 0.6),
                Relation::new(&rust.id, &web.id, "used_for", 0.7),
                Relation::new(&rust.id, &ml.id, "used_for", 0.6),
                Relation::new(&excel.id, &ml.id, "related_to", 0.5),
            ],
        );
        let analogies = analogical_reasoning(&graph, &python.id, category::TOOL).unwrap();
        assert_eq!(analogies.len(), 1);
        let a = &analogies[0];
        assert_eq!(a.target_name, "Rust");
        // equal degree -> 1.0; jaccard {used_for} / {used_for, implements} -> 0.5
        assert!((a.similarity - 0.7).abs() < 1e-9);
        assert_eq!(a.mapping.shared_connection_types, vec!["used_for"]);
        assert_eq!(a.mapping.source_unique, vec!["implements"]);
        assert_eq!(a.predictions.len(), 1);
    }
}
