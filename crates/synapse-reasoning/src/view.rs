use std::collections::{HashMap, VecDeque};

use synapse_core::entity::{Entity, Graph};
use synapse_core::numeric::safe_number;

/// One undirected adjacency entry.
#[derive(Debug, Clone, Copy)]
pub struct Edge<'g> {
    pub to: usize,
    pub weight: f64,
    pub relation_type: &'g str,
}

/// Index-based read-only view of a graph. Links with unknown endpoints and
/// self-loops are ignored; parallel links between the same pair collapse to
/// the heaviest one.
pub struct GraphView<'g> {
    pub graph: &'g Graph,
    index: HashMap<&'g str, usize>,
    neighbors: Vec<Vec<Edge<'g>>>,
    max_weight: f64,
}

impl<'g> GraphView<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        let index: HashMap<&str, usize> = graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut neighbors: Vec<Vec<Edge>> = vec![Vec::new(); graph.nodes.len()];
        for link in &graph.links {
            let (Some(&s), Some(&t)) = (index.get(link.source.as_str()), index.get(link.target.as_str())) else {
                continue;
            };
            if s == t {
                continue;
            }
            let weight = safe_number(link.weight, 0.0);
            for (from, to) in [(s, t), (t, s)] {
                match neighbors[from].iter_mut().find(|e| e.to == to) {
                    Some(existing) if existing.weight >= weight => {}
                    Some(existing) => {
                        existing.weight = weight;
                        existing.relation_type = &link.relation_type;
                    }
                    None => neighbors[from].push(Edge {
                        to,
                        weight,
                        relation_type: &link.relation_type,
                    }),
                }
            }
        }
        for list in &mut neighbors {
            list.sort_by(|a, b| b.weight.total_cmp(&a.weight).then(a.to.cmp(&b.to)));
        }

        let max_weight = graph
            .nodes
            .iter()
            .map(|n| safe_number(n.weight, 0.0))
            .fold(0.0, f64::max);

        Self {
            graph,
            index,
            neighbors,
            max_weight,
        }
    }

    pub fn len(&self) -> usize {
        self.graph.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.nodes.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, i: usize) -> &'g Entity {
        &self.graph.nodes[i]
    }

    /// Neighbors sorted by edge weight, heaviest first.
    pub fn neighbors(&self, i: usize) -> &[Edge<'g>] {
        &self.neighbors[i]
    }

    /// Number of distinct neighbors.
    pub fn degree(&self, i: usize) -> usize {
        self.neighbors[i].len()
    }

    pub fn weight(&self, i: usize) -> f64 {
        safe_number(self.graph.nodes[i].weight, 0.0)
    }

    /// Node weight scaled into `[0, 1]` by the heaviest node.
    pub fn normalized_weight(&self, i: usize) -> f64 {
        if self.max_weight <= 0.0 {
            return 0.0;
        }
        (self.weight(i) / self.max_weight).clamp(0.0, 1.0)
    }

    pub fn connected(&self, a: usize, b: usize) -> bool {
        self.neighbors[a].iter().any(|e| e.to == b)
    }

    /// Hop distance from `origin` to every node; `usize::MAX` when unreachable.
    pub fn hop_distances(&self, origin: usize) -> Vec<usize> {
        let mut distances = vec![usize::MAX; self.len()];
        let mut queue = VecDeque::from([origin]);
        distances[origin] = 0;
        while let Some(current) = queue.pop_front() {
            let next = distances[current] + 1;
            for edge in &self.neighbors[current] {
                if distances[edge.to] == usize::MAX {
                    distances[edge.to] = next;
                    queue.push_back(edge.to);
                }
            }
        }
        distances
    }

    pub fn mean_degree(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let total: usize = self.neighbors.iter().map(Vec::len).sum();
        total as f64 / self.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::entity::{category, NodeType, Relation};

    #[test]
    fn test_parallel_links_collapse_to_heaviest() {
        let a = Entity::new("a", NodeType::Concept, category::KEY_PHRASE, 1.0);
        let b = Entity::new("b", NodeType::Concept, category::KEY_PHRASE, 2.0);
        let graph = Graph::new(
            vec![a.clone(), b.clone()],
            vec![
                Relation::new(&a.id, &b.id, "related_to", 0.4),
                Relation::new(&b.id, &a.id, "used_for", 0.8),
                Relation::new(&a.id, &a.id, "related_to", 0.9),
                Relation::new(&a.id, "missing", "related_to", 0.9),
            ],
        );
        let view = GraphView::new(&graph);
        assert_eq!(view.degree(0), 1);
        assert_eq!(view.neighbors(0)[0].relation_type, "used_for");
        assert_eq!(view.neighbors(1)[0].weight, 0.8);
        assert_eq!(view.normalized_weight(0), 0.5);
        assert!(view.connected(0, 1));
    }
}
