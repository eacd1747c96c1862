//! Entity merging and snapshot merging for the update workflow.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use synapse_core::entity::{Entity, Graph, LinkKey, Relation};
use synapse_core::text::normalized_similarity;

/// Entities more similar than this are merged.
pub const MERGE_THRESHOLD: f64 = 0.8;

/// `0.5 x name similarity + 0.3 x same type + 0.2 x same category`.
pub fn entity_similarity(a: &Entity, b: &Entity) -> f64 {
    let name = normalized_similarity(&a.normalized_name(), &b.normalized_name());
    let node_type = if a.node_type == b.node_type { 0.3 } else { 0.0 };
    let category = if a.category == b.category { 0.2 } else { 0.0 };
    0.5 * name + node_type + category
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb.max(ra)] = ra.min(rb);
        }
    }
}

/// Merged entities plus the id remapping of every absorbed entity.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub entities: Vec<Entity>,
    pub remap: HashMap<String, String>,
}

/// Merges entities whose pairwise similarity exceeds 0.8, closing chains
/// transitively. The heaviest member of a group keeps its identity; weight is
/// the group max and property bags are unioned.
pub fn merge_entities_with_remap(entities: Vec<Entity>) -> MergeOutcome {
    let n = entities.len();
    let mut sets = UnionFind::new(n);
    for i in 0..n {
        for j in i + 1..n {
            if entity_similarity(&entities[i], &entities[j]) > MERGE_THRESHOLD {
                sets.union(i, j);
            }
        }
    }

    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    for i in 0..n {
        let root = sets.find(i);
        match group_of_root.get(&root) {
            Some(&g) => groups[g].1.push(i),
            None => {
                group_of_root.insert(root, groups.len());
                groups.push((root, vec![i]));
            }
        }
    }

    let mut outcome = MergeOutcome::default();
    for (_, members) in groups {
        let representative = members
            .iter()
            .copied()
            .max_by(|&a, &b| entities[a].weight.total_cmp(&entities[b].weight).then(b.cmp(&a)))
            .unwrap_or(members[0]);
        let mut merged = entities[representative].clone();

        if members.len() > 1 {
            let mut aliases = BTreeSet::new();
            for &m in &members {
                if m == representative {
                    continue;
                }
                let other = &entities[m];
                merged.weight = merged.weight.max(other.weight);
                for (k, v) in &other.properties {
                    merged.properties.entry(k.clone()).or_insert_with(|| v.clone());
                }
                aliases.insert(other.name.clone());
                outcome.remap.insert(other.id.clone(), merged.id.clone());
            }
            merged.properties.insert(
                "aliases".into(),
                Value::Array(aliases.into_iter().map(Value::String).collect()),
            );
        }
        outcome.entities.push(merged);
    }

    outcome
}

pub fn merge_entities(entities: Vec<Entity>) -> Vec<Entity> {
    merge_entities_with_remap(entities).entities
}

fn dedupe_links(links: Vec<Relation>) -> Vec<Relation> {
    let mut index: HashMap<LinkKey, usize> = HashMap::new();
    let mut out: Vec<Relation> = Vec::with_capacity(links.len());
    for link in links {
        match index.get(&link.key()) {
            Some(&i) => {
                let existing = &mut out[i];
                existing.weight = existing.weight.max(link.weight);
                for (k, v) in link.properties {
                    existing.properties.entry(k).or_insert(v);
                }
            }
            None => {
                index.insert(link.key(), out.len());
                out.push(link);
            }
        }
    }
    out
}

/// Merges similar nodes of a graph and rewires links onto the survivors,
/// dropping links that collapse into self-loops.
pub fn merge_graph_entities(graph: &Graph) -> Graph {
    let outcome = merge_entities_with_remap(graph.nodes.clone());
    let links = graph
        .links
        .iter()
        .cloned()
        .map(|mut l| {
            if let Some(id) = outcome.remap.get(&l.source) {
                l.source = id.clone();
            }
            if let Some(id) = outcome.remap.get(&l.target) {
                l.target = id.clone();
            }
            l
        })
        .filter(|l| l.source != l.target)
        .collect();

    let mut merged = Graph {
        nodes: outcome.entities,
        links: dedupe_links(links),
        metadata: graph.metadata.clone(),
    };
    merged.refresh_counts();
    merged
}

fn set_documents(entity: &mut Entity, docs: BTreeSet<String>) {
    if docs.is_empty() {
        return;
    }
    entity.properties.remove("document");
    entity.properties.insert(
        "documents".into(),
        Value::Array(docs.into_iter().map(Value::String).collect()),
    );
}

/// Folds a fresh extraction into an existing snapshot: nodes by id with max
/// weight and property union, a merged `documents` provenance list, links by
/// identity triple with max weight. Metadata comes from `incoming`.
pub fn merge_graphs(existing: &Graph, incoming: &Graph) -> Graph {
    let mut nodes: Vec<Entity> = existing.nodes.clone();
    for node in nodes.iter_mut() {
        let docs = node.documents();
        set_documents(node, docs);
    }
    let mut index: HashMap<String, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();

    for node in &incoming.nodes {
        match index.get(&node.id) {
            Some(&i) => {
                let current = &mut nodes[i];
                let mut docs = current.documents();
                docs.extend(node.documents());
                current.weight = current.weight.max(node.weight);
                for (k, v) in &node.properties {
                    current.properties.entry(k.clone()).or_insert_with(|| v.clone());
                }
                set_documents(current, docs);
            }
            None => {
                let mut fresh = node.clone();
                let docs = fresh.documents();
                set_documents(&mut fresh, docs);
                index.insert(fresh.id.clone(), nodes.len());
                nodes.push(fresh);
            }
        }
    }

    let mut links = existing.links.clone();
    links.extend(incoming.links.iter().cloned());

    let mut metadata = incoming.metadata.clone();
    metadata.generated_at = existing.metadata.generated_at.min(incoming.metadata.generated_at);
    metadata.change_count = existing.metadata.change_count;

    let mut merged = Graph {
        nodes,
        links: dedupe_links(links),
        metadata,
    };
    merged.refresh_counts();
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::entity::{category, NodeType};

    fn concept(name: &str, weight: f64) -> Entity {
        Entity::new(name, NodeType::Concept, category::KEY_PHRASE, weight)
    }

    #[test]
    fn test_similarity_components() {
        let a = concept("用户画像", 1.0);
        assert!((entity_similarity(&a, &a) - 1.0).abs() < 1e-9);
        let tool = Entity::new("用户画像", NodeType::Tool, category::TOOL, 1.0);
        assert!((entity_similarity(&a, &tool) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_merge_is_transitive() {
        // a~b and b~c, but a and c alone score only 0.7.
        let a = concept("abcdefghij", 1.0);
        let b = concept("abcdefgxyz", 2.0);
        let c = concept("abcdmnoxyz", 1.5);
        assert!(entity_similarity(&a, &c) < MERGE_THRESHOLD);
        let out = merge_entities_with_remap(vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].id, b.id);
        assert_eq!(out.entities[0].weight, 2.0);
        assert_eq!(out.remap.get(&a.id), Some(&b.id));
        assert_eq!(out.remap.get(&c.id), Some(&b.id));
    }

    #[test]
    fn test_merge_idempotent_on_distinct_entities() {
        let entities = vec![concept("pricing", 1.0), concept("retention", 2.0), concept("数据", 1.0)];
        let once = merge_entities(entities.clone());
        assert_eq!(once, entities);
        assert_eq!(merge_entities(once.clone()), once);
    }

    #[test]
    fn test_merge_graph_rewires_links() {
        let a = concept("recommendation", 1.0);
        let b = concept("recommendations", 2.0);
        let c = concept("ranking", 1.0);
        let graph = Graph::new(
            vec![a.clone(), b.clone(), c.clone()],
            vec![
                Relation::new(&a.id, &c.id, "used_for", 0.4),
                Relation::new(&b.id, &c.id, "used_for", 0.6),
                Relation::new(&a.id, &b.id, "related_to", 0.9),
            ],
        );
        let merged = merge_graph_entities(&graph);
        assert_eq!(merged.nodes.len(), 2);
        assert_eq!(merged.links.len(), 1);
        assert_eq!(merged.links[0].source, b.id);
        assert_eq!(merged.links[0].weight, 0.6);
    }

    #[test]
    fn test_merge_graphs_tracks_documents() {
        let first = concept("pricing", 1.0).with_property("document", "a.txt");
        let again = concept("pricing", 2.0).with_property("document", "b.txt");
        let existing = Graph::new(vec![first], Vec::new());
        let incoming = Graph::new(vec![again], Vec::new());
        let merged = merge_graphs(&existing, &incoming);
        assert_eq!(merged.nodes.len(), 1);
        assert_eq!(merged.nodes[0].weight, 2.0);
        let docs: Vec<_> = merged.nodes[0].documents().into_iter().collect();
        assert_eq!(docs, vec!["a.txt", "b.txt"]);
        assert!(!merged.nodes[0].properties.contains_key("document"));
    }
}
