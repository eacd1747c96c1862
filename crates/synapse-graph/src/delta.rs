use std::collections::{HashMap, HashSet};

use chrono::Utc;

use synapse_core::delta::{DeltaType, GraphDelta};
use synapse_core::entity::{Entity, Graph, LinkKey, Relation};

fn node_changed(old: &Entity, new: &Entity) -> bool {
    serde_json::to_value(old).ok() != serde_json::to_value(new).ok()
}

fn link_changed(old: &Relation, new: &Relation) -> bool {
    old.weight.to_bits() != new.weight.to_bits() || old.properties != new.properties
}

/// Classifies the transition `old -> new`. Nodes are identified by id and
/// links by `(source, target, type)`; with no prior snapshot everything is
/// added.
pub fn compute_delta(new: &Graph, old: Option<&Graph>) -> GraphDelta {
    let mut delta = GraphDelta {
        delta_type: DeltaType::Initial,
        added_nodes: Vec::new(),
        modified_nodes: Vec::new(),
        deleted_nodes: Vec::new(),
        added_links: Vec::new(),
        modified_links: Vec::new(),
        deleted_links: Vec::new(),
        computed_at: Utc::now(),
    };

    let Some(old) = old else {
        delta.added_nodes = new.nodes.clone();
        delta.added_links = new.links.clone();
        return delta;
    };
    delta.delta_type = DeltaType::Incremental;

    let old_nodes: HashMap<&str, &Entity> = old.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    let new_ids: HashSet<&str> = new.nodes.iter().map(|n| n.id.as_str()).collect();
    for node in &new.nodes {
        match old_nodes.get(node.id.as_str()) {
            None => delta.added_nodes.push(node.clone()),
            Some(prev) if node_changed(prev, node) => delta.modified_nodes.push(node.clone()),
            Some(_) => {}
        }
    }
    delta.deleted_nodes = old
        .nodes
        .iter()
        .filter(|n| !new_ids.contains(n.id.as_str()))
        .cloned()
        .collect();

    let old_links: HashMap<LinkKey, &Relation> = old.links.iter().map(|l| (l.key(), l)).collect();
    let new_keys: HashSet<LinkKey> = new.links.iter().map(Relation::key).collect();
    for link in &new.links {
        match old_links.get(&link.key()) {
            None => delta.added_links.push(link.clone()),
            Some(prev) if link_changed(prev, link) => delta.modified_links.push(link.clone()),
            Some(_) => {}
        }
    }
    delta.deleted_links = old
        .links
        .iter()
        .filter(|l| !new_keys.contains(&l.key()))
        .cloned()
        .collect();

    delta
}

/// Applies `delta` to `graph`. Applying `compute_delta(g2, Some(g1))` to `g1`
/// reproduces the node and link sets of `g2`.
pub fn apply_delta(graph: &Graph, delta: &GraphDelta) -> Graph {
    let deleted: HashSet<&str> = delta.deleted_nodes.iter().map(|n| n.id.as_str()).collect();
    let mut nodes: Vec<Entity> = graph
        .nodes
        .iter()
        .filter(|n| !deleted.contains(n.id.as_str()))
        .cloned()
        .collect();
    let mut node_index: HashMap<String, usize> =
        nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();
    for node in delta.modified_nodes.iter().chain(&delta.added_nodes) {
        match node_index.get(&node.id) {
            Some(&i) => nodes[i] = node.clone(),
            None => {
                node_index.insert(node.id.clone(), nodes.len());
                nodes.push(node.clone());
            }
        }
    }

    let deleted_links: HashSet<LinkKey> = delta.deleted_links.iter().map(Relation::key).collect();
    let mut links: Vec<Relation> = graph
        .links
        .iter()
        .filter(|l| !deleted_links.contains(&l.key()))
        .cloned()
        .collect();
    let mut link_index: HashMap<LinkKey, usize> =
        links.iter().enumerate().map(|(i, l)| (l.key(), i)).collect();
    for link in delta.modified_links.iter().chain(&delta.added_links) {
        match link_index.get(&link.key()) {
            Some(&i) => links[i] = link.clone(),
            None => {
                link_index.insert(link.key(), links.len());
                links.push(link.clone());
            }
        }
    }

    let mut metadata = graph.metadata.clone();
    metadata.updated_at = Some(Utc::now());
    metadata.change_count += 1;

    let mut applied = Graph { nodes, links, metadata };
    applied.refresh_counts();
    applied
}
