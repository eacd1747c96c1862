//! Multi-hop path search between two entities.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use synapse_core::entity::Graph;
use synapse_core::numeric::{clamp_unit, round_to, safe_div, safe_number};
use synapse_core::reasoning::ReasoningPath;

use crate::view::GraphView;

/// Hop budgets above this are clamped.
pub const MAX_HOPS_LIMIT: usize = 6;
/// Completed paths enumerated before the search stops.
pub const MAX_ENUMERATED_PATHS: usize = 5_000;
/// DFS steps taken before the search stops, whether or not paths were found.
pub const MAX_EXPANSIONS: usize = 200_000;
/// Paths returned per query.
pub const TOP_PATHS: usize = 10;

struct Search<'a, 'g> {
    view: &'a GraphView<'g>,
    end: usize,
    max_nodes: usize,
    /// Hop distance of each node to `end`.
    to_end: Vec<usize>,
    expansions: usize,
    stack: Vec<usize>,
    edges: Vec<(f64, &'g str)>,
    on_path: Vec<bool>,
    found: Vec<ReasoningPath>,
}

impl Search<'_, '_> {
    fn exhausted(&self) -> bool {
        self.found.len() >= MAX_ENUMERATED_PATHS || self.expansions >= MAX_EXPANSIONS
    }

    fn walk(&mut self, current: usize) {
        if self.exhausted() {
            return;
        }
        if current == self.end {
            let path = self.complete();
            self.found.push(path);
            return;
        }
        if self.stack.len() >= self.max_nodes {
            return;
        }
        let hops_left = self.max_nodes - 1 - self.stack.len();
        let view = self.view;
        for edge in view.neighbors(current) {
            if self.on_path[edge.to] || self.to_end[edge.to] > hops_left {
                continue;
            }
            self.expansions += 1;
            self.on_path[edge.to] = true;
            self.stack.push(edge.to);
            self.edges.push((edge.weight, edge.relation_type));
            self.walk(edge.to);
            self.edges.pop();
            self.stack.pop();
            self.on_path[edge.to] = false;
            if self.exhausted() {
                return;
            }
        }
    }

    fn complete(&self) -> ReasoningPath {
        let view = self.view;
        let mut raw = 0.0;
        for (i, (edge_weight, _)) in self.edges.iter().enumerate() {
            raw += view.weight(self.stack[i]) * view.weight(self.stack[i + 1]) * edge_weight;
        }
        let penalty = self.stack.len().saturating_sub(2).max(1) as f64;
        let mean_edge = safe_div(
            self.edges.iter().map(|(w, _)| w).sum(),
            self.edges.len() as f64,
            0.0,
        );

        let node_names: Vec<String> = self.stack.iter().map(|&i| view.node(i).name.clone()).collect();
        let mut justification = node_names[0].clone();
        for (i, (_, relation_type)) in self.edges.iter().enumerate() {
            justification.push_str(&format!(" --{}--> {}", relation_type, node_names[i + 1]));
        }

        ReasoningPath {
            nodes: self.stack.iter().map(|&i| view.node(i).id.clone()).collect(),
            node_names,
            relation_types: self.edges.iter().map(|(_, t)| t.to_string()).collect(),
            score: round_to(safe_number(raw / penalty, 0.0), 4),
            confidence: round_to(clamp_unit(mean_edge), 4),
            justification,
        }
    }
}

/// Depth-bounded DFS over the undirected graph, expanding heavier edges
/// first. Paths are scored by `sum(w_i * w_i+1 * e_i) / max(1, L - 2)` and
/// the best ten by `score * confidence` are returned.
pub fn find_multi_hop_paths(graph: &Graph, start_id: &str, end_id: &str, max_hops: usize) -> Vec<ReasoningPath> {
    let view = GraphView::new(graph);
    let (Some(start), Some(end)) = (view.index_of(start_id), view.index_of(end_id)) else {
        return Vec::new();
    };
    let hops = max_hops.min(MAX_HOPS_LIMIT);
    if start == end || hops == 0 {
        return Vec::new();
    }
    let to_end = view.hop_distances(end);
    if to_end[start] > hops {
        return Vec::new();
    }

    let mut on_path = vec![false; view.len()];
    on_path[start] = true;
    let mut search = Search {
        view: &view,
        end,
        max_nodes: hops + 1,
        to_end,
        expansions: 0,
        stack: vec![start],
        edges: Vec::new(),
        on_path,
        found: Vec::new(),
    };
    search.walk(start);

    if search.exhausted() {
        tracing::debug!(start = start_id, end = end_id, expansions = search.expansions, "Path enumeration capped");
    }
    let mut paths = search.found;
    paths.sort_by(|a, b| b.rank().total_cmp(&a.rank()).then(a.nodes.len().cmp(&b.nodes.len())));
    paths.truncate(TOP_PATHS);
    paths
}

/// Fingerprint of the parts of a graph path search depends on.
pub fn graph_fingerprint(graph: &Graph) -> u64 {
    let mut hasher = DefaultHasher::new();
    for node in &graph.nodes {
        node.id.hash(&mut hasher);
        node.weight.to_bits().hash(&mut hasher);
    }
    for link in &graph.links {
        link.source.hash(&mut hasher);
        link.target.hash(&mut hasher);
        link.relation_type.hash(&mut hasher);
        link.weight.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey {
    pub start: String,
    pub end: String,
    pub max_hops: usize,
    pub fingerprint: u64,
}

/// Least-recently-used cache of path query results. Hits bump a per-entry
/// tick; inserts past capacity evict the entry with the oldest tick.
#[derive(Debug)]
pub struct PathCache {
    capacity: usize,
    tick: u64,
    entries: HashMap<PathKey, (u64, Vec<ReasoningPath>)>,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: 0,
            entries: HashMap::new(),
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn get(&mut self, key: &PathKey) -> Option<Vec<ReasoningPath>> {
        let tick = self.next_tick();
        let (last_used, paths) = self.entries.get_mut(key)?;
        *last_used = tick;
        Some(paths.clone())
    }

    pub fn insert(&mut self, key: PathKey, paths: Vec<ReasoningPath>) {
        let tick = self.next_tick();
        if self.entries.insert(key, (tick, paths)).is_some() {
            return;
        }
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (last_used, _))| *last_used)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    self.entries.remove(&k);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
