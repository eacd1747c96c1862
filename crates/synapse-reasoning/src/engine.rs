use tokio::sync::Mutex;
use tracing::{debug, instrument};

use synapse_core::entity::Graph;
use synapse_core::error::Result;
use synapse_core::reasoning::{
    Analogy, CausalAnalysis, ImplicitRelation, ReasoningPath, ReverseReasoning, StructuralAnomaly,
};

use crate::causal::build_causal_chains;
use crate::inference::{analogical_reasoning, reverse_reasoning};
use crate::paths::{find_multi_hop_paths, graph_fingerprint, PathCache, PathKey, MAX_HOPS_LIMIT};
use crate::patterns::{detect_anomalies, mine_implicit_relations};

pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Reasoning strategies over a graph value. The only shared state is the
/// bounded path cache; every other strategy is a pure function of its input.
pub struct ReasoningEngine {
    cache: Mutex<PathCache>,
}

impl Default for ReasoningEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ReasoningEngine {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cache: Mutex::new(PathCache::new(cache_capacity)),
        }
    }

    #[instrument(skip(self, graph), fields(nodes = graph.nodes.len()))]
    pub async fn find_multi_hop_paths(
        &self,
        graph: &Graph,
        start_id: &str,
        end_id: &str,
        max_hops: usize,
    ) -> Vec<ReasoningPath> {
        let key = PathKey {
            start: start_id.to_string(),
            end: end_id.to_string(),
            max_hops: max_hops.min(MAX_HOPS_LIMIT),
            fingerprint: graph_fingerprint(graph),
        };
        if let Some(hit) = self.cache.lock().await.get(&key) {
            debug!("Path cache hit");
            return hit;
        }

        // Recomputing the same key concurrently is harmless; the last insert wins.
        let paths = find_multi_hop_paths(graph, start_id, end_id, max_hops);
        debug!(paths = paths.len(), "Path search complete");
        self.cache.lock().await.insert(key, paths.clone());
        paths
    }

    pub async fn cached_queries(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub fn build_causal_chains(&self, graph: &Graph, text: &str) -> CausalAnalysis {
        build_causal_chains(graph, text)
    }

    pub fn reverse_reasoning(&self, graph: &Graph, effect_id: &str, max_depth: usize) -> Result<ReverseReasoning> {
        reverse_reasoning(graph, effect_id, max_depth)
    }

    pub fn analogical_reasoning(&self, graph: &Graph, source_id: &str, target_category: &str) -> Result<Vec<Analogy>> {
        analogical_reasoning(graph, source_id, target_category)
    }

    pub fn detect_anomalies(&self, graph: &Graph) -> Vec<StructuralAnomaly> {
        detect_anomalies(graph)
    }

    pub fn mine_implicit_relations(&self, graph: &Graph) -> Vec<ImplicitRelation> {
        mine_implicit_relations(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::entity::{category, Entity, NodeType, Relation};

    #[tokio::test]
    async fn test_paths_are_cached_per_graph() {
        let a = Entity::new("a", NodeType::Concept, category::KEY_PHRASE, 1.0);
        let b = Entity::new("b", NodeType::Concept, category::KEY_PHRASE, 1.0);
        let graph = Graph::new(vec![a.clone(), b.clone()], vec![Relation::new(&a.id, &b.id, "used_for", 0.7)]);
        let engine = ReasoningEngine::new(4);

        let first = engine.find_multi_hop_paths(&graph, &a.id, &b.id, 3).await;
        let second = engine.find_multi_hop_paths(&graph, &a.id, &b.id, 3).await;
        assert_eq!(first, second);
        assert_eq!(engine.cached_queries().await, 1);

        let mut changed = graph.clone();
        changed.links[0].weight = 0.2;
        let third = engine.find_multi_hop_paths(&changed, &a.id, &b.id, 3).await;
        assert_eq!(third[0].confidence, 0.2);
        assert_eq!(engine.cached_queries().await, 2);
    }
}
