use std::sync::Arc;

use tracing::{info, instrument, warn};

use synapse_core::analysis::{AnalysisResult, AnalyticsBackendKind, HiddenPatterns};
use synapse_core::entity::Graph;
use synapse_core::graph::GraphAccelerator;
use synapse_reasoning::ReasoningEngine;

use crate::backend::{select_backend, AnalyticsBackend, InMemoryBackend};
use crate::concept_paths::analyze_concept_paths;
use crate::insights::{cross_document_connections, find_knowledge_gaps, generate_insights, graph_statistics};

/// Full analysis of one graph: centrality, communities, concept paths,
/// causal chains, hidden patterns, gaps and insights.
pub struct GraphAnalyzer {
    reasoning: Arc<ReasoningEngine>,
    accelerator: Option<Arc<dyn GraphAccelerator>>,
}

impl GraphAnalyzer {
    pub fn new(reasoning: Arc<ReasoningEngine>, accelerator: Option<Arc<dyn GraphAccelerator>>) -> Self {
        Self { reasoning, accelerator }
    }

    pub fn in_memory(reasoning: Arc<ReasoningEngine>) -> Self {
        Self::new(reasoning, None)
    }

    pub fn reasoning(&self) -> &ReasoningEngine {
        &self.reasoning
    }

    /// Never fails: accelerator errors fall back to the in-memory backend.
    #[instrument(skip(self, graph, text), fields(nodes = graph.nodes.len(), links = graph.links.len()))]
    pub async fn analyze_graph(&self, graph: &Graph, graph_id: &str, text: &str) -> AnalysisResult {
        let mut backend: Arc<dyn AnalyticsBackend> = select_backend(self.accelerator.as_ref()).await;
        if let Err(e) = backend.prepare(graph_id, graph).await {
            warn!(error = %e, "Failed to push graph to accelerator, using in-memory analytics");
            backend = Arc::new(InMemoryBackend);
        }
        let fallback = InMemoryBackend;
        let mut used = backend.kind();

        let centrality = match backend.centrality(graph_id, graph).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(error = %e, "Accelerated centrality failed, computing in-memory");
                used = AnalyticsBackendKind::InMemory;
                fallback.centrality(graph_id, graph).await.unwrap_or_default()
            }
        };
        let communities = match backend.communities(graph_id, graph).await {
            Ok(communities) => communities,
            Err(e) => {
                warn!(error = %e, "Accelerated community detection failed, computing in-memory");
                used = AnalyticsBackendKind::InMemory;
                fallback.communities(graph_id, graph).await.unwrap_or_default()
            }
        };

        let path_analysis = analyze_concept_paths(&self.reasoning, graph).await;
        let causal_analysis = self.reasoning.build_causal_chains(graph, text);
        let hidden_patterns = HiddenPatterns {
            anomalies: self.reasoning.detect_anomalies(graph),
            implicit_relations: self.reasoning.mine_implicit_relations(graph),
        };
        let knowledge_gaps = find_knowledge_gaps(graph);
        let cross_doc_connections = cross_document_connections(graph);
        let statistics = graph_statistics(graph, used);
        let insights = generate_insights(graph, &centrality, &communities, &statistics);

        info!(
            graph_id,
            backend = ?used,
            communities = communities.len(),
            paths = path_analysis.paths.len(),
            causal_chains = causal_analysis.chains.len(),
            "Graph analysis complete"
        );

        AnalysisResult {
            graph_id: graph_id.to_string(),
            centrality,
            communities,
            path_analysis,
            causal_analysis,
            hidden_patterns,
            knowledge_gaps,
            cross_doc_connections,
            insights,
            statistics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::analysis::{CentralityScore, Community};
    use synapse_core::entity::{category, Entity, NodeType, Relation};
    use synapse_core::error::{Result, SynapseError};
    use synapse_core::graph::StoreStatistics;

    /// Reports itself available but fails every query except centrality, which
    /// returns `centrality` when set.
    struct FlakyAccelerator {
        centrality: Option<Vec<CentralityScore>>,
    }

    #[async_trait::async_trait]
    impl GraphAccelerator for FlakyAccelerator {
        async fn is_available(&self) -> bool {
            true
        }
        async fn store_graph(&self, _: &str, _: &Graph) -> Result<()> {
            Ok(())
        }
        async fn load_graph(&self, _: &str) -> Result<Option<Graph>> {
            Ok(None)
        }
        async fn centrality(&self, _: &str) -> Result<Vec<CentralityScore>> {
            self.centrality
                .clone()
                .ok_or_else(|| SynapseError::Graph("boom".into()))
        }
        async fn communities(&self, _: &str) -> Result<Vec<Community>> {
            Err(SynapseError::Graph("boom".into()))
        }
        async fn statistics(&self, _: &str) -> Result<StoreStatistics> {
            Err(SynapseError::Graph("boom".into()))
        }
    }

    fn graph() -> Graph {
        let a = Entity::new("Python", NodeType::Tool, category::TOOL, 2.5);
        let b = Entity::new("数据分析", NodeType::Concept, category::CORE_CONCEPT, 3.0);
        Graph::new(vec![a.clone(), b.clone()], vec![Relation::new(&a.id, &b.id, "used_for", 0.8)])
    }

    #[tokio::test]
    async fn test_in_memory_analysis() {
        let analyzer = GraphAnalyzer::in_memory(Arc::new(ReasoningEngine::default()));
        let result = analyzer.analyze_graph(&graph(), "g1", "").await;
        assert_eq!(result.graph_id, "g1");
        assert_eq!(result.statistics.backend, AnalyticsBackendKind::InMemory);
        assert_eq!(result.centrality.len(), 2);
        assert_eq!(result.communities.len(), 1);
        assert_eq!(result.causal_analysis.relations.len(), 1);
        assert!(!result.insights.is_empty());
    }

    #[tokio::test]
    async fn test_accelerator_failure_falls_back() {
        let accelerator: Arc<dyn GraphAccelerator> = Arc::new(FlakyAccelerator { centrality: None });
        let analyzer = GraphAnalyzer::new(Arc::new(ReasoningEngine::default()), Some(accelerator));
        let result = analyzer.analyze_graph(&graph(), "g1", "").await;
        assert_eq!(result.statistics.backend, AnalyticsBackendKind::InMemory);
        assert_eq!(result.centrality.len(), 2);
        assert_eq!(result.communities.len(), 1);
    }

    #[tokio::test]
    async fn test_community_fallback_reports_in_memory() {
        let scores = crate::centrality::degree_centrality(&graph());
        let accelerator: Arc<dyn GraphAccelerator> = Arc::new(FlakyAccelerator {
            centrality: Some(scores.clone()),
        });
        let analyzer = GraphAnalyzer::new(Arc::new(ReasoningEngine::default()), Some(accelerator));
        let result = analyzer.analyze_graph(&graph(), "g1", "").await;
        assert_eq!(result.centrality, scores);
        assert_eq!(result.communities.len(), 1);
        assert_eq!(result.statistics.backend, AnalyticsBackendKind::InMemory);
    }
}
