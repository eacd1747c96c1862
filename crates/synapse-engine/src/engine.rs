use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use synapse_analytics::GraphAnalyzer;
use synapse_core::analysis::AnalysisResult;
use synapse_core::config::EngineConfig;
use synapse_core::delta::ChangeLogEntry;
use synapse_core::domain::{DomainRegistry, REGISTRY_VERSION};
use synapse_core::entity::Graph;
use synapse_core::error::{Result, SynapseError};
use synapse_core::extraction::ExtractionOptions;
use synapse_core::graph::GraphAccelerator;
use synapse_extraction::lexicon::LEXICON_VERSION;
use synapse_extraction::{validate_extraction, ExtractionPipeline, ExtractionValidation};
use synapse_graph::{merge_graph_entities, merge_graphs, GraphStateManager, GraphUpdate, Neo4jAccelerator};
use synapse_reasoning::ReasoningEngine;

/// Versions of the data tables extraction runs on, plus the domain keys.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DomainListing {
    pub registry_version: &'static str,
    pub lexicon_version: &'static str,
    pub domains: Vec<String>,
}

/// Library facade over extraction, graph state, reasoning and analytics.
/// Cheap to share behind an `Arc`; every per-call choice (domain, graph id)
/// is passed in explicitly.
pub struct KnowledgeEngine {
    pipeline: ExtractionPipeline,
    state: GraphStateManager,
    reasoning: Arc<ReasoningEngine>,
    analyzer: GraphAnalyzer,
    accelerator: Option<Arc<dyn GraphAccelerator>>,
    auto_detect: bool,
}

impl KnowledgeEngine {
    pub fn new(
        pipeline: ExtractionPipeline,
        reasoning: Arc<ReasoningEngine>,
        accelerator: Option<Arc<dyn GraphAccelerator>>,
    ) -> Self {
        let analyzer = GraphAnalyzer::new(Arc::clone(&reasoning), accelerator.clone());
        Self {
            pipeline,
            state: GraphStateManager::new(),
            reasoning,
            analyzer,
            accelerator,
            auto_detect: true,
        }
    }

    /// Pattern recognizer, built-in domains, no accelerator.
    pub fn in_memory() -> Self {
        let config = EngineConfig::default();
        Self::new(
            ExtractionPipeline::from_config(&config, Arc::new(DomainRegistry::builtin())),
            Arc::new(ReasoningEngine::new(config.path_cache_capacity)),
            None,
        )
    }

    /// Connects the Neo4j accelerator when one is configured. A failed
    /// connection leaves the engine in in-memory mode.
    pub async fn from_config(config: &EngineConfig) -> Self {
        let accelerator: Option<Arc<dyn GraphAccelerator>> = match &config.accelerator {
            Some(settings) => {
                let neo4j = Neo4jAccelerator::new(settings).await;
                if neo4j.is_connected() {
                    Some(Arc::new(neo4j) as Arc<dyn GraphAccelerator>)
                } else {
                    None
                }
            }
            None => None,
        };
        info!(
            accelerated = accelerator.is_some(),
            default_domain = %config.default_domain,
            "Knowledge engine initialised"
        );

        let mut engine = Self::new(
            ExtractionPipeline::from_config(config, Arc::new(DomainRegistry::builtin())),
            Arc::new(ReasoningEngine::new(config.path_cache_capacity)),
            accelerator,
        );
        engine.auto_detect = config.auto_detect_domain;
        engine
    }

    pub fn registry(&self) -> &DomainRegistry {
        self.pipeline.registry()
    }

    pub fn reasoning(&self) -> &ReasoningEngine {
        &self.reasoning
    }

    pub fn domain_listing(&self) -> DomainListing {
        DomainListing {
            registry_version: REGISTRY_VERSION,
            lexicon_version: LEXICON_VERSION,
            domains: self.registry().keys(),
        }
    }

    /// Options carrying the configured auto-detect default.
    pub fn default_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            auto_detect: self.auto_detect,
            ..ExtractionOptions::default()
        }
    }

    /// Text quality problems come back in `metadata.error`, never as `Err`.
    #[instrument(skip(self, text, options), fields(text_len = text.len(), domain = ?options.domain))]
    pub async fn extract_entities_and_relations(&self, text: &str, options: &ExtractionOptions) -> Graph {
        self.pipeline.extract(text, options).await
    }

    pub fn validate_extraction(&self, graph: &Graph, text: &str) -> ExtractionValidation {
        validate_extraction(graph, text)
    }

    #[instrument(skip(self, graph, text_content))]
    pub async fn analyze_graph(&self, graph: &Graph, graph_id: &str, text_content: &str) -> AnalysisResult {
        self.analyzer.analyze_graph(graph, graph_id, text_content).await
    }

    /// Extracts `text`, merges it into the graph stored under
    /// `existing_graph_id` (a fresh id when `None`), collapses similar
    /// entities and commits the result. Text that fails the quality guard is
    /// an `InvalidInput` error since nothing can be merged.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn update_graph(&self, text: &str, existing_graph_id: Option<&str>) -> Result<GraphUpdate> {
        let graph_id = existing_graph_id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let options = ExtractionOptions {
            document: Some(format!("doc-{}", Uuid::new_v4())),
            ..self.default_options()
        };
        let incoming = self.pipeline.extract(text, &options).await;
        if let Some(issue) = incoming.metadata.error {
            warn!(graph_id = %graph_id, ?issue, "Update text rejected");
            return Err(SynapseError::InvalidInput(format!("update text rejected: {:?}", issue)));
        }

        let merged = match self.existing_graph(&graph_id).await {
            Some(existing) => merge_graph_entities(&merge_graphs(&existing, &incoming)),
            None => merge_graph_entities(&incoming),
        };
        let update = self.state.commit(&graph_id, merged).await;

        if let Some(accelerator) = &self.accelerator {
            if let Err(e) = accelerator.store_graph(&graph_id, &update.graph).await {
                warn!(graph_id = %graph_id, error = %e, "Failed to persist graph to accelerator");
            }
        }
        Ok(update)
    }

    /// In-memory snapshot first, then the accelerator's copy.
    async fn existing_graph(&self, graph_id: &str) -> Option<Graph> {
        if let Some(graph) = self.state.snapshot(graph_id).await {
            return Some(graph);
        }
        let accelerator = self.accelerator.as_ref()?;
        match accelerator.load_graph(graph_id).await {
            Ok(graph) => graph,
            Err(e) => {
                warn!(graph_id, error = %e, "Failed to load graph from accelerator");
                None
            }
        }
    }

    pub async fn graph(&self, graph_id: &str) -> Option<Graph> {
        self.state.snapshot(graph_id).await
    }

    pub async fn graph_ids(&self) -> Vec<String> {
        self.state.graph_ids().await
    }

    /// Most recent entries first, at most `limit`.
    pub async fn get_change_history(&self, limit: usize) -> Vec<ChangeLogEntry> {
        self.state.history(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::delta::DeltaType;

    const FIRST: &str = "ROI是数字营销的核心指标，内容营销通过用户画像提升转化率";
    const SECOND: &str = "SEO优化能够提升品牌曝光，数字营销团队使用Google Analytics分析流量";

    #[tokio::test]
    async fn test_update_graph_merges_into_snapshot() {
        let engine = KnowledgeEngine::in_memory();
        let first = engine.update_graph(FIRST, None).await.unwrap();
        assert_eq!(first.delta.delta_type, DeltaType::Initial);
        assert!(!first.graph.nodes.is_empty());

        let second = engine.update_graph(SECOND, Some(&first.graph_id)).await.unwrap();
        assert_eq!(second.graph_id, first.graph_id);
        assert_eq!(second.delta.delta_type, DeltaType::Incremental);
        assert_eq!(second.graph.metadata.change_count, 1);
        assert_eq!(engine.get_change_history(10).await.len(), 2);
    }

    #[test]
    fn test_domain_listing_carries_table_versions() {
        let listing = KnowledgeEngine::in_memory().domain_listing();
        assert_eq!(listing.registry_version, REGISTRY_VERSION);
        assert_eq!(listing.lexicon_version, LEXICON_VERSION);
        assert!(listing.domains.iter().any(|d| d == "marketing"));
    }

    #[tokio::test]
    async fn test_rejected_update_is_an_error() {
        let engine = KnowledgeEngine::in_memory();
        let err = engine.update_graph("too short", None).await.unwrap_err();
        assert!(matches!(err, SynapseError::InvalidInput(_)));
        assert!(engine.get_change_history(10).await.is_empty());
    }
}
