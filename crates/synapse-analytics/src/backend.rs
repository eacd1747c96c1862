use std::sync::Arc;

use async_trait::async_trait;

use synapse_core::analysis::{AnalyticsBackendKind, CentralityScore, Community};
use synapse_core::entity::Graph;
use synapse_core::error::Result;
use synapse_core::graph::GraphAccelerator;

use crate::centrality::degree_centrality;
use crate::communities::{describe_community, detect_communities};

/// Centrality and community algorithms behind one interface. The engine
/// picks an implementation per call from a liveness probe.
#[async_trait]
pub trait AnalyticsBackend: Send + Sync {
    fn kind(&self) -> AnalyticsBackendKind;

    /// Makes `graph` available to the backend under `graph_id`.
    async fn prepare(&self, _graph_id: &str, _graph: &Graph) -> Result<()> {
        Ok(())
    }

    async fn centrality(&self, graph_id: &str, graph: &Graph) -> Result<Vec<CentralityScore>>;
    async fn communities(&self, graph_id: &str, graph: &Graph) -> Result<Vec<Community>>;
}

/// Degree centrality and threshold-connectivity communities, computed on the
/// graph value itself.
pub struct InMemoryBackend;

#[async_trait]
impl AnalyticsBackend for InMemoryBackend {
    fn kind(&self) -> AnalyticsBackendKind {
        AnalyticsBackendKind::InMemory
    }

    async fn centrality(&self, _graph_id: &str, graph: &Graph) -> Result<Vec<CentralityScore>> {
        Ok(degree_centrality(graph))
    }

    async fn communities(&self, _graph_id: &str, graph: &Graph) -> Result<Vec<Community>> {
        Ok(detect_communities(graph))
    }
}

/// Delegates to a graph accelerator. Communities come back as bare member
/// lists and are annotated against the in-memory graph.
pub struct AcceleratedBackend {
    accelerator: Arc<dyn GraphAccelerator>,
}

impl AcceleratedBackend {
    pub fn new(accelerator: Arc<dyn GraphAccelerator>) -> Self {
        Self { accelerator }
    }
}

#[async_trait]
impl AnalyticsBackend for AcceleratedBackend {
    fn kind(&self) -> AnalyticsBackendKind {
        AnalyticsBackendKind::Accelerated
    }

    async fn prepare(&self, graph_id: &str, graph: &Graph) -> Result<()> {
        self.accelerator.store_graph(graph_id, graph).await
    }

    async fn centrality(&self, graph_id: &str, _graph: &Graph) -> Result<Vec<CentralityScore>> {
        self.accelerator.centrality(graph_id).await
    }

    async fn communities(&self, graph_id: &str, graph: &Graph) -> Result<Vec<Community>> {
        let raw = self.accelerator.communities(graph_id).await?;
        Ok(raw
            .into_iter()
            .map(|c| describe_community(graph, c.id, c.members))
            .collect())
    }
}

/// Accelerated backend when an accelerator is configured and answers its
/// probe, in-memory otherwise.
pub async fn select_backend(accelerator: Option<&Arc<dyn GraphAccelerator>>) -> Arc<dyn AnalyticsBackend> {
    if let Some(accelerator) = accelerator {
        if accelerator.is_available().await {
            return Arc::new(AcceleratedBackend::new(Arc::clone(accelerator)));
        }
        tracing::debug!("Graph accelerator unavailable, using in-memory analytics");
    }
    Arc::new(InMemoryBackend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::graph::StoreStatistics;

    struct DownAccelerator;

    #[async_trait]
    impl GraphAccelerator for DownAccelerator {
        async fn is_available(&self) -> bool {
            false
        }
        async fn store_graph(&self, _: &str, _: &Graph) -> Result<()> {
            unreachable!()
        }
        async fn load_graph(&self, _: &str) -> Result<Option<Graph>> {
            unreachable!()
        }
        async fn centrality(&self, _: &str) -> Result<Vec<CentralityScore>> {
            unreachable!()
        }
        async fn communities(&self, _: &str) -> Result<Vec<Community>> {
            unreachable!()
        }
        async fn statistics(&self, _: &str) -> Result<StoreStatistics> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_selects_in_memory_without_live_accelerator() {
        assert_eq!(select_backend(None).await.kind(), AnalyticsBackendKind::InMemory);
        let down: Arc<dyn GraphAccelerator> = Arc::new(DownAccelerator);
        assert_eq!(select_backend(Some(&down)).await.kind(), AnalyticsBackendKind::InMemory);
    }
}
