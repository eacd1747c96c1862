use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::{CentralityScore, Community};
use crate::entity::Graph;
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreStatistics {
    pub node_count: u64,
    pub link_count: u64,
}

/// Optional external graph store used to persist graphs and accelerate
/// analytics. Every method is keyed by graph id; distinct ids never share
/// nodes.
#[async_trait]
pub trait GraphAccelerator: Send + Sync {
    /// Liveness probe, checked at call time before delegating.
    async fn is_available(&self) -> bool;
    async fn store_graph(&self, graph_id: &str, graph: &Graph) -> Result<()>;
    async fn load_graph(&self, graph_id: &str) -> Result<Option<Graph>>;
    async fn centrality(&self, graph_id: &str) -> Result<Vec<CentralityScore>>;
    async fn communities(&self, graph_id: &str) -> Result<Vec<Community>>;
    async fn statistics(&self, graph_id: &str) -> Result<StoreStatistics>;
}
