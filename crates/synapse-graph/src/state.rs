use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use synapse_core::delta::{ChangeLogEntry, GraphDelta};
use synapse_core::entity::Graph;

use crate::changelog::ChangeLog;
use crate::delta::{apply_delta, compute_delta};

/// Result of committing a new snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphUpdate {
    pub graph_id: String,
    pub change_id: String,
    pub graph: Graph,
    pub delta: GraphDelta,
}

/// Last snapshot per graph id plus the shared change log. Writers for the
/// same graph are serialized by the snapshot lock.
#[derive(Default)]
pub struct GraphStateManager {
    snapshots: RwLock<HashMap<String, Graph>>,
    log: RwLock<ChangeLog>,
}

impl GraphStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self, graph_id: &str) -> Option<Graph> {
        self.snapshots.read().await.get(graph_id).cloned()
    }

    pub async fn graph_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.snapshots.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Diffs `graph` against the stored snapshot, replaces the snapshot and
    /// logs the delta.
    pub async fn commit(&self, graph_id: &str, mut graph: Graph) -> GraphUpdate {
        let mut snapshots = self.snapshots.write().await;
        let previous = snapshots.get(graph_id);
        let delta = compute_delta(&graph, previous);

        if let Some(prev) = previous {
            graph.metadata.change_count = prev.metadata.change_count + 1;
            graph.metadata.updated_at = Some(delta.computed_at);
        }
        graph.refresh_counts();

        let summary = delta.summary();
        let entry = self.log.write().await.record(Some(graph_id), delta.clone());
        snapshots.insert(graph_id.to_string(), graph.clone());

        tracing::info!(
            graph_id,
            change_id = %entry.change_id,
            added_nodes = summary.added_nodes,
            modified_nodes = summary.modified_nodes,
            deleted_nodes = summary.deleted_nodes,
            "Graph snapshot committed"
        );

        GraphUpdate {
            graph_id: graph_id.to_string(),
            change_id: entry.change_id,
            graph,
            delta,
        }
    }

    /// Applies a delta to the stored snapshot (or an empty graph) and logs it.
    pub async fn apply_delta(&self, graph_id: &str, delta: GraphDelta) -> Graph {
        let mut snapshots = self.snapshots.write().await;
        let base = snapshots.get(graph_id).cloned().unwrap_or_default();
        let updated = apply_delta(&base, &delta);
        self.log.write().await.record(Some(graph_id), delta);
        snapshots.insert(graph_id.to_string(), updated.clone());
        updated
    }

    pub async fn history(&self, limit: usize) -> Vec<ChangeLogEntry> {
        self.log.read().await.recent(limit)
    }
}
