use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, Relation};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeltaType {
    Initial,
    Incremental,
}

/// Structured difference between two graph snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphDelta {
    #[serde(rename = "type")]
    pub delta_type: DeltaType,
    pub added_nodes: Vec<Entity>,
    pub modified_nodes: Vec<Entity>,
    pub deleted_nodes: Vec<Entity>,
    pub added_links: Vec<Relation>,
    pub modified_links: Vec<Relation>,
    pub deleted_links: Vec<Relation>,
    pub computed_at: DateTime<Utc>,
}

impl GraphDelta {
    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            added_nodes: self.added_nodes.len(),
            modified_nodes: self.modified_nodes.len(),
            deleted_nodes: self.deleted_nodes.len(),
            added_links: self.added_links.len(),
            modified_links: self.modified_links.len(),
            deleted_links: self.deleted_links.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.summary().total() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeSummary {
    pub added_nodes: usize,
    pub modified_nodes: usize,
    pub deleted_nodes: usize,
    pub added_links: usize,
    pub modified_links: usize,
    pub deleted_links: usize,
}

impl ChangeSummary {
    pub fn total(&self) -> usize {
        self.added_nodes
            + self.modified_nodes
            + self.deleted_nodes
            + self.added_links
            + self.modified_links
            + self.deleted_links
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeLogEntry {
    pub timestamp: DateTime<Utc>,
    pub change_id: String,
    pub graph_id: Option<String>,
    pub summary: ChangeSummary,
    pub delta: GraphDelta,
}
