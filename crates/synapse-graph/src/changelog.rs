use std::collections::VecDeque;

use chrono::Utc;
use uuid::Uuid;

use synapse_core::delta::{ChangeLogEntry, GraphDelta};

/// Entries kept before the oldest are evicted.
pub const CHANGE_LOG_CAPACITY: usize = 100;

/// Bounded history of applied deltas, most recent first.
#[derive(Debug)]
pub struct ChangeLog {
    entries: VecDeque<ChangeLogEntry>,
    capacity: usize,
}

impl Default for ChangeLog {
    fn default() -> Self {
        Self::with_capacity(CHANGE_LOG_CAPACITY)
    }
}

impl ChangeLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, graph_id: Option<&str>, delta: GraphDelta) -> ChangeLogEntry {
        let entry = ChangeLogEntry {
            timestamp: Utc::now(),
            change_id: Uuid::new_v4().to_string(),
            graph_id: graph_id.map(str::to_string),
            summary: delta.summary(),
            delta,
        };
        self.entries.push_front(entry.clone());
        self.entries.truncate(self.capacity);
        entry
    }

    pub fn recent(&self, limit: usize) -> Vec<ChangeLogEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::compute_delta;
    use synapse_core::entity::Graph;

    #[test]
    fn test_eviction_keeps_most_recent_first() {
        let mut log = ChangeLog::with_capacity(3);
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(log.record(Some("g"), compute_delta(&Graph::default(), None)).change_id);
        }
        assert_eq!(log.len(), 3);
        let recent: Vec<_> = log.recent(10).into_iter().map(|e| e.change_id).collect();
        assert_eq!(recent, vec![ids[4].clone(), ids[3].clone(), ids[2].clone()]);
        assert_eq!(log.recent(1).len(), 1);
    }
}
