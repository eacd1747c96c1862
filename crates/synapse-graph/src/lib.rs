pub mod changelog;
pub mod delta;
pub mod merge;
pub mod state;
pub mod store;

pub use changelog::{ChangeLog, CHANGE_LOG_CAPACITY};
pub use delta::{apply_delta, compute_delta};
pub use merge::{entity_similarity, merge_entities, merge_graph_entities, merge_graphs};
pub use state::{GraphStateManager, GraphUpdate};
pub use store::Neo4jAccelerator;
