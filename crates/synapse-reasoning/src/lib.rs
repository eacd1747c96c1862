pub mod causal;
pub mod engine;
pub mod inference;
pub mod paths;
pub mod patterns;
pub mod view;

pub use causal::build_causal_chains;
pub use engine::ReasoningEngine;
pub use inference::{analogical_reasoning, reverse_reasoning};
pub use paths::{find_multi_hop_paths, PathCache};
pub use patterns::{detect_anomalies, mine_implicit_relations};
pub use view::GraphView;
