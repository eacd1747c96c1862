pub mod analyzer;
pub mod backend;
pub mod centrality;
pub mod communities;
pub mod concept_paths;
pub mod insights;

pub use analyzer::GraphAnalyzer;
pub use backend::{select_backend, AcceleratedBackend, AnalyticsBackend, InMemoryBackend};
pub use centrality::degree_centrality;
pub use communities::detect_communities;
pub use concept_paths::analyze_concept_paths;
pub use insights::{cross_document_connections, find_knowledge_gaps, generate_insights, graph_statistics};
