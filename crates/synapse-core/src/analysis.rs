use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reasoning::{CausalAnalysis, ImplicitRelation, ReasoningPath, StructuralAnomaly};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CentralityScore {
    pub id: String,
    pub name: String,
    pub degree: usize,
    pub in_degree: usize,
    pub out_degree: usize,
    pub normalized_degree: f64,
    pub betweenness: Option<f64>,
    pub pagerank: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Community {
    pub id: usize,
    pub members: Vec<String>,
    pub member_names: Vec<String>,
    pub dominant_category: String,
    /// Mean internal edge weight x 0.6 + dominant-category ratio x 0.4.
    pub coherence: f64,
    pub theme: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PathAnalysis {
    pub key_nodes: Vec<String>,
    pub paths: Vec<ReasoningPath>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HiddenPatterns {
    pub anomalies: Vec<StructuralAnomaly>,
    pub implicit_relations: Vec<ImplicitRelation>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    IsolatedConcept,
    WeaklyConnected,
    DisconnectedCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeGap {
    pub kind: GapKind,
    pub description: String,
    pub node_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrossDocConnection {
    pub node_id: String,
    pub name: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsBackendKind {
    Accelerated,
    #[default]
    InMemory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub link_count: usize,
    pub density: f64,
    pub average_degree: f64,
    pub node_types: BTreeMap<String, usize>,
    pub categories: BTreeMap<String, usize>,
    pub relation_types: BTreeMap<String, usize>,
    pub backend: AnalyticsBackendKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub graph_id: String,
    pub centrality: Vec<CentralityScore>,
    pub communities: Vec<Community>,
    pub path_analysis: PathAnalysis,
    pub causal_analysis: CausalAnalysis,
    pub hidden_patterns: HiddenPatterns,
    pub knowledge_gaps: Vec<KnowledgeGap>,
    pub cross_doc_connections: Vec<CrossDocConnection>,
    pub insights: Vec<String>,
    pub statistics: GraphStatistics,
}
