use serde::{Deserialize, Serialize};

/// A scored multi-hop connection between two entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningPath {
    pub nodes: Vec<String>,
    pub node_names: Vec<String>,
    pub relation_types: Vec<String>,
    pub score: f64,
    /// Mean edge weight along the path, in `[0, 1]`.
    pub confidence: f64,
    pub justification: String,
}

impl ReasoningPath {
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn rank(&self) -> f64 {
        self.score * self.confidence
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CausalOrigin {
    Text,
    Graph,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CausalRelation {
    pub cause: String,
    pub effect: String,
    pub cause_name: String,
    pub effect_name: String,
    pub relation_type: String,
    pub confidence: f64,
    pub origin: CausalOrigin,
    pub evidence: Option<String>,
}

/// Causal relations where each effect is the next relation's cause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CausalChain {
    pub relations: Vec<CausalRelation>,
    pub confidence: f64,
}

impl CausalChain {
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.relations.iter().map(|r| r.cause.as_str()).collect();
        if let Some(last) = self.relations.last() {
            ids.push(last.effect.as_str());
        }
        ids
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CentralCause {
    pub id: String,
    pub name: String,
    pub occurrences: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CausalAnalysis {
    pub relations: Vec<CausalRelation>,
    pub chains: Vec<CausalChain>,
    pub central_causes: Vec<CentralCause>,
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PotentialCause {
    pub id: String,
    pub name: String,
    pub relation_type: String,
    pub confidence: f64,
    pub depth: usize,
    /// The node this cause acts through when found at depth > 1.
    pub via: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReverseReasoning {
    pub effect_id: String,
    pub effect_name: String,
    pub max_depth: usize,
    pub potential_causes: Vec<PotentialCause>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConceptualMapping {
    pub shared_connection_types: Vec<String>,
    pub source_unique: Vec<String>,
    pub target_unique: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analogy {
    pub source_id: String,
    pub target_id: String,
    pub target_name: String,
    pub similarity: f64,
    pub mapping: ConceptualMapping,
    pub predictions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Hub,
    IsolatedImportant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuralAnomaly {
    pub id: String,
    pub name: String,
    pub kind: AnomalyKind,
    pub degree: usize,
    pub weight: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImplicitRelation {
    pub source: String,
    pub target: String,
    pub source_name: String,
    pub target_name: String,
    pub shared_neighbors: Vec<String>,
}

impl ImplicitRelation {
    pub fn strength(&self) -> usize {
        self.shared_neighbors.len()
    }
}
