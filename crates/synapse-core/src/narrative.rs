use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;
use crate::entity::Graph;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsightCard {
    pub title: String,
    pub summary: String,
    pub highlights: Vec<String>,
}

/// Host-provided narrative writer (typically LLM-backed). The engine never
/// calls it on its own; only the batch runner drives it.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, graph: &Graph, analysis: &AnalysisResult) -> Result<InsightCard>;
}
