use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityLabel {
    Person,
    Organization,
    Concept,
    Product,
}

/// Output of a named-entity recognizer before domain scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecognizedEntity {
    pub name: String,
    pub label: EntityLabel,
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,
}

fn default_accuracy() -> f64 {
    1.0
}

/// Pluggable named-entity recognition backend. Callers treat failures as
/// "no entities" and continue with pattern-based extraction.
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    fn name(&self) -> &str;
    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>>;
}

/// Per-call extraction options. The domain travels with the call; nothing
/// about it is stored on the extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionOptions {
    pub domain: Option<String>,
    #[serde(default = "default_auto_detect")]
    pub auto_detect: bool,
    /// Provenance label recorded on extracted entities.
    pub document: Option<String>,
}

fn default_auto_detect() -> bool {
    true
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            domain: None,
            auto_detect: true,
            document: None,
        }
    }
}

impl ExtractionOptions {
    pub fn with_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Self::default()
        }
    }
}
