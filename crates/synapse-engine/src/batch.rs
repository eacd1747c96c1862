use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use synapse_core::extraction::ExtractionOptions;
use synapse_core::narrative::{InsightCard, NarrativeGenerator};

use crate::engine::KnowledgeEngine;

/// One document queued for an insight card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub domain: Option<String>,
}

impl BatchItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            domain: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub id: String,
    pub card: Option<InsightCard>,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.card.is_some()
    }
}

/// Runs extraction, analysis and narrative generation one item at a time,
/// pausing between items so the narrative backend is never hit in bursts.
/// A failing item is recorded and the run moves on.
pub struct BatchInsightRunner {
    engine: Arc<KnowledgeEngine>,
    narrator: Arc<dyn NarrativeGenerator>,
    delay: Duration,
}

impl BatchInsightRunner {
    pub fn new(engine: Arc<KnowledgeEngine>, narrator: Arc<dyn NarrativeGenerator>, delay: Duration) -> Self {
        Self {
            engine,
            narrator,
            delay,
        }
    }

    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn run(&self, items: &[BatchItem]) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let outcome = self.process(item).await;
            match &outcome.error {
                None => info!(item = %item.id, "Insight card generated"),
                Some(e) => error!(item = %item.id, error = %e, "Insight generation failed"),
            }
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(total = outcomes.len(), failed, "Batch run complete");
        outcomes
    }

    async fn process(&self, item: &BatchItem) -> BatchOutcome {
        let options = ExtractionOptions {
            domain: item.domain.clone(),
            document: Some(item.id.clone()),
            ..self.engine.default_options()
        };
        let graph = self.engine.extract_entities_and_relations(&item.text, &options).await;

        let result = match graph.metadata.error {
            Some(issue) => Err(format!("text rejected: {:?}", issue)),
            None => {
                let analysis = self.engine.analyze_graph(&graph, &item.id, &item.text).await;
                self.narrator
                    .generate(&graph, &analysis)
                    .await
                    .map_err(|e| e.to_string())
            }
        };

        let (card, error) = match result {
            Ok(card) => (Some(card), None),
            Err(e) => (None, Some(e)),
        };
        BatchOutcome {
            id: item.id.clone(),
            card,
            error,
            finished_at: Utc::now(),
        }
    }
}
