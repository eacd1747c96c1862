use std::sync::Arc;

use synapse_core::config::EngineConfig;
use synapse_core::domain::{ActiveDomain, DomainDetection, DomainRegistry};
use synapse_core::entity::{Entity, Graph, GraphMetadata, Relation, TextIssue};
use synapse_core::extraction::{EntityRecognizer, ExtractionOptions};
use synapse_core::numeric::round_to;
use synapse_core::text::{char_len, distinct_ratio};

use crate::context::ExtractionContext;
use crate::entities::EntityExtractor;
use crate::recognizer::{HttpRecognizer, PatternRecognizer};
use crate::relations::RelationExtractor;

/// Texts shorter than this (in chars) are rejected as `text_too_short`.
pub const MIN_TEXT_CHARS: usize = 20;
/// Texts below this distinct-char ratio and under `LOW_QUALITY_MAX_CHARS`
/// are rejected as `low_quality_text`.
pub const LOW_QUALITY_RATIO: f64 = 0.3;
pub const LOW_QUALITY_MAX_CHARS: usize = 100;

/// Outcome of domain selection for one call.
pub struct DomainSelection {
    pub domain: Arc<ActiveDomain>,
    pub detection: Option<DomainDetection>,
}

/// Text quality guard. Returns the issue together with the measured length
/// and distinct-char ratio.
pub fn check_text(text: &str) -> (Option<TextIssue>, usize, f64) {
    let length = char_len(text);
    let quality = distinct_ratio(text);
    let issue = if length < MIN_TEXT_CHARS {
        Some(TextIssue::TextTooShort)
    } else if quality < LOW_QUALITY_RATIO && length < LOW_QUALITY_MAX_CHARS {
        Some(TextIssue::LowQualityText)
    } else {
        None
    };
    (issue, length, quality)
}

/// Text-to-graph pipeline: guards, per-call domain selection, entity stages,
/// relation stages.
pub struct ExtractionPipeline {
    registry: Arc<DomainRegistry>,
    entities: EntityExtractor,
    relations: RelationExtractor,
    default_domain: String,
}

impl ExtractionPipeline {
    pub fn new(
        registry: Arc<DomainRegistry>,
        recognizer: Arc<dyn EntityRecognizer>,
        default_domain: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            entities: EntityExtractor::new(recognizer),
            relations: RelationExtractor::new(),
            default_domain: default_domain.into(),
        }
    }

    /// Uses the HTTP recognizer when an endpoint is configured, the pattern
    /// recognizer otherwise.
    pub fn from_config(config: &EngineConfig, registry: Arc<DomainRegistry>) -> Self {
        let recognizer: Arc<dyn EntityRecognizer> = match &config.ner_endpoint {
            Some(endpoint) => match HttpRecognizer::new(endpoint.clone()) {
                Ok(http) => {
                    tracing::info!(endpoint = %endpoint, "Using HTTP entity recognizer");
                    Arc::new(http)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to build HTTP recognizer, using pattern recognizer");
                    Arc::new(PatternRecognizer::new())
                }
            },
            None => Arc::new(PatternRecognizer::new()),
        };
        Self::new(registry, recognizer, config.default_domain.clone())
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// Explicit domain wins (`a+b` merges domains); otherwise auto-detection
    /// switches only above the confidence threshold; otherwise the default.
    pub fn select_domain(&self, text: &str, options: &ExtractionOptions) -> DomainSelection {
        if let Some(key) = options.domain.as_deref().filter(|k| !k.trim().is_empty()) {
            let domain = if key.contains('+') {
                let keys: Vec<&str> = key.split('+').map(str::trim).filter(|k| !k.is_empty()).collect();
                self.registry.merge(&keys, None)
            } else {
                self.registry.get(key)
            };
            return DomainSelection { domain, detection: None };
        }

        let detection = if options.auto_detect {
            self.registry.detect(text)
        } else {
            None
        };
        let domain = match &detection {
            Some(d) if d.should_switch() => {
                tracing::debug!(domain = %d.domain, confidence = d.confidence, "Switching to detected domain");
                self.registry.get(&d.domain)
            }
            _ => self.registry.get(&self.default_domain),
        };
        DomainSelection { domain, detection }
    }

    /// Entities and relations for `text` under an already-selected domain.
    pub async fn extract_with_domain(
        &self,
        text: &str,
        domain: &ActiveDomain,
        document: Option<&str>,
    ) -> (Vec<Entity>, Vec<Relation>) {
        let ctx = ExtractionContext::new(text, domain, document);
        let entities = self.entities.extract(&ctx).await;
        let relations = self.relations.extract(&ctx, &entities);
        (entities, relations)
    }

    /// Never fails for string input. Quality conditions come back as an empty
    /// graph with `metadata.error` set.
    pub async fn extract(&self, text: &str, options: &ExtractionOptions) -> Graph {
        let (issue, length, quality) = check_text(text);
        if let Some(issue) = issue {
            tracing::info!(?issue, text_length = length, "Rejecting input text");
            return Graph::rejected(issue, length, round_to(quality, 3));
        }

        let selection = self.select_domain(text, options);
        let (nodes, links) = self
            .extract_with_domain(text, &selection.domain, options.document.as_deref())
            .await;

        tracing::info!(
            domain = %selection.domain.name(),
            recognizer = %self.entities.recognizer_name(),
            entities = nodes.len(),
            relations = links.len(),
            "Extraction complete"
        );

        Graph {
            metadata: GraphMetadata {
                domain: selection.domain.name().to_string(),
                detected_domain: selection.detection.as_ref().map(|d| d.domain.clone()),
                domain_confidence: selection
                    .detection
                    .as_ref()
                    .map(|d| round_to(d.confidence, 3))
                    .unwrap_or(0.0),
                text_length: length,
                text_quality: round_to(quality, 3),
                entity_count: nodes.len(),
                relation_count: links.len(),
                ..GraphMetadata::default()
            },
            nodes,
            links,
        }
    }
}
