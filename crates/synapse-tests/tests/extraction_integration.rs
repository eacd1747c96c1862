use std::sync::Arc;

use synapse_core::domain::DomainRegistry;
use synapse_core::entity::{category, Graph, TextIssue};
use synapse_core::extraction::ExtractionOptions;
use synapse_extraction::{validate_extraction, ExtractionPipeline, PatternRecognizer};

const MARKETING_SAMPLE: &str = "ROI是数字营销的核心指标，内容营销通过用户画像提升转化率";

const TECH_SAMPLE: &str = "Machine learning models require large training datasets. \
    Engineers use Python and TensorFlow for deep learning, and Docker helps deploy the \
    recommendation system. Data analysis improves model accuracy over time.";

fn pipeline() -> ExtractionPipeline {
    ExtractionPipeline::new(
        Arc::new(DomainRegistry::builtin()),
        Arc::new(PatternRecognizer::new()),
        "general",
    )
}

async fn extract(text: &str) -> Graph {
    pipeline().extract(text, &ExtractionOptions::default()).await
}

fn node_named<'g>(graph: &'g Graph, name: &str) -> &'g synapse_core::Entity {
    graph
        .node_by_name(name)
        .unwrap_or_else(|| panic!("entity {name} missing from {:?}", graph.nodes.iter().map(|n| &n.name).collect::<Vec<_>>()))
}

// ---------------------------------------------------------------------------
// Text quality guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn short_text_is_rejected_without_nodes() {
    for text in ["", "ROI", "短文本测试", "a sentence of 19 ch", "数".repeat(19).as_str()] {
        let graph = extract(text).await;
        assert_eq!(graph.metadata.error, Some(TextIssue::TextTooShort), "input {text:?}");
        assert!(graph.nodes.is_empty());
        assert!(graph.links.is_empty());
    }
}

#[tokio::test]
async fn repetitive_text_is_rejected_as_low_quality() {
    for text in ["ab".repeat(20), "哈哈".repeat(15), "xyz ".repeat(20)] {
        let graph = extract(&text).await;
        assert_eq!(graph.metadata.error, Some(TextIssue::LowQualityText), "input {text:?}");
        assert!(graph.nodes.is_empty());
    }
}

#[tokio::test]
async fn rejected_metadata_serializes_snake_case() {
    let graph = extract("too short").await;
    let json = serde_json::to_value(&graph).expect("failed to serialize graph");
    assert_eq!(json["metadata"]["error"], "text_too_short");
    assert_eq!(json["nodes"], serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// Weight and link invariants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn entity_and_relation_weights_stay_in_range() {
    for text in [MARKETING_SAMPLE, TECH_SAMPLE] {
        let graph = extract(text).await;
        assert!(graph.metadata.error.is_none());
        assert!(!graph.nodes.is_empty());
        for node in &graph.nodes {
            assert!(node.weight >= 0.5, "{} has weight {}", node.name, node.weight);
            assert!(node.weight.is_finite());
        }
        for link in &graph.links {
            assert!((0.1..=1.0).contains(&link.weight), "link weight {}", link.weight);
            assert_ne!(link.source, link.target);
            assert!(graph.node(&link.source).is_some());
            assert!(graph.node(&link.target).is_some());
        }
        assert_eq!(graph.metadata.entity_count, graph.nodes.len());
        assert_eq!(graph.metadata.relation_count, graph.links.len());
    }
}

// ---------------------------------------------------------------------------
// Marketing scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn marketing_sample_yields_core_entities_and_improvement_link() {
    let graph = extract(MARKETING_SAMPLE).await;
    assert_eq!(graph.metadata.domain, "marketing");

    for name in ["ROI", "数字营销", "内容营销", "用户画像", "转化率"] {
        node_named(&graph, name);
    }
    for name in ["ROI", "转化率"] {
        let node = node_named(&graph, name);
        assert_eq!(node.category, category::CORE_CONCEPT);
        assert!(node.weight >= 3.0, "{} weight {}", name, node.weight);
    }

    let persona = node_named(&graph, "用户画像");
    let conversion = node_named(&graph, "转化率");
    assert!(
        graph.links.iter().any(|l| l.connects(&persona.id, &conversion.id)
            && ["improves", "optimizes", "enhances", "promotes"].contains(&l.relation_type.as_str())),
        "no improvement link in {:?}",
        graph.links
    );
}

#[tokio::test]
async fn relation_verbs_only_type_the_mentions_they_join() {
    let graph = extract(MARKETING_SAMPLE).await;
    let persona = node_named(&graph, "用户画像");
    let conversion = node_named(&graph, "转化率");
    let roi = node_named(&graph, "ROI");
    let digital = node_named(&graph, "数字营销");

    let persona_links: Vec<_> = graph
        .links
        .iter()
        .filter(|l| l.connects(&persona.id, &conversion.id))
        .collect();
    assert_eq!(persona_links.len(), 1, "duplicate links {:?}", persona_links);

    // 提升 sits in the second clause; ROI and 数字营销 are only joined by 是.
    assert!(graph
        .links
        .iter()
        .filter(|l| l.connects(&roi.id, &digital.id))
        .all(|l| !["improves", "optimizes"].contains(&l.relation_type.as_str())));
}

#[tokio::test]
async fn explicit_domain_overrides_detection() {
    let graph = pipeline()
        .extract(MARKETING_SAMPLE, &ExtractionOptions::with_domain("technology"))
        .await;
    assert_eq!(graph.metadata.domain, "technology");
    assert!(graph.metadata.detected_domain.is_none());
}

#[tokio::test]
async fn extraction_is_deterministic() {
    let a = extract(TECH_SAMPLE).await;
    let b = extract(TECH_SAMPLE).await;
    let ids = |g: &Graph| {
        let mut ids: Vec<String> = g.nodes.iter().map(|n| n.id.clone()).collect();
        ids.sort();
        ids
    };
    let keys = |g: &Graph| {
        let mut keys: Vec<_> = g.links.iter().map(|l| l.key()).collect();
        keys.sort();
        keys
    };
    assert_eq!(ids(&a), ids(&b));
    assert_eq!(keys(&a), keys(&b));
}

// ---------------------------------------------------------------------------
// Validation report
// ---------------------------------------------------------------------------

#[tokio::test]
async fn extracted_graph_validates_against_its_own_text() {
    let graph = extract(MARKETING_SAMPLE).await;
    let report = validate_extraction(&graph, MARKETING_SAMPLE);
    assert_eq!(report.total_entities, graph.nodes.len());
    assert_eq!(report.verified_entities, report.total_entities);
    assert!(report.entity_accuracy > 0.99);
}
