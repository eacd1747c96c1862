use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use synapse_core::entity::Graph;
use synapse_core::numeric::{round_to, safe_div};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
    F,
}

impl QualityGrade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 0.9 => QualityGrade::A,
            s if s >= 0.8 => QualityGrade::B,
            s if s >= 0.7 => QualityGrade::C,
            s if s >= 0.6 => QualityGrade::D,
            _ => QualityGrade::F,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QualityGrade::A => "excellent",
            QualityGrade::B => "good",
            QualityGrade::C => "fair",
            QualityGrade::D => "passing",
            QualityGrade::F => "needs improvement",
        }
    }
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.label())
    }
}

/// How well an extracted graph is grounded in its source text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionValidation {
    pub entity_accuracy: f64,
    pub relation_accuracy: f64,
    /// Mean of the non-zero component accuracies.
    pub accuracy_score: f64,
    pub grade: QualityGrade,
    pub verified_entities: usize,
    pub total_entities: usize,
    pub verified_relations: usize,
    pub total_relations: usize,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Checks that every entity name, and both endpoint names of every relation,
/// occur in `text`.
pub fn validate_extraction(graph: &Graph, text: &str) -> ExtractionValidation {
    let mut report = ExtractionValidation {
        entity_accuracy: 0.0,
        relation_accuracy: 0.0,
        accuracy_score: 0.0,
        grade: QualityGrade::F,
        verified_entities: 0,
        total_entities: graph.nodes.len(),
        verified_relations: 0,
        total_relations: graph.links.len(),
        warnings: Vec::new(),
        recommendations: Vec::new(),
    };

    if text.trim().is_empty() || graph.nodes.is_empty() {
        report.warnings.push("missing text or extracted entities".to_string());
        report.recommendations.push("re-run extraction on the full document text".to_string());
        return report;
    }

    let lowered = text.to_lowercase();
    let mut present: HashMap<&str, bool> = HashMap::new();
    for node in &graph.nodes {
        let found = lowered.contains(&node.name.to_lowercase());
        present.insert(node.id.as_str(), found);
        if found {
            report.verified_entities += 1;
        }
    }
    report.verified_relations = graph
        .links
        .iter()
        .filter(|l| {
            present.get(l.source.as_str()).copied().unwrap_or(false)
                && present.get(l.target.as_str()).copied().unwrap_or(false)
        })
        .count();

    report.entity_accuracy = round_to(
        safe_div(report.verified_entities as f64, report.total_entities as f64, 0.0),
        3,
    );
    report.relation_accuracy = round_to(
        safe_div(report.verified_relations as f64, report.total_relations as f64, 0.0),
        3,
    );

    let components: Vec<f64> = [report.entity_accuracy, report.relation_accuracy]
        .into_iter()
        .filter(|c| *c > 0.0)
        .collect();
    report.accuracy_score = round_to(
        safe_div(components.iter().sum(), components.len() as f64, 0.0),
        3,
    );
    report.grade = QualityGrade::from_score(report.accuracy_score);

    if report.entity_accuracy < 0.7 {
        report.warnings.push(format!(
            "low entity accuracy ({:.1}%): some entities do not occur in the text",
            report.entity_accuracy * 100.0
        ));
    }
    if report.total_relations > 0 && report.relation_accuracy < 0.5 {
        report.warnings.push(format!(
            "low relation accuracy ({:.1}%): some relations are inferred rather than stated",
            report.relation_accuracy * 100.0
        ));
    }

    let recommendation = if report.accuracy_score >= 0.8 {
        "extraction is well grounded in the source text"
    } else if report.accuracy_score >= 0.6 {
        "extraction is partially grounded; review key entities manually"
    } else {
        "extraction is poorly grounded; re-run or review manually"
    };
    report.recommendations.push(recommendation.to_string());

    report
}
