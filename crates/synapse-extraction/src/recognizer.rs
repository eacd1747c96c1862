use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use synapse_core::error::{Result, SynapseError};
use synapse_core::extraction::{EntityLabel, EntityRecognizer, RecognizedEntity};
use synapse_core::text::ascii_bounded;

const ORG_SUFFIXES: &[&str] = &[
    "Inc", "Corp", "Corporation", "Group", "Company", "Ltd", "LLC", "University", "Institute",
    "Bank", "Foundation", "Labs",
];

static ACRONYM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][A-Z0-9]{1,9}").expect("valid acronym regex"));

static CAPITALIZED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)+").expect("valid capitalized-name regex")
});

static CJK_ORGANIZATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{Han}{2,8}(?:公司|集团|大学|研究院|银行|协会)")
        .expect("valid organization regex")
});

static QUOTED_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:《([^《》]{2,20})》|“([^“”]{2,20})”|"([^"]{2,20})")"#)
        .expect("valid title regex")
});

/// Offline recognizer built from surface heuristics: upper-case acronyms,
/// capitalized multi-word names, organization suffixes and quoted titles.
#[derive(Debug, Default, Clone)]
pub struct PatternRecognizer;

impl PatternRecognizer {
    pub fn new() -> Self {
        Self
    }

    fn recognize_sync(text: &str) -> Vec<RecognizedEntity> {
        let mut found = Vec::new();

        for m in ACRONYM.find_iter(text) {
            if ascii_bounded(text, m.start(), m.end()) {
                found.push(RecognizedEntity {
                    name: m.as_str().to_string(),
                    label: EntityLabel::Concept,
                    accuracy: 0.8,
                });
            }
        }

        for m in CAPITALIZED_NAME.find_iter(text) {
            let name = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            let is_org = name
                .rsplit(' ')
                .next()
                .map(|last| ORG_SUFFIXES.contains(&last))
                .unwrap_or(false);
            found.push(RecognizedEntity {
                name,
                label: if is_org { EntityLabel::Organization } else { EntityLabel::Concept },
                accuracy: 0.9,
            });
        }

        for m in CJK_ORGANIZATION.find_iter(text) {
            found.push(RecognizedEntity {
                name: m.as_str().to_string(),
                label: EntityLabel::Organization,
                accuracy: 0.85,
            });
        }

        for caps in QUOTED_TITLE.captures_iter(text) {
            if let Some(title) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
                found.push(RecognizedEntity {
                    name: title.as_str().trim().to_string(),
                    label: EntityLabel::Product,
                    accuracy: 0.85,
                });
            }
        }

        found
    }
}

#[async_trait]
impl EntityRecognizer for PatternRecognizer {
    fn name(&self) -> &str {
        "pattern"
    }

    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>> {
        Ok(Self::recognize_sync(text))
    }
}

// ── Remote NER service ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct NerRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct NerResponse {
    #[serde(default)]
    entities: Vec<NerEntity>,
}

#[derive(Debug, Deserialize)]
struct NerEntity {
    name: String,
    label: String,
    #[serde(default = "default_accuracy")]
    accuracy: f64,
}

fn default_accuracy() -> f64 {
    1.0
}

/// Recognizer backed by an HTTP NER service that accepts `{"text": ...}` and
/// answers `{"entities": [{"name", "label", "accuracy"}]}`.
pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRecognizer {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn parse_label(s: &str) -> EntityLabel {
        match s.to_lowercase().as_str() {
            "person" | "per" | "人名" => EntityLabel::Person,
            "organization" | "org" | "company" | "机构" => EntityLabel::Organization,
            "product" | "work_of_art" | "title" => EntityLabel::Product,
            "concept" | "misc" | "term" => EntityLabel::Concept,
            _ => {
                tracing::debug!(label = %s, "Unknown NER label, treating as concept");
                EntityLabel::Concept
            }
        }
    }
}

#[async_trait]
impl EntityRecognizer for HttpRecognizer {
    fn name(&self) -> &str {
        "http"
    }

    async fn recognize(&self, text: &str) -> Result<Vec<RecognizedEntity>> {
        tracing::debug!(endpoint = %self.endpoint, text_len = text.len(), "Sending NER request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&NerRequest { text })
            .send()
            .await
            .map_err(|e| SynapseError::Recognizer(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(SynapseError::Recognizer(format!(
                "NER service returned status {status}: {body}"
            )));
        }

        let parsed: NerResponse = response
            .json()
            .await
            .map_err(|e| SynapseError::Recognizer(format!("Failed to parse NER response: {e}")))?;

        Ok(parsed
            .entities
            .into_iter()
            .filter(|e| !e.name.trim().is_empty())
            .map(|e| RecognizedEntity {
                label: Self::parse_label(&e.label),
                name: e.name.trim().to_string(),
                accuracy: e.accuracy,
            })
            .collect())
    }
}
