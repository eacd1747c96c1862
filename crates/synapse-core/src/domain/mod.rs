//! Domain configuration registry.
//!
//! Domains are immutable reference data. Callers resolve an [`ActiveDomain`]
//! once per request and pass it explicitly through every extraction stage;
//! there is no process-wide "current domain".

mod tables;

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::entity::normalize_name;
use crate::numeric::{safe_div, safe_number};
use crate::text::{ascii_bounded, char_len, count_occurrences};

pub use tables::REGISTRY_VERSION;
use tables::{DomainTable, BUILTIN_DOMAINS};

pub const GENERAL_DOMAIN: &str = "general";
/// Auto-detection only switches domains above this confidence.
pub const DETECTION_THRESHOLD: f64 = 0.3;

const TERM_CAPTURE: &str = r"([\p{Han}A-Za-z0-9_\-]{2,20})";
const EN_CAPTURE: &str = r"([A-Za-z][A-Za-z0-9_\-]*(?:\s+[A-Za-z][A-Za-z0-9_\-]*){0,2})";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptPattern {
    pub pattern: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationPattern {
    pub pattern: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DomainConfig {
    pub name: String,
    pub core_terms: Vec<String>,
    pub tool_patterns: Vec<String>,
    pub concept_patterns: Vec<ConceptPattern>,
    pub relation_patterns: Vec<RelationPattern>,
    pub term_weights: HashMap<String, f64>,
    /// Categories specific to this domain (earn the domain-category bonus).
    pub categories: Vec<String>,
}

impl DomainConfig {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn from_table(table: &DomainTable) -> Self {
        Self {
            name: table.name.to_string(),
            core_terms: table.core_terms.iter().map(|(t, _)| t.to_string()).collect(),
            tool_patterns: table.tool_patterns.iter().map(|p| p.to_string()).collect(),
            concept_patterns: table
                .concept_patterns
                .iter()
                .map(|(pattern, category)| ConceptPattern {
                    pattern: pattern.to_string(),
                    category: category.to_string(),
                })
                .collect(),
            relation_patterns: table
                .relation_patterns
                .iter()
                .map(|(pattern, relation_type, weight)| RelationPattern {
                    pattern: pattern.to_string(),
                    relation_type: relation_type.to_string(),
                    weight: *weight,
                })
                .collect(),
            term_weights: table
                .core_terms
                .iter()
                .map(|(t, w)| (t.to_string(), *w))
                .collect(),
            categories: table.categories.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Expands `{term}` / `{en}` placeholders into capture groups.
pub fn expand_relation_pattern(pattern: &str) -> String {
    let expanded = pattern.replace("{term}", TERM_CAPTURE).replace("{en}", EN_CAPTURE);
    if pattern.contains("{en}") {
        format!("(?i){expanded}")
    } else {
        expanded
    }
}

fn compile(pattern: &str, domain: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!(domain = %domain, pattern = %pattern, error = %e, "Skipping invalid domain pattern");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRelationPattern {
    pub regex: Regex,
    pub relation_type: String,
    pub weight: f64,
}

/// A domain configuration with its patterns compiled, ready to be threaded
/// through an extraction call.
#[derive(Debug, Clone)]
pub struct ActiveDomain {
    config: DomainConfig,
    normalized_weights: HashMap<String, f64>,
    tool_regexes: Vec<Regex>,
    concept_regexes: Vec<(Regex, String)>,
    relation_regexes: Vec<CompiledRelationPattern>,
}

impl ActiveDomain {
    pub fn compile(config: DomainConfig) -> Self {
        let name = config.name.clone();
        let normalized_weights = config
            .term_weights
            .iter()
            .map(|(term, weight)| (normalize_name(term), safe_number(*weight, 1.0)))
            .collect();
        let tool_regexes = config
            .tool_patterns
            .iter()
            .filter_map(|p| compile(p, &name))
            .collect();
        let concept_regexes = config
            .concept_patterns
            .iter()
            .filter_map(|p| compile(&p.pattern, &name).map(|r| (r, p.category.clone())))
            .collect();
        let relation_regexes = config
            .relation_patterns
            .iter()
            .filter_map(|p| {
                compile(&expand_relation_pattern(&p.pattern), &name).map(|regex| {
                    CompiledRelationPattern {
                        regex,
                        relation_type: p.relation_type.clone(),
                        weight: p.weight,
                    }
                })
            })
            .collect();

        Self {
            config,
            normalized_weights,
            tool_regexes,
            concept_regexes,
            relation_regexes,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    pub fn core_terms(&self) -> &[String] {
        &self.config.core_terms
    }

    pub fn term_weight(&self, term: &str) -> Option<f64> {
        self.normalized_weights.get(&normalize_name(term)).copied()
    }

    pub fn is_core_term(&self, term: &str) -> bool {
        let key = normalize_name(term);
        self.config.core_terms.iter().any(|t| normalize_name(t) == key)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.config.categories.iter().any(|c| c == category)
    }

    pub fn tool_regexes(&self) -> &[Regex] {
        &self.tool_regexes
    }

    pub fn concept_regexes(&self) -> &[(Regex, String)] {
        &self.concept_regexes
    }

    pub fn relation_patterns(&self) -> &[CompiledRelationPattern] {
        &self.relation_regexes
    }

    /// Detection score for `text`: weighted core-term occurrences plus tool
    /// pattern matches counted twice.
    pub fn detection_score(&self, text: &str) -> f64 {
        let lowered = text.to_lowercase();
        let term_score: f64 = self
            .config
            .core_terms
            .iter()
            .map(|term| {
                let needle = term.to_lowercase();
                if needle.is_empty() {
                    return 0.0;
                }
                let count = count_occurrences(&lowered, &needle) as f64;
                count * self.term_weight(term).unwrap_or(1.0)
            })
            .sum();
        let tool_score: f64 = self
            .tool_regexes
            .iter()
            .map(|r| {
                r.find_iter(text)
                    .filter(|m| ascii_bounded(text, m.start(), m.end()))
                    .count() as f64
                    * 2.0
            })
            .sum();
        safe_number(term_score + tool_score, 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainDetection {
    pub domain: String,
    pub score: f64,
    pub confidence: f64,
}

impl DomainDetection {
    pub fn should_switch(&self) -> bool {
        self.confidence > DETECTION_THRESHOLD
    }
}

pub struct DomainRegistry {
    domains: HashMap<String, Arc<ActiveDomain>>,
}

impl Default for DomainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DomainRegistry {
    pub fn builtin() -> Self {
        let domains = BUILTIN_DOMAINS
            .iter()
            .map(|table| {
                let domain = ActiveDomain::compile(DomainConfig::from_table(table));
                (table.name.to_string(), Arc::new(domain))
            })
            .collect();
        Self { domains }
    }

    pub fn register(&mut self, config: DomainConfig) {
        let key = config.name.clone();
        self.domains.insert(key, Arc::new(ActiveDomain::compile(config)));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.domains.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.domains.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Looks up a domain, falling back to the neutral `general` config.
    pub fn get(&self, key: &str) -> Arc<ActiveDomain> {
        if let Some(domain) = self.domains.get(key) {
            return domain.clone();
        }
        tracing::debug!(domain = %key, "Unknown domain, falling back to general");
        self.general()
    }

    pub fn general(&self) -> Arc<ActiveDomain> {
        self.domains
            .get(GENERAL_DOMAIN)
            .cloned()
            .unwrap_or_else(|| Arc::new(ActiveDomain::compile(DomainConfig::empty(GENERAL_DOMAIN))))
    }

    /// Merges several domains into one: terms and patterns are unioned, term
    /// and relation-pattern weights are scaled by each domain's mixing weight
    /// and summed on collision.
    pub fn merge(&self, keys: &[&str], weights: Option<&[f64]>) -> Arc<ActiveDomain> {
        if keys.len() == 1 && weights.is_none() {
            return self.get(keys[0]);
        }

        let mut merged = DomainConfig::empty(&keys.join("+"));
        let mut seen_terms: HashMap<String, usize> = HashMap::new();
        let mut weight_by_norm: HashMap<String, (String, f64)> = HashMap::new();

        for (i, key) in keys.iter().enumerate() {
            let mix = weights
                .and_then(|w| w.get(i))
                .map(|w| safe_number(*w, 1.0))
                .unwrap_or(1.0);
            let domain = self.get(key);
            let config = domain.config();

            for term in &config.core_terms {
                let norm = normalize_name(term);
                if !seen_terms.contains_key(&norm) {
                    seen_terms.insert(norm, merged.core_terms.len());
                    merged.core_terms.push(term.clone());
                }
            }
            for (term, weight) in &config.term_weights {
                let entry = weight_by_norm
                    .entry(normalize_name(term))
                    .or_insert_with(|| (term.clone(), 0.0));
                entry.1 += safe_number(weight * mix, 0.0);
            }
            for pattern in &config.tool_patterns {
                if !merged.tool_patterns.contains(pattern) {
                    merged.tool_patterns.push(pattern.clone());
                }
            }
            for pattern in &config.concept_patterns {
                if !merged.concept_patterns.contains(pattern) {
                    merged.concept_patterns.push(pattern.clone());
                }
            }
            for pattern in &config.relation_patterns {
                let scaled = safe_number(pattern.weight * mix, pattern.weight);
                match merged.relation_patterns.iter_mut().find(|p| {
                    p.pattern == pattern.pattern && p.relation_type == pattern.relation_type
                }) {
                    Some(existing) => existing.weight = (existing.weight + scaled).min(1.0),
                    None => merged.relation_patterns.push(RelationPattern {
                        weight: scaled.min(1.0),
                        ..pattern.clone()
                    }),
                }
            }
            for category in &config.categories {
                if !merged.categories.contains(category) {
                    merged.categories.push(category.clone());
                }
            }
        }

        merged.term_weights = weight_by_norm.into_values().collect();
        Arc::new(ActiveDomain::compile(merged))
    }

    /// Scores every known domain except `general` and returns the arg-max.
    /// Confidence is the score normalized by `text_length / 100`.
    pub fn detect(&self, text: &str) -> Option<DomainDetection> {
        let length = char_len(text) as f64;
        let mut best: Option<DomainDetection> = None;

        for key in self.keys() {
            if key == GENERAL_DOMAIN {
                continue;
            }
            let score = self.domains[&key].detection_score(text);
            if score <= 0.0 {
                continue;
            }
            if best.as_ref().map(|b| score > b.score).unwrap_or(true) {
                best = Some(DomainDetection {
                    domain: key,
                    score,
                    confidence: safe_div(score, length / 100.0, 0.0),
                });
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_unknown_falls_back_to_general() {
        let registry = DomainRegistry::builtin();
        assert_eq!(registry.get("astrology").name(), GENERAL_DOMAIN);
        assert_eq!(registry.get("marketing").name(), "marketing");
    }

    #[test]
    fn test_builtin_patterns_compile() {
        let registry = DomainRegistry::builtin();
        for key in registry.keys() {
            let domain = registry.get(&key);
            assert_eq!(domain.tool_regexes().len(), domain.config().tool_patterns.len(), "{key}");
            assert_eq!(
                domain.relation_patterns().len(),
                domain.config().relation_patterns.len(),
                "{key}"
            );
        }
    }

    #[test]
    fn test_merge_sums_weights_on_collision() {
        let mut registry = DomainRegistry::builtin();
        let mut a = DomainConfig::empty("a");
        a.core_terms = vec!["平台".into(), "模型".into()];
        a.term_weights = HashMap::from([("平台".to_string(), 2.0)]);
        let mut b = DomainConfig::empty("b");
        b.core_terms = vec!["平台".into()];
        b.term_weights = HashMap::from([("平台".to_string(), 1.0)]);
        registry.register(a);
        registry.register(b);

        let merged = registry.merge(&["a", "b"], Some(&[0.5, 2.0]));
        assert_eq!(merged.name(), "a+b");
        assert_eq!(merged.core_terms().len(), 2);
        assert!((merged.term_weight("平台").unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_detect_marketing_text() {
        let registry = DomainRegistry::builtin();
        let detection = registry
            .detect("ROI是数字营销的核心指标，内容营销通过用户画像提升转化率")
            .unwrap();
        assert_eq!(detection.domain, "marketing");
        assert!(detection.should_switch());
    }

    #[test]
    fn test_detect_nothing_for_unrelated_text() {
        let registry = DomainRegistry::builtin();
        assert!(registry.detect("the weather was pleasant all afternoon").is_none());
    }

    #[test]
    fn test_expand_relation_pattern() {
        let expanded = expand_relation_pattern("{en} drives {en}");
        assert!(expanded.starts_with("(?i)"));
        assert!(!expand_relation_pattern("{term}驱动{term}").contains("{term}"));
    }
}
