//! Entity extraction stages.
//!
//! The extractor runs a fixed sequence of pure stages over a candidate list:
//! recognize, supplement, deduplicate, promote, gap-fill, score, filter.
//! Each stage takes the list by value and returns the next one.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use synapse_core::domain::ActiveDomain;
use synapse_core::entity::{category, normalize_name, Entity, NodeType};
use synapse_core::extraction::{EntityLabel, EntityRecognizer, RecognizedEntity};
use synapse_core::numeric::{round_to, safe_div, safe_ln, safe_number};
use synapse_core::text::{ascii_bounded, char_len, count_occurrences, is_cjk};

use crate::context::ExtractionContext;
use crate::lexicon::{
    is_important_span, is_stopword, is_whitelisted, FILLER_PARTICLES, FUNCTION_PREFIXES,
    FUNCTION_SUFFIXES, SPAN_DELIMITERS, UNIVERSAL_TERMS,
};
use crate::recognizer::PatternRecognizer;

pub const TOOL_WEIGHT: f64 = 2.5;
pub const CONCEPT_WEIGHT: f64 = 2.0;
pub const CORE_TERM_WEIGHT: f64 = 2.0;
pub const MINED_WEIGHT: f64 = 1.0;
pub const UNIVERSAL_TERM_WEIGHT: f64 = 1.5;
pub const MIN_ENTITY_WEIGHT: f64 = 0.5;

const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 20;
const MIN_SPAN_CHARS: usize = 2;
const MAX_SPAN_CHARS: usize = 6;

static ENGLISH_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z\-]{2,}").expect("valid word regex"));

pub struct EntityExtractor {
    recognizer: Arc<dyn EntityRecognizer>,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new(Arc::new(PatternRecognizer::new()))
    }
}

impl EntityExtractor {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { recognizer }
    }

    pub fn recognizer_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Runs the full stage sequence. Never fails: recognizer errors degrade to
    /// pattern-only extraction.
    pub async fn extract(&self, ctx: &ExtractionContext<'_>) -> Vec<Entity> {
        let mut candidates = self.recognize(ctx).await;
        candidates.extend(supplement(ctx));

        let entities = deduplicate(candidates);
        let entities = promote_core(entities, ctx.domain);
        let entities = fill_gaps(entities, ctx);
        let entities = score(entities, ctx);
        let entities = filter(entities, ctx.domain);

        tracing::debug!(
            domain = %ctx.domain.name(),
            entities = entities.len(),
            "Entity extraction complete"
        );
        entities
    }

    async fn recognize(&self, ctx: &ExtractionContext<'_>) -> Vec<Entity> {
        match self.recognizer.recognize(ctx.text).await {
            Ok(found) => found
                .into_iter()
                .map(|r| from_recognized(r, self.recognizer.name(), ctx.document))
                .collect(),
            Err(e) => {
                tracing::warn!(
                    recognizer = %self.recognizer.name(),
                    error = %e,
                    "Entity recognizer failed, continuing with pattern extraction"
                );
                Vec::new()
            }
        }
    }
}

fn from_recognized(found: RecognizedEntity, recognizer: &str, document: Option<&str>) -> Entity {
    let (node_type, cat) = match found.label {
        EntityLabel::Person => (NodeType::Entity, category::PERSON),
        EntityLabel::Organization => (NodeType::Entity, category::ORGANIZATION),
        EntityLabel::Product => (NodeType::Entity, category::PRODUCT),
        EntityLabel::Concept => (NodeType::Concept, category::KEY_PHRASE),
    };
    let weight = safe_number(found.accuracy, 1.0);
    let weight = if weight > 0.0 { weight } else { 1.0 };
    with_document(
        Entity::new(found.name, node_type, cat, weight).with_property("source", format!("ner:{recognizer}")),
        document,
    )
}

fn with_document(entity: Entity, document: Option<&str>) -> Entity {
    match document {
        Some(doc) => entity.with_property("document", doc),
        None => entity,
    }
}

fn domain_candidate(
    ctx: &ExtractionContext<'_>,
    name: &str,
    node_type: NodeType,
    cat: &str,
    weight: f64,
    source: &str,
) -> Entity {
    with_document(
        Entity::new(name, node_type, cat, weight)
            .with_property("source", source)
            .with_property("domain", ctx.domain.name()),
        ctx.document,
    )
}

/// Tool patterns, concept patterns, literal core terms and mined spans.
pub fn supplement(ctx: &ExtractionContext<'_>) -> Vec<Entity> {
    let mut found = Vec::new();

    for regex in ctx.domain.tool_regexes() {
        for m in regex.find_iter(ctx.text) {
            if ascii_bounded(ctx.text, m.start(), m.end()) {
                found.push(domain_candidate(ctx, m.as_str(), NodeType::Tool, category::TOOL, TOOL_WEIGHT, "tool_pattern"));
            }
        }
    }

    for (regex, cat) in ctx.domain.concept_regexes() {
        for m in regex.find_iter(ctx.text) {
            if ascii_bounded(ctx.text, m.start(), m.end()) {
                found.push(domain_candidate(ctx, m.as_str(), NodeType::Concept, cat, CONCEPT_WEIGHT, "concept_pattern"));
            }
        }
    }

    for term in ctx.domain.core_terms() {
        if ctx.mentions(term) {
            let weight = ctx.domain.term_weight(term).unwrap_or(CORE_TERM_WEIGHT);
            found.push(domain_candidate(ctx, term, NodeType::Concept, category::CORE_CONCEPT, weight, "core_term"));
        }
    }

    found.extend(mine_spans(ctx));
    found
}

/// Splits a CJK run at function words and relation verbs.
fn split_run(run: &[char]) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    'outer: while i < run.len() {
        for delimiter in SPAN_DELIMITERS {
            let d: Vec<char> = delimiter.chars().collect();
            if run[i..].starts_with(&d) {
                if !current.is_empty() {
                    pieces.push(std::mem::take(&mut current));
                }
                i += d.len();
                continue 'outer;
            }
        }
        current.push(run[i]);
        i += 1;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn relates_to_core_term(span: &str, domain: &ActiveDomain) -> bool {
    let key = normalize_name(span);
    domain.core_terms().iter().any(|t| {
        let term = normalize_name(t);
        !term.is_empty() && (term.contains(&key) || key.contains(&term))
    })
}

/// Mines 2-6 char CJK spans and repeated English words. A span is kept when
/// it recurs or looks like an important term.
pub fn mine_spans(ctx: &ExtractionContext<'_>) -> Vec<Entity> {
    let mut candidates: Vec<String> = Vec::new();
    let chars: Vec<char> = ctx.text.chars().collect();
    let mut start = 0;
    while start < chars.len() {
        if !is_cjk(chars[start]) {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < chars.len() && is_cjk(chars[end]) {
            end += 1;
        }
        for piece in split_run(&chars[start..end]) {
            let len = char_len(&piece);
            if (MIN_SPAN_CHARS..=MAX_SPAN_CHARS).contains(&len) && !candidates.contains(&piece) {
                candidates.push(piece);
            }
        }
        start = end;
    }

    let mut found: Vec<Entity> = candidates
        .into_iter()
        .filter(|span| {
            count_occurrences(ctx.text, span) >= 2
                || relates_to_core_term(span, ctx.domain)
                || is_important_span(span)
        })
        .map(|span| mined(ctx, &span))
        .collect();

    let mut word_counts: HashMap<String, (String, usize)> = HashMap::new();
    let mut order = Vec::new();
    for m in ENGLISH_WORD.find_iter(ctx.text) {
        if !ascii_bounded(ctx.text, m.start(), m.end()) {
            continue;
        }
        let key = m.as_str().to_lowercase();
        if is_stopword(&key) {
            continue;
        }
        let entry = word_counts.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            (m.as_str().to_string(), 0)
        });
        entry.1 += 1;
    }
    for key in order {
        if let Some((surface, count)) = word_counts.get(&key) {
            if *count >= 2 || relates_to_core_term(&key, ctx.domain) || UNIVERSAL_TERMS.contains(&key.as_str()) {
                found.push(mined(ctx, surface));
            }
        }
    }

    found
}

fn mined(ctx: &ExtractionContext<'_>, span: &str) -> Entity {
    with_document(
        Entity::new(span, NodeType::Concept, category::KEY_PHRASE, MINED_WEIGHT)
            .with_property("source", "span_mining"),
        ctx.document,
    )
}

/// Collapses candidates sharing a normalized name: max weight wins (with its
/// type and category), property bags are unioned.
pub fn deduplicate(candidates: Vec<Entity>) -> Vec<Entity> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Entity> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let key = candidate.normalized_name();
        if key.is_empty() {
            continue;
        }
        match index.get(&key) {
            Some(&i) => {
                let existing = &mut out[i];
                if candidate.weight > existing.weight {
                    existing.weight = candidate.weight;
                    existing.node_type = candidate.node_type;
                    existing.category = candidate.category.clone();
                }
                for (k, v) in candidate.properties {
                    existing.properties.entry(k).or_insert(v);
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(candidate);
            }
        }
    }

    out
}

/// Entities whose name is a substring or superstring of a core term become
/// `core_concept` with at least that term's weight.
pub fn promote_core(entities: Vec<Entity>, domain: &ActiveDomain) -> Vec<Entity> {
    entities
        .into_iter()
        .map(|mut entity| {
            let key = entity.normalized_name();
            if char_len(&key) < MIN_NAME_CHARS {
                return entity;
            }
            let best = domain
                .core_terms()
                .iter()
                .filter(|t| {
                    let term = normalize_name(t);
                    !term.is_empty() && (term.contains(&key) || key.contains(&term))
                })
                .map(|t| domain.term_weight(t).unwrap_or(CORE_TERM_WEIGHT))
                .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.max(w))));

            if let Some(term_weight) = best {
                entity.weight = entity.weight.max(term_weight);
                entity.category = category::CORE_CONCEPT.to_string();
            }
            entity
        })
        .collect()
}

/// Injects core and universal terms present verbatim but missed so far.
pub fn fill_gaps(mut entities: Vec<Entity>, ctx: &ExtractionContext<'_>) -> Vec<Entity> {
    let mut known: Vec<String> = entities.iter().map(|e| e.normalized_name()).collect();

    for term in ctx.domain.core_terms() {
        let key = normalize_name(term);
        if !known.contains(&key) && ctx.mentions(term) {
            let weight = ctx.domain.term_weight(term).unwrap_or(CORE_TERM_WEIGHT);
            entities.push(domain_candidate(ctx, term, NodeType::Concept, category::CORE_CONCEPT, weight, "gap_fill"));
            known.push(key);
        }
    }

    for term in UNIVERSAL_TERMS {
        let key = normalize_name(term);
        if !known.contains(&key) && ctx.mentions(term) {
            let weight = ctx.domain.term_weight(term).unwrap_or(UNIVERSAL_TERM_WEIGHT);
            entities.push(with_document(
                Entity::new(*term, NodeType::Concept, category::KEY_PHRASE, weight)
                    .with_property("source", "gap_fill"),
                ctx.document,
            ));
            known.push(key);
        }
    }

    entities
}

fn category_bonus(entity: &Entity, domain: &ActiveDomain) -> f64 {
    let mut bonus = match entity.category.as_str() {
        category::CORE_CONCEPT => 1.0,
        category::PROFESSIONAL_TERM => 0.5,
        _ => 0.0,
    };
    if entity.node_type == NodeType::Tool || entity.category == category::TOOL {
        bonus += 0.3;
    }
    if domain.has_category(&entity.category) {
        bonus += 0.4;
    }
    bonus
}

/// Final importance score. Every term is guarded individually.
pub fn score(entities: Vec<Entity>, ctx: &ExtractionContext<'_>) -> Vec<Entity> {
    let length = ctx.length as f64;

    entities
        .into_iter()
        .map(|mut entity| {
            let base = safe_number(entity.weight, 1.0);
            let positions = ctx.occurrences(&entity.name);
            let count = positions.len().max(1) as f64;

            let term_weight = ctx.domain.term_weight(&entity.name).unwrap_or(1.0);
            let term_bonus = safe_number((term_weight - 1.0) * 0.5, 0.0);
            let frequency_bonus = safe_number(safe_ln(count) * 0.5, 0.0);
            let position_bonus = positions
                .first()
                .map(|&p| safe_number((1.0 - safe_div(p as f64, length, 1.0)) * 0.3, 0.0))
                .unwrap_or(0.0);
            let category_bonus = safe_number(category_bonus(&entity, ctx.domain), 0.0);
            let domain_bonus = match entity.properties.get("domain").and_then(|v| v.as_str()) {
                Some(d) if d == ctx.domain.name() => 0.2,
                _ => 0.0,
            };

            entity.weight = safe_number(
                base + term_bonus + frequency_bonus + position_bonus + category_bonus + domain_bonus,
                base,
            );
            entity = entity.with_property("frequency", positions.len() as u64);
            if let Some(&first) = positions.first() {
                entity = entity.with_property("first_position", first as u64);
            }
            entity
        })
        .collect()
}

/// True for names that carry meaning on their own.
pub fn is_meaningful_name(name: &str, domain: &ActiveDomain) -> bool {
    let trimmed = name.trim();
    let len = char_len(trimmed);
    let whitelisted = is_whitelisted(trimmed);

    if !whitelisted && !(MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len) {
        return false;
    }
    if !trimmed.chars().any(|c| c.is_alphabetic() || is_cjk(c)) {
        return false;
    }
    if is_stopword(trimmed) {
        return false;
    }
    if domain.is_core_term(trimmed) || whitelisted {
        return true;
    }
    if trimmed.chars().any(is_cjk) {
        let first = trimmed.chars().next();
        let last = trimmed.chars().next_back();
        if first.map(|c| FUNCTION_PREFIXES.contains(&c)).unwrap_or(false)
            || last.map(|c| FUNCTION_SUFFIXES.contains(&c)).unwrap_or(false)
            || trimmed.chars().any(|c| FILLER_PARTICLES.contains(&c))
        {
            return false;
        }
    }
    true
}

/// Drops weak and meaningless entities, then sorts by weight descending.
pub fn filter(entities: Vec<Entity>, domain: &ActiveDomain) -> Vec<Entity> {
    let mut kept: Vec<Entity> = entities
        .into_iter()
        .filter(|e| e.weight >= MIN_ENTITY_WEIGHT && is_meaningful_name(&e.name, domain))
        .map(|mut e| {
            e.weight = round_to(e.weight, 3).max(MIN_ENTITY_WEIGHT);
            e
        })
        .collect();
    kept.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.name.cmp(&b.name)));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::domain::DomainRegistry;

    const SAMPLE: &str = "ROI是数字营销的核心指标，内容营销通过用户画像提升转化率";

    fn names(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_split_run_on_function_words() {
        let run: Vec<char> = "内容营销通过用户画像提升转化率".chars().collect();
        assert_eq!(split_run(&run), vec!["内容营销", "用户画像", "转化率"]);
    }

    #[test]
    fn test_supplement_marketing_terms() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get("marketing");
        let ctx = ExtractionContext::new(SAMPLE, &domain, None);
        let found = deduplicate(supplement(&ctx));
        for expected in ["ROI", "数字营销", "内容营销", "用户画像", "转化率"] {
            assert!(names(&found).contains(&expected), "missing {expected}");
        }
        let roi = found.iter().find(|e| e.name == "ROI").unwrap();
        assert_eq!(roi.category, category::CORE_CONCEPT);
    }

    #[test]
    fn test_deduplicate_keeps_max_weight_and_merges_properties() {
        let a = Entity::new("Data Lake", NodeType::Concept, category::KEY_PHRASE, 1.0)
            .with_property("source", "ner:pattern");
        let b = Entity::new("data lake", NodeType::Tool, category::TOOL, 2.5)
            .with_property("domain", "technology");
        let out = deduplicate(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].weight, 2.5);
        assert_eq!(out[0].node_type, NodeType::Tool);
        assert_eq!(out[0].name, "Data Lake");
        assert!(out[0].properties.contains_key("source"));
        assert!(out[0].properties.contains_key("domain"));
    }

    #[test]
    fn test_promote_substring_of_core_term() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get("marketing");
        let out = promote_core(
            vec![Entity::new("营销漏斗", NodeType::Concept, category::KEY_PHRASE, 1.0)],
            &domain,
        );
        assert_eq!(out[0].category, category::CORE_CONCEPT);
        assert_eq!(out[0].weight, 2.5);
    }

    #[test]
    fn test_meaningless_names_rejected() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get("general");
        assert!(!is_meaningful_name("的数据", &domain));
        assert!(!is_meaningful_name("12345", &domain));
        assert!(!is_meaningful_name("营", &domain));
        assert!(!is_meaningful_name("我们", &domain));
        assert!(!is_meaningful_name("the", &domain));
        assert!(is_meaningful_name("AI", &domain));
        assert!(is_meaningful_name("5G", &domain));
        assert!(is_meaningful_name("推荐系统", &domain));
    }

    #[test]
    fn test_score_is_finite_and_filter_enforces_floor() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get("marketing");
        let ctx = ExtractionContext::new(SAMPLE, &domain, None);
        let entities = vec![
            Entity::new("转化率", NodeType::Concept, category::CORE_CONCEPT, f64::NAN),
            Entity::new("无关词", NodeType::Concept, category::KEY_PHRASE, 0.01),
        ];
        let scored = score(entities, &ctx);
        assert!(scored.iter().all(|e| e.weight.is_finite()));
        let kept = filter(scored, &domain);
        assert_eq!(names(&kept), vec!["转化率"]);
        assert!(kept.iter().all(|e| e.weight >= MIN_ENTITY_WEIGHT));
    }

    #[tokio::test]
    async fn test_extract_sorted_by_weight() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get("marketing");
        let ctx = ExtractionContext::new(SAMPLE, &domain, Some("doc-1"));
        let entities = EntityExtractor::default().extract(&ctx).await;
        assert!(entities.windows(2).all(|w| w[0].weight >= w[1].weight));
        let roi = entities.iter().find(|e| e.name == "ROI").unwrap();
        assert_eq!(roi.category, category::CORE_CONCEPT);
        assert_eq!(roi.properties["document"], "doc-1");
    }
}
