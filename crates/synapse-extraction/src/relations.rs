//! Relation extraction: pattern matches and sentence co-occurrence, followed
//! by the quality pass in [`crate::quality`].

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use synapse_core::domain::{expand_relation_pattern, CompiledRelationPattern};
use synapse_core::entity::{category, normalize_name, Entity, NodeType, Relation};
use synapse_core::numeric::{clamp_relation_weight, clamp_unit, safe_div};
use synapse_core::text::{char_len, find_occurrences, normalized_similarity, split_sentences, truncate_chars};

use crate::context::ExtractionContext;
use crate::lexicon::{has_relation_keyword, keyword_relation};
use crate::quality;

pub const RELATED_TO: &str = "related_to";
pub const USED_FOR: &str = "used_for";

const SIMILARITY_THRESHOLD: f64 = 0.7;
const COOCCURRENCE_BASE: f64 = 0.3;
const COOCCURRENCE_INCREMENT: f64 = 0.3;
const KEYWORD_BONUS: f64 = 0.2;
const CONTEXT_CHARS: usize = 80;

/// Verb patterns applied after the domain's own relation patterns.
const BASE_PATTERNS: &[(&str, &str, f64)] = &[
    (r"{term}(?:用于|应用于|用来){term}", "used_for", 0.7),
    (r"{en} (?:is used for|is applied to) {en}", "used_for", 0.7),
    (r"{term}(?:包含|包括|涵盖){term}", "contains", 0.75),
    (r"{en} (?:contains|includes) {en}", "contains", 0.75),
    (r"{term}(?:基于|依托于|建立在){term}", "based_on", 0.7),
    (r"{en} (?:is based on|builds on) {en}", "based_on", 0.7),
    (r"{term}(?:影响|作用于){term}", "influences", 0.7),
    (r"{en} (?:influences|affects) {en}", "influences", 0.7),
    (r"{term}(?:属于|隶属于){term}", "belongs_to", 0.7),
    (r"{en} (?:belongs to|is part of) {en}", "belongs_to", 0.7),
    (r"{term}(?:需要|依赖|要求){term}", "requires", 0.7),
    (r"{en} (?:requires|needs|depends on) {en}", "requires", 0.7),
    (r"{term}(?:产生|生成|带来){term}", "generates", 0.7),
    (r"{en} (?:generates|produces) {en}", "generates", 0.7),
    (r"{term}(?:优化|提升|提高|改善){term}", "optimizes", 0.8),
    (r"{en} (?:optimizes|improves) {en}", "optimizes", 0.8),
    (r"{term}(?:分析|评估){term}", "analyzes", 0.7),
    (r"{en} (?:analyzes|evaluates) {en}", "analyzes", 0.7),
    (r"{term}(?:集成|整合|融合){term}", "integrates", 0.7),
    (r"{en} (?:integrates with|integrates) {en}", "integrates", 0.7),
];

static BASE_RELATION_PATTERNS: LazyLock<Vec<CompiledRelationPattern>> = LazyLock::new(|| {
    BASE_PATTERNS
        .iter()
        .filter_map(|(pattern, relation_type, weight)| {
            match Regex::new(&expand_relation_pattern(pattern)) {
                Ok(regex) => Some(CompiledRelationPattern {
                    regex,
                    relation_type: relation_type.to_string(),
                    weight: *weight,
                }),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "Skipping invalid base relation pattern");
                    None
                }
            }
        })
        .collect()
});

/// Which side of a relation verb a captured span sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanSide {
    Left,
    Right,
}

/// Resolves a captured span to an entity index: exact match, then an entity
/// contained in the span (nearest to the verb, longer name on ties), then an
/// entity containing the span, then fuzzy similarity above 0.7.
pub fn resolve_span(span: &str, side: SpanSide, entities: &[Entity]) -> Option<usize> {
    let key = normalize_name(span);
    if key.is_empty() {
        return None;
    }
    if let Some(i) = entities.iter().position(|e| e.normalized_name() == key) {
        return Some(i);
    }

    let mut best: Option<(usize, usize, usize)> = None;
    for (i, entity) in entities.iter().enumerate() {
        let name = entity.normalized_name();
        let name_len = char_len(&name);
        if name_len < 2 {
            continue;
        }
        let found = match side {
            SpanSide::Left => key.rfind(&name),
            SpanSide::Right => key.find(&name),
        };
        if let Some(byte) = found {
            let start = key[..byte].chars().count();
            let closeness = match side {
                SpanSide::Left => start + name_len,
                SpanSide::Right => usize::MAX - start,
            };
            if best.map(|(_, c, l)| (closeness, name_len) > (c, l)).unwrap_or(true) {
                best = Some((i, closeness, name_len));
            }
        }
    }
    if let Some((i, _, _)) = best {
        return Some(i);
    }

    if let Some((i, _)) = entities
        .iter()
        .enumerate()
        .filter(|(_, e)| e.normalized_name().contains(&key))
        .min_by_key(|(_, e)| char_len(&e.name))
    {
        return Some(i);
    }

    entities
        .iter()
        .enumerate()
        .map(|(i, e)| (i, normalized_similarity(&key, &e.normalized_name())))
        .filter(|(_, similarity)| *similarity > SIMILARITY_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Domain relation patterns, then the base verb patterns. The first pattern
/// to link a pair decides its type; later matches of another type for the
/// same pair are dropped.
pub fn pattern_relations(ctx: &ExtractionContext<'_>, entities: &[Entity]) -> Vec<Relation> {
    let mut relations = Vec::new();
    let mut typed_pairs: HashMap<(String, String), String> = HashMap::new();

    for pattern in ctx.domain.relation_patterns().iter().chain(BASE_RELATION_PATTERNS.iter()) {
        for caps in pattern.regex.captures_iter(ctx.text) {
            let (Some(left), Some(right)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let source = resolve_span(left.as_str(), SpanSide::Left, entities);
            let target = resolve_span(right.as_str(), SpanSide::Right, entities);
            match (source, target) {
                (Some(s), Some(t)) if s != t => {
                    let pair = pair_key(&entities[s].id, &entities[t].id);
                    match typed_pairs.get(&pair) {
                        Some(existing) if *existing != pattern.relation_type => {
                            tracing::debug!(
                                existing = %existing,
                                relation_type = %pattern.relation_type,
                                "Pair already typed by an earlier pattern"
                            );
                            continue;
                        }
                        Some(_) => {}
                        None => {
                            typed_pairs.insert(pair, pattern.relation_type.clone());
                        }
                    }
                    let weight = clamp_relation_weight(pattern.weight);
                    let context = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                    relations.push(
                        Relation::new(&entities[s].id, &entities[t].id, &pattern.relation_type, weight)
                            .with_property("method", "pattern")
                            .with_property("context", truncate_chars(context, CONTEXT_CHARS))
                            .with_property("confidence", weight),
                    );
                }
                _ => {
                    tracing::debug!(
                        left = %left.as_str(),
                        right = %right.as_str(),
                        relation_type = %pattern.relation_type,
                        "Dropping pattern match with unresolved span"
                    );
                }
            }
        }
    }

    dedupe_relations(relations)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairStats {
    pub sentences: usize,
    /// Smallest char distance between the two mentions in any shared sentence.
    pub min_gap: Option<usize>,
    /// A relation keyword sat between the two mentions in some sentence.
    pub keyword: bool,
}

/// First occurrence of an entity in a sentence, as a char range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mention {
    pub entity: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct SentenceMentions {
    pub text: String,
    pub lowered: String,
    /// Sorted by position.
    pub mentions: Vec<Mention>,
}

impl SentenceMentions {
    /// Lowercased text strictly between two mentions, in either order. Empty
    /// when the mentions touch or overlap, or when another entity is
    /// mentioned in between, since any verb there belongs to that entity.
    pub fn between(&self, a: &Mention, b: &Mention) -> String {
        let (first, second) = if a.start <= b.start { (a, b) } else { (b, a) };
        if first.end >= second.start {
            return String::new();
        }
        let interrupted = self.mentions.iter().any(|m| {
            m.entity != first.entity && m.entity != second.entity && m.start >= first.end && m.start < second.start
        });
        if interrupted {
            return String::new();
        }
        self.lowered
            .chars()
            .skip(first.end)
            .take(second.start - first.end)
            .collect()
    }
}

/// Per-sentence entity mentions and pairwise co-occurrence statistics.
#[derive(Debug, Clone, Default)]
pub struct CooccurrenceIndex {
    pub sentences: Vec<SentenceMentions>,
    pairs: HashMap<(String, String), PairStats>,
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl CooccurrenceIndex {
    pub fn build(text: &str, entities: &[Entity]) -> Self {
        let mut index = Self::default();

        for sentence in split_sentences(text) {
            let lowered = sentence.to_lowercase();
            let mut mentions: Vec<Mention> = entities
                .iter()
                .enumerate()
                .filter_map(|(i, e)| {
                    let name = e.name.to_lowercase();
                    find_occurrences(&lowered, &name).first().map(|&start| Mention {
                        entity: i,
                        start,
                        end: start + char_len(&name),
                    })
                })
                .collect();
            mentions.sort_by_key(|m| (m.start, m.entity));
            let sentence = SentenceMentions {
                text: sentence,
                lowered,
                mentions,
            };

            for (x, a) in sentence.mentions.iter().enumerate() {
                for b in &sentence.mentions[x + 1..] {
                    let stats = index
                        .pairs
                        .entry(pair_key(&entities[a.entity].id, &entities[b.entity].id))
                        .or_default();
                    stats.sentences += 1;
                    let gap = b.start.abs_diff(a.start);
                    stats.min_gap = Some(stats.min_gap.map_or(gap, |g| g.min(gap)));
                    stats.keyword |= has_relation_keyword(&sentence.between(a, b));
                }
            }

            index.sentences.push(sentence);
        }

        index
    }

    pub fn stats(&self, a: &str, b: &str) -> Option<&PairStats> {
        self.pairs.get(&pair_key(a, b))
    }

    pub fn cooccur(&self, a: &str, b: &str) -> bool {
        self.stats(a, b).is_some()
    }

    /// Context support in `[0, 1]`: co-occurrence count x 0.3, proximity x 0.4,
    /// relation keyword x 0.3.
    pub fn support(&self, a: &str, b: &str) -> f64 {
        let Some(stats) = self.stats(a, b) else {
            return 0.0;
        };
        let proximity = stats
            .min_gap
            .map(|gap| safe_div(1.0, 1.0 + gap as f64 / 10.0, 0.0))
            .unwrap_or(0.0);
        let keyword = if stats.keyword { 1.0 } else { 0.0 };
        clamp_unit(stats.sentences as f64 * 0.3 + proximity * 0.4 + keyword * 0.3)
    }
}

pub fn is_tool(entity: &Entity) -> bool {
    entity.node_type == NodeType::Tool || entity.category == category::TOOL
}

fn is_low_information(entity: &Entity) -> bool {
    entity.category == category::ENTITY || entity.category == category::KEY_PHRASE
}

fn category_bonus(entity: &Entity) -> f64 {
    match entity.category.as_str() {
        category::CORE_CONCEPT => 0.2,
        category::PROFESSIONAL_TERM => 0.15,
        category::TOOL | category::BUSINESS_CONCEPT => 0.1,
        _ => 0.0,
    }
}

/// Type from a keyword between the two mentions, else from the categories.
fn cooccurrence_type(source: &Entity, target: &Entity, between_lower: &str) -> (&'static str, bool) {
    if let Some(relation_type) = keyword_relation(between_lower) {
        return (relation_type, true);
    }
    let tool_concept = (is_tool(source) && target.node_type == NodeType::Concept)
        || (is_tool(target) && source.node_type == NodeType::Concept);
    if tool_concept {
        (USED_FOR, false)
    } else {
        (RELATED_TO, false)
    }
}

/// Adds sentence co-occurrence relations to `relations`. The first shared
/// sentence creates a relation, or only records the co-occurrence when a
/// pattern relation already links the pair; each further sentence adds 0.3.
pub fn cooccurrence_relations(
    index: &CooccurrenceIndex,
    entities: &[Entity],
    mut relations: Vec<Relation>,
) -> Vec<Relation> {
    let mut by_pair: HashMap<(String, String), usize> = HashMap::new();

    for sentence in &index.sentences {
        for (x, ma) in sentence.mentions.iter().enumerate() {
            for mb in &sentence.mentions[x + 1..] {
                let (source, target) = (&entities[ma.entity], &entities[mb.entity]);
                if source.id == target.id || (is_low_information(source) && is_low_information(target)) {
                    continue;
                }
                let (sn, tn) = (source.normalized_name(), target.normalized_name());
                if sn.contains(&tn) || tn.contains(&sn) {
                    continue;
                }

                let key = pair_key(&source.id, &target.id);
                if let Some(&i) = by_pair.get(&key) {
                    let relation = &mut relations[i];
                    relation.weight = (relation.weight + COOCCURRENCE_INCREMENT).min(1.0);
                    let count = relation.properties.get("cooccurrence").and_then(|v| v.as_u64()).unwrap_or(0);
                    relation.properties.insert("cooccurrence".into(), (count + 1).into());
                    continue;
                }

                if let Some(i) = relations.iter().position(|r| r.connects(&source.id, &target.id)) {
                    relations[i].properties.insert("cooccurrence".into(), 1u64.into());
                    by_pair.insert(key, i);
                    continue;
                }

                let (relation_type, keyword) = cooccurrence_type(source, target, &sentence.between(ma, mb));
                let mut weight = COOCCURRENCE_BASE + category_bonus(source) + category_bonus(target);
                if keyword {
                    weight += KEYWORD_BONUS;
                }
                let weight = clamp_relation_weight(weight);
                relations.push(
                    Relation::new(&source.id, &target.id, relation_type, weight)
                        .with_property("method", "cooccurrence")
                        .with_property("context", truncate_chars(&sentence.text, CONTEXT_CHARS))
                        .with_property("cooccurrence", 1u64),
                );
                by_pair.insert(key, relations.len() - 1);
            }
        }
    }

    relations
}

/// Collapses relations sharing `(source, target, type)`: max weight, merged
/// properties.
pub fn dedupe_relations(relations: Vec<Relation>) -> Vec<Relation> {
    let mut index = HashMap::new();
    let mut out: Vec<Relation> = Vec::with_capacity(relations.len());

    for relation in relations {
        match index.get(&relation.key()) {
            Some(&i) => {
                let existing: &mut Relation = &mut out[i];
                existing.weight = existing.weight.max(relation.weight);
                for (k, v) in relation.properties {
                    existing.properties.entry(k).or_insert(v);
                }
            }
            None => {
                index.insert(relation.key(), out.len());
                out.push(relation);
            }
        }
    }

    out
}

#[derive(Debug, Default, Clone)]
pub struct RelationExtractor;

impl RelationExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Pattern relations, co-occurrence relations, then the quality pass.
    pub fn extract(&self, ctx: &ExtractionContext<'_>, entities: &[Entity]) -> Vec<Relation> {
        if entities.len() < 2 {
            return Vec::new();
        }

        let patterns = pattern_relations(ctx, entities);
        let pattern_count = patterns.len();
        let index = CooccurrenceIndex::build(ctx.text, entities);
        let combined = cooccurrence_relations(&index, entities, patterns);
        let combined_count = combined.len();
        let relations = quality::enhance(combined, entities, &index);

        tracing::debug!(
            pattern_relations = pattern_count,
            candidates = combined_count,
            relations = relations.len(),
            "Relation extraction complete"
        );
        relations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::domain::DomainRegistry;

    fn entity(name: &str, cat: &str) -> Entity {
        Entity::new(name, NodeType::Concept, cat, 2.0)
    }

    #[test]
    fn test_resolve_span_exact_then_substring() {
        let entities = vec![
            entity("内容营销", category::CORE_CONCEPT),
            entity("用户画像", category::CORE_CONCEPT),
        ];
        assert_eq!(resolve_span("用户画像", SpanSide::Left, &entities), Some(1));
        assert_eq!(resolve_span("内容营销通过用户画像", SpanSide::Left, &entities), Some(1));
        assert_eq!(resolve_span("内容营销通过用户画像", SpanSide::Right, &entities), Some(0));
        assert_eq!(resolve_span("画像", SpanSide::Right, &entities), Some(1));
        assert_eq!(resolve_span("完全无关", SpanSide::Right, &entities), None);
    }

    #[test]
    fn test_resolve_span_fuzzy() {
        let entities = vec![entity("recommendation", category::KEY_PHRASE)];
        assert_eq!(resolve_span("recomendation", SpanSide::Left, &entities), Some(0));
    }

    #[test]
    fn test_pattern_relation_improves() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get("marketing");
        let text = "内容营销通过用户画像提升转化率";
        let ctx = ExtractionContext::new(text, &domain, None);
        let entities = vec![
            entity("内容营销", category::CORE_CONCEPT),
            entity("用户画像", category::CORE_CONCEPT),
            entity("转化率", category::CORE_CONCEPT),
        ];
        let relations = pattern_relations(&ctx, &entities);
        assert!(relations.iter().any(|r| r.relation_type == "improves"
            && r.source == entities[1].id
            && r.target == entities[2].id));
    }

    #[test]
    fn test_cooccurrence_skips_low_information_pairs() {
        let entities = vec![
            entity("alpha", category::KEY_PHRASE),
            entity("beta", category::KEY_PHRASE),
            entity("gamma", category::CORE_CONCEPT),
        ];
        let index = CooccurrenceIndex::build("alpha beta gamma.", &entities);
        let relations = cooccurrence_relations(&index, &entities, Vec::new());
        assert_eq!(relations.len(), 2);
        assert!(relations.iter().all(|r| r.source != entities[1].id || r.target != entities[0].id));
        assert!(!relations.iter().any(|r| r.connects(&entities[0].id, &entities[1].id)));
    }

    #[test]
    fn test_cooccurrence_reinforces_across_sentences() {
        let entities = vec![
            entity("pricing", category::CORE_CONCEPT),
            entity("retention", category::PROFESSIONAL_TERM),
        ];
        let text = "pricing shapes retention. Again pricing and retention. pricing, retention!";
        let index = CooccurrenceIndex::build(text, &entities);
        let relations = cooccurrence_relations(&index, &entities, Vec::new());
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].source, entities[0].id);
        assert_eq!(relations[0].properties["cooccurrence"], 3);
        assert_eq!(relations[0].weight, 1.0);
        assert_eq!(index.stats(&entities[0].id, &entities[1].id).unwrap().sentences, 3);
    }

    #[test]
    fn test_cooccurrence_keyword_types_only_the_pair_it_joins() {
        let entities = vec![
            entity("品牌", category::CORE_CONCEPT),
            entity("内容营销", category::CORE_CONCEPT),
            entity("转化率", category::CORE_CONCEPT),
        ];
        let index = CooccurrenceIndex::build("品牌和内容营销提升转化率", &entities);
        let relations = cooccurrence_relations(&index, &entities, Vec::new());
        let type_of = |a: usize, b: usize| {
            relations
                .iter()
                .find(|r| r.connects(&entities[a].id, &entities[b].id))
                .map(|r| r.relation_type.as_str())
        };
        assert_eq!(type_of(1, 2), Some("optimizes"));
        assert_eq!(type_of(0, 1), Some(RELATED_TO));
        assert_eq!(type_of(0, 2), Some(RELATED_TO));
        assert!(index.stats(&entities[1].id, &entities[2].id).unwrap().keyword);
        assert!(!index.stats(&entities[0].id, &entities[2].id).unwrap().keyword);
    }

    #[test]
    fn test_tool_concept_pair_without_keyword_is_used_for() {
        let entities = vec![
            Entity::new("Python", NodeType::Tool, category::TOOL, 2.5),
            entity("数据清洗", category::PROFESSIONAL_TERM),
        ];
        let index = CooccurrenceIndex::build("Python 和 数据清洗", &entities);
        let relations = cooccurrence_relations(&index, &entities, Vec::new());
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].relation_type, USED_FOR);
    }

    #[test]
    fn test_first_pattern_type_wins_for_a_pair() {
        let registry = DomainRegistry::builtin();
        let domain = registry.get("marketing");
        let text = "内容营销通过用户画像提升转化率";
        let ctx = ExtractionContext::new(text, &domain, None);
        let entities = vec![
            entity("内容营销", category::CORE_CONCEPT),
            entity("用户画像", category::CORE_CONCEPT),
            entity("转化率", category::CORE_CONCEPT),
        ];
        let relations = pattern_relations(&ctx, &entities);
        let linking: Vec<_> = relations
            .iter()
            .filter(|r| r.connects(&entities[1].id, &entities[2].id))
            .collect();
        assert_eq!(linking.len(), 1);
        assert_eq!(linking[0].relation_type, "improves");

        let index = CooccurrenceIndex::build(text, &entities);
        let combined = cooccurrence_relations(&index, &entities, relations);
        assert_eq!(
            combined
                .iter()
                .filter(|r| r.connects(&entities[1].id, &entities[2].id))
                .count(),
            1
        );
    }

    #[test]
    fn test_support_is_bounded() {
        let entities = vec![
            entity("pricing", category::CORE_CONCEPT),
            entity("retention", category::PROFESSIONAL_TERM),
        ];
        let text = "pricing improves retention. pricing improves retention. pricing improves retention.";
        let index = CooccurrenceIndex::build(text, &entities);
        let support = index.support(&entities[0].id, &entities[1].id);
        assert!((0.0..=1.0).contains(&support));
        assert_eq!(index.support(&entities[0].id, "missing"), 0.0);
    }
}
