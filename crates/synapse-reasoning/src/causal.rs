//! Causal relation harvesting and chain building.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use synapse_core::entity::{normalize_name, Entity, Graph};
use synapse_core::numeric::{round_to, safe_div, safe_number};
use synapse_core::reasoning::{CausalAnalysis, CausalChain, CausalOrigin, CausalRelation, CentralCause};
use synapse_core::text::{find_occurrences, split_sentences};

/// Chains longer than this many relations are cut.
pub const MAX_CHAIN_RELATIONS: usize = 5;
pub const TOP_CHAINS: usize = 20;
const MAX_ENUMERATED_CHAINS: usize = 2_000;
const TOP_CENTRAL_CAUSES: usize = 5;

/// Edge types read as causal when they appear in the graph.
pub const STRUCTURAL_CAUSAL_TYPES: &[&str] = &["used_for", "generates", "influences", "optimizes", "requires"];

/// Which captured span is the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// `X verb Y`: X causes Y.
    Forward,
    /// `X verb Y`: Y causes X.
    Backward,
}

struct CausalPattern {
    regex: Regex,
    relation_type: &'static str,
    confidence: f64,
    direction: Direction,
}

// The left span is lazy so it stops at the first verb; the right one is
// greedy and resolved from its start.
const LEFT_SPAN: &str = r"([\p{Han}A-Za-z0-9][\p{Han}A-Za-z0-9 ]{0,23}?)";
const RIGHT_SPAN: &str = r"([\p{Han}A-Za-z0-9][\p{Han}A-Za-z0-9 ]{0,23})";
const CJK_SPAN: &str = r"([\p{Han}A-Za-z0-9]{2,12})";

static CAUSAL_PATTERNS: LazyLock<Vec<CausalPattern>> = LazyLock::new(|| {
    let table: &[(&str, &'static str, f64, Direction)] = &[
        (r"{cjk}由{cjk}(?:引起|导致|造成)", "caused_by", 0.9, Direction::Backward),
        (r"{cjk}(?:源于|归因于|取决于){cjk}", "caused_by", 0.9, Direction::Backward),
        (r"{cjk}(?:导致|造成|引起|引发){cjk}", "causes", 0.9, Direction::Forward),
        (r"(?i){span}\s+(?:causes|leads to|led to|results in)\s+{span}", "causes", 0.9, Direction::Forward),
        (r"(?i){span}\s+(?:is caused by|results from|stems from)\s+{span}", "caused_by", 0.9, Direction::Backward),
        (r"{cjk}(?:影响|作用于){cjk}", "influences", 0.7, Direction::Forward),
        (r"(?i){span}\s+(?:influences|affects|impacts)\s+{span}", "influences", 0.7, Direction::Forward),
        (r"{cjk}(?:需要|依赖|要求){cjk}", "requires", 0.6, Direction::Backward),
        (r"(?i){span}\s+(?:requires|depends on|needs)\s+{span}", "requires", 0.6, Direction::Backward),
        (r"{cjk}(?:优化|提升|提高|改善|促进){cjk}", "optimizes", 0.8, Direction::Forward),
        (r"(?i){span}\s+(?:optimizes|improves|boosts|increases)\s+{span}", "optimizes", 0.8, Direction::Forward),
    ];

    table
        .iter()
        .filter_map(|(template, relation_type, confidence, direction)| {
            let pattern = template
                .replacen("{span}", LEFT_SPAN, 1)
                .replacen("{span}", RIGHT_SPAN, 1)
                .replace("{cjk}", CJK_SPAN);
            match Regex::new(&pattern) {
                Ok(regex) => Some(CausalPattern {
                    regex,
                    relation_type: *relation_type,
                    confidence: *confidence,
                    direction: *direction,
                }),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "Skipping invalid causal pattern");
                    None
                }
            }
        })
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// Span precedes the verb; prefer the mention closest to its end.
    Left,
    /// Span follows the verb; prefer the mention closest to its start.
    Right,
}

/// Resolves a captured span to a node: exact name, then a node mentioned
/// inside the span, then a node whose name contains the span.
fn resolve<'g>(graph: &'g Graph, span: &str, side: Side) -> Option<&'g Entity> {
    let key = normalize_name(span);
    if key.is_empty() {
        return None;
    }
    if let Some(node) = graph.nodes.iter().find(|n| n.normalized_name() == key) {
        return Some(node);
    }

    let lowered = span.to_lowercase();
    let span_len = lowered.chars().count();
    let mut best: Option<(&Entity, usize)> = None;
    for node in &graph.nodes {
        let name = node.name.to_lowercase();
        let name_len = name.chars().count();
        let occurrences = find_occurrences(&lowered, &name);
        let distance = match side {
            Side::Left => occurrences.last().map(|&start| span_len.saturating_sub(start + name_len)),
            Side::Right => occurrences.first().copied(),
        };
        if let Some(distance) = distance {
            let better = match best {
                None => true,
                Some((current, d)) => distance < d || (distance == d && name_len > current.name.chars().count()),
            };
            if better {
                best = Some((node, distance));
            }
        }
    }
    if let Some((node, _)) = best {
        return Some(node);
    }

    graph
        .nodes
        .iter()
        .filter(|n| n.normalized_name().contains(&key))
        .min_by_key(|n| n.name.chars().count())
}

/// Causal relations stated in the text, resolved onto graph nodes.
pub fn text_causal_relations(graph: &Graph, text: &str) -> Vec<CausalRelation> {
    let mut found = Vec::new();
    for sentence in split_sentences(text) {
        for pattern in CAUSAL_PATTERNS.iter() {
            for caps in pattern.regex.captures_iter(&sentence) {
                let (Some(left), Some(right)) = (caps.get(1), caps.get(2)) else {
                    continue;
                };
                let (Some(left), Some(right)) = (
                    resolve(graph, left.as_str().trim(), Side::Left),
                    resolve(graph, right.as_str().trim(), Side::Right),
                ) else {
                    continue;
                };
                if left.id == right.id {
                    continue;
                }
                let (cause, effect) = match pattern.direction {
                    Direction::Forward => (left, right),
                    Direction::Backward => (right, left),
                };
                found.push(CausalRelation {
                    cause: cause.id.clone(),
                    effect: effect.id.clone(),
                    cause_name: cause.name.clone(),
                    effect_name: effect.name.clone(),
                    relation_type: pattern.relation_type.to_string(),
                    confidence: pattern.confidence,
                    origin: CausalOrigin::Text,
                    evidence: caps.get(0).map(|m| m.as_str().to_string()),
                });
            }
        }
    }
    found
}

/// Graph edges of causal types. `requires` is reversed: the required thing
/// is the cause.
pub fn structural_causal_relations(graph: &Graph) -> Vec<CausalRelation> {
    let nodes: HashMap<&str, &Entity> = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
    graph
        .links
        .iter()
        .filter(|l| STRUCTURAL_CAUSAL_TYPES.contains(&l.relation_type.as_str()))
        .filter_map(|l| {
            let (source, target) = (nodes.get(l.source.as_str())?, nodes.get(l.target.as_str())?);
            if source.id == target.id {
                return None;
            }
            let (cause, effect) = if l.relation_type == "requires" {
                (target, source)
            } else {
                (source, target)
            };
            Some(CausalRelation {
                cause: cause.id.clone(),
                effect: effect.id.clone(),
                cause_name: cause.name.clone(),
                effect_name: effect.name.clone(),
                relation_type: l.relation_type.clone(),
                confidence: safe_number(l.weight, 0.0),
                origin: CausalOrigin::Graph,
                evidence: None,
            })
        })
        .collect()
}

/// One relation per `(cause, effect)`, keeping the most confident.
fn dedupe(relations: Vec<CausalRelation>) -> Vec<CausalRelation> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut out: Vec<CausalRelation> = Vec::new();
    for relation in relations {
        let key = (relation.cause.clone(), relation.effect.clone());
        match index.get(&key) {
            Some(&i) if out[i].confidence >= relation.confidence => {}
            Some(&i) => out[i] = relation,
            None => {
                index.insert(key, out.len());
                out.push(relation);
            }
        }
    }
    out
}

struct ChainSearch<'a> {
    relations: &'a [CausalRelation],
    by_cause: HashMap<&'a str, Vec<usize>>,
    chains: Vec<Vec<usize>>,
}

impl ChainSearch<'_> {
    fn extend(&mut self, chain: &mut Vec<usize>, visited: &mut HashSet<String>) {
        if self.chains.len() >= MAX_ENUMERATED_CHAINS {
            return;
        }
        let Some(&last) = chain.last() else {
            return;
        };
        let tail = self.relations[last].effect.as_str();
        let next: Vec<usize> = if chain.len() >= MAX_CHAIN_RELATIONS {
            Vec::new()
        } else {
            self.by_cause
                .get(tail)
                .map(|v| {
                    v.iter()
                        .copied()
                        .filter(|&r| !visited.contains(&self.relations[r].effect))
                        .collect()
                })
                .unwrap_or_default()
        };

        if next.is_empty() {
            if chain.len() >= 2 {
                self.chains.push(chain.clone());
            }
            return;
        }
        for r in next {
            let effect = self.relations[r].effect.clone();
            visited.insert(effect.clone());
            chain.push(r);
            self.extend(chain, visited);
            chain.pop();
            visited.remove(&effect);
        }
    }
}

fn is_contiguous_part(short: &[usize], long: &[usize]) -> bool {
    short.len() < long.len() && long.windows(short.len()).any(|w| w == short)
}

/// Maximal simple chains of 2..=5 relations where each effect is the next
/// cause, best mean confidence first.
pub fn build_chains(relations: &[CausalRelation]) -> Vec<CausalChain> {
    let mut by_cause: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, r) in relations.iter().enumerate() {
        by_cause.entry(r.cause.as_str()).or_default().push(i);
    }
    let mut search = ChainSearch {
        relations,
        by_cause,
        chains: Vec::new(),
    };
    for start in 0..relations.len() {
        let mut visited: HashSet<String> =
            [relations[start].cause.clone(), relations[start].effect.clone()].into_iter().collect();
        let mut chain = vec![start];
        search.extend(&mut chain, &mut visited);
    }

    let found = search.chains;
    let mut chains: Vec<CausalChain> = found
        .iter()
        .filter(|c| !found.iter().any(|other| is_contiguous_part(c, other)))
        .map(|c| {
            let members: Vec<CausalRelation> = c.iter().map(|&i| relations[i].clone()).collect();
            let confidence = safe_div(
                members.iter().map(|r| r.confidence).sum(),
                members.len() as f64,
                0.0,
            );
            CausalChain {
                relations: members,
                confidence: round_to(confidence, 4),
            }
        })
        .collect();

    chains.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(b.relations.len().cmp(&a.relations.len()))
    });
    chains.truncate(TOP_CHAINS);
    chains
}

fn central_causes(chains: &[CausalChain]) -> Vec<CentralCause> {
    let mut counts: BTreeMap<&str, (usize, &str)> = BTreeMap::new();
    for relation in chains.iter().flat_map(|c| &c.relations) {
        let entry = counts
            .entry(relation.cause.as_str())
            .or_insert((0, relation.cause_name.as_str()));
        entry.0 += 1;
    }
    let mut causes: Vec<CentralCause> = counts
        .into_iter()
        .map(|(id, (occurrences, name))| CentralCause {
            id: id.to_string(),
            name: name.to_string(),
            occurrences,
        })
        .collect();
    causes.sort_by(|a, b| b.occurrences.cmp(&a.occurrences).then_with(|| a.name.cmp(&b.name)));
    causes.truncate(TOP_CENTRAL_CAUSES);
    causes
}

fn chain_label(chain: &CausalChain) -> String {
    let mut label = chain.relations.first().map(|r| r.cause_name.clone()).unwrap_or_default();
    for relation in &chain.relations {
        label.push_str(" -> ");
        label.push_str(&relation.effect_name);
    }
    label
}

/// Harvests causal relations from the text and the graph, chains them and
/// summarizes the most central causes.
pub fn build_causal_chains(graph: &Graph, text: &str) -> CausalAnalysis {
    let mut relations = text_causal_relations(graph, text);
    relations.extend(structural_causal_relations(graph));
    let relations = dedupe(relations);
    let chains = build_chains(&relations);
    let central = central_causes(&chains);

    let mut insights = Vec::new();
    if let Some(top) = central.first() {
        insights.push(format!(
            "'{}' is the most central cause, driving {} link(s) across causal chains",
            top.name, top.occurrences
        ));
    }
    if let Some(best) = chains.first() {
        insights.push(format!(
            "Strongest causal chain: {} (confidence {:.2})",
            chain_label(best),
            best.confidence
        ));
    }
    if chains.is_empty() && !relations.is_empty() {
        insights.push(format!(
            "{} direct causal relation(s) found but none chain together",
            relations.len()
        ));
    }

    tracing::debug!(relations = relations.len(), chains = chains.len(), "Causal analysis complete");

    CausalAnalysis {
        relations,
        chains,
        central_causes: central,
        insights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synapse_core::entity::{category, NodeType, Relation};

    fn node(name: &str) -> Entity {
        Entity::new(name, NodeType::Concept, category::KEY_PHRASE, 1.0)
    }

    #[test]
    fn test_text_pattern_resolves_nearest_mentions() {
        let graph = Graph::new(
            vec![node("内容营销"), node("用户画像"), node("转化率")],
            Vec::new(),
        );
        let found = text_causal_relations(&graph, "内容营销通过用户画像提升转化率。");
        let rel = found.iter().find(|r| r.relation_type == "optimizes").unwrap();
        assert_eq!(rel.cause_name, "用户画像");
        assert_eq!(rel.effect_name, "转化率");
        assert_eq!(rel.origin, CausalOrigin::Text);
    }

    #[test]
    fn test_requires_reads_prerequisite_as_cause() {
        let graph = Graph::new(vec![node("模型训练"), node("数据")], Vec::new());
        let found = text_causal_relations(&graph, "模型训练需要数据");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cause_name, "数据");
        assert_eq!(found[0].effect_name, "模型训练");

        let a = node("model");
        let b = node("data");
        let g = Graph::new(vec![a.clone(), b.clone()], vec![Relation::new(&a.id, &b.id, "requires", 0.7)]);
        let structural = structural_causal_relations(&g);
        assert_eq!(structural[0].cause, b.id);
        assert_eq!(structural[0].confidence, 0.7);
    }

    #[test]
    fn test_english_pattern() {
        let graph = Graph::new(vec![node("churn"), node("revenue")], Vec::new());
        let found = text_causal_relations(&graph, "Churn causes revenue loss.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].cause_name, "churn");
        assert_eq!(found[0].effect_name, "revenue");
    }

    #[test]
    fn test_chains_are_maximal() {
        let (a, b, c, d) = (node("a"), node("b"), node("c"), node("d"));
        let graph = Graph::new(
            vec![a.clone(), b.clone(), c.clone(), d.clone()],
            vec![
                Relation::new(&a.id, &b.id, "used_for", 0.8),
                Relation::new(&b.id, &c.id, "generates", 0.6),
                Relation::new(&c.id, &d.id, "influences", 0.7),
                Relation::new(&d.id, &a.id, "related_to", 0.9),
            ],
        );
        let analysis = build_causal_chains(&graph, "");
        assert_eq!(analysis.relations.len(), 3);
        assert_eq!(analysis.chains.len(), 1);
        let chain = &analysis.chains[0];
        assert_eq!(chain.node_ids(), vec![a.id.as_str(), b.id.as_str(), c.id.as_str(), d.id.as_str()]);
        assert!((chain.confidence - 0.7).abs() < 1e-9);
        assert_eq!(analysis.central_causes.len(), 3);
        assert_eq!(analysis.insights.len(), 2);
    }

    #[test]
    fn test_cycle_does_not_loop() {
        let (a, b) = (node("a"), node("b"));
        let graph = Graph::new(
            vec![a.clone(), b.clone()],
            vec![
                Relation::new(&a.id, &b.id, "influences", 0.8),
                Relation::new(&b.id, &a.id, "influences", 0.8),
            ],
        );
        let analysis = build_causal_chains(&graph, "");
        assert!(analysis.chains.is_empty());
        assert_eq!(analysis.relations.len(), 2);
    }
}
