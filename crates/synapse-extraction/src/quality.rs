//! Relation quality pass over the union of pattern and co-occurrence
//! relations: inference, hierarchy, strength, filtering, type upgrade.

use std::collections::{HashMap, HashSet};

use synapse_core::entity::{category, Entity, NodeType, Relation};
use synapse_core::numeric::{clamp_relation_weight, clamp_unit, round_to, safe_number, safe_sqrt};

use crate::relations::{dedupe_relations, is_tool, CooccurrenceIndex, RELATED_TO};

const INFERENCE_SUPPORT_THRESHOLD: f64 = 0.3;
const MIN_RELATION_WEIGHT: f64 = 0.2;
const MIN_RELATED_TO_WEIGHT: f64 = 0.5;
const DEFAULT_TYPE_MULTIPLIER: f64 = 0.5;

pub const CONTAINS_CONCEPT: &str = "contains_concept";

#[derive(Debug, Clone, Copy)]
enum Predicate {
    Tool,
    Category(&'static str),
}

impl Predicate {
    fn matches(&self, entity: &Entity) -> bool {
        match self {
            Predicate::Tool => is_tool(entity),
            Predicate::Category(c) => entity.category == *c && !is_tool(entity),
        }
    }
}

struct InferenceRule {
    source: Predicate,
    target: Predicate,
    relation_type: &'static str,
    weight: f64,
}

const INFERENCE_RULES: &[InferenceRule] = &[
    InferenceRule {
        source: Predicate::Tool,
        target: Predicate::Category(category::PROFESSIONAL_TERM),
        relation_type: "tool_implements_concept",
        weight: 0.7,
    },
    InferenceRule {
        source: Predicate::Tool,
        target: Predicate::Category(category::CORE_CONCEPT),
        relation_type: "tool_supports",
        weight: 0.6,
    },
    InferenceRule {
        source: Predicate::Category(category::CORE_CONCEPT),
        target: Predicate::Category(category::CORE_CONCEPT),
        relation_type: "concept_correlates",
        weight: 0.5,
    },
    InferenceRule {
        source: Predicate::Category(category::PROFESSIONAL_TERM),
        target: Predicate::Category(category::PROFESSIONAL_TERM),
        relation_type: "concept_associated",
        weight: 0.4,
    },
    InferenceRule {
        source: Predicate::Tool,
        target: Predicate::Tool,
        relation_type: "tool_integrates",
        weight: 0.5,
    },
];

/// Parent category contains child category when both co-occur.
const HIERARCHY_RULES: &[(&str, &str)] = &[
    (category::BUSINESS_CONCEPT, category::PROFESSIONAL_TERM),
    (category::CORE_CONCEPT, category::PROFESSIONAL_TERM),
];
const HIERARCHY_WEIGHT: f64 = 0.6;
const SUBSUMPTION_WEIGHT: f64 = 0.55;

const TYPE_MULTIPLIERS: &[(&str, f64)] = &[
    ("causes", 1.0),
    ("improves", 0.95),
    ("optimizes", 0.95),
    ("drives", 0.9),
    ("reduces", 0.9),
    ("used_for", 0.9),
    ("requires", 0.9),
    ("contains", 0.85),
    ("contains_concept", 0.85),
    ("based_on", 0.85),
    ("generates", 0.85),
    ("deployed_on", 0.85),
    ("depends_on", 0.85),
    ("influences", 0.8),
    ("integrates", 0.8),
    ("analyzes", 0.8),
    ("belongs_to", 0.8),
    ("tool_implements_concept", 0.8),
    ("tool_supports", 0.75),
    ("tool_integrates", 0.75),
    ("concept_correlates", 0.7),
    ("concept_associated", 0.7),
    ("related_to", 0.6),
];

pub fn type_multiplier(relation_type: &str) -> f64 {
    TYPE_MULTIPLIERS
        .iter()
        .find(|(t, _)| *t == relation_type)
        .map(|(_, m)| *m)
        .unwrap_or(DEFAULT_TYPE_MULTIPLIER)
}

struct Connections(HashSet<(String, String)>);

impl Connections {
    fn of(relations: &[Relation]) -> Self {
        let mut set = HashSet::new();
        for r in relations {
            set.insert((r.source.clone(), r.target.clone()));
            set.insert((r.target.clone(), r.source.clone()));
        }
        Self(set)
    }

    fn linked(&self, a: &str, b: &str) -> bool {
        self.0.contains(&(a.to_string(), b.to_string()))
    }

    fn link(&mut self, a: &str, b: &str) {
        self.0.insert((a.to_string(), b.to_string()));
        self.0.insert((b.to_string(), a.to_string()));
    }
}

/// Rule-table inference over unconnected pairs with enough context support.
pub fn infer_semantic(
    mut relations: Vec<Relation>,
    entities: &[Entity],
    index: &CooccurrenceIndex,
) -> Vec<Relation> {
    let mut connections = Connections::of(&relations);

    for (i, a) in entities.iter().enumerate() {
        for b in &entities[i + 1..] {
            if a.id == b.id || connections.linked(&a.id, &b.id) {
                continue;
            }
            let support = index.support(&a.id, &b.id);
            if support <= INFERENCE_SUPPORT_THRESHOLD {
                continue;
            }
            let hit = INFERENCE_RULES.iter().find_map(|rule| {
                if rule.source.matches(a) && rule.target.matches(b) {
                    Some((rule, a, b))
                } else if rule.source.matches(b) && rule.target.matches(a) {
                    Some((rule, b, a))
                } else {
                    None
                }
            });
            if let Some((rule, source, target)) = hit {
                relations.push(
                    Relation::new(&source.id, &target.id, rule.relation_type, rule.weight)
                        .with_property("method", "semantic_inference")
                        .with_property("support", round_to(support, 3)),
                );
                connections.link(&a.id, &b.id);
            }
        }
    }

    relations
}

/// `contains_concept` edges from the category hierarchy (co-occurring pairs)
/// and from name subsumption ("营销" inside "内容营销").
pub fn detect_hierarchy(
    mut relations: Vec<Relation>,
    entities: &[Entity],
    index: &CooccurrenceIndex,
) -> Vec<Relation> {
    let mut connections = Connections::of(&relations);

    for parent in entities {
        for child in entities {
            if parent.id == child.id || connections.linked(&parent.id, &child.id) {
                continue;
            }
            let by_category = HIERARCHY_RULES
                .iter()
                .any(|(p, c)| parent.category == *p && child.category == *c)
                && index.cooccur(&parent.id, &child.id);
            let (pn, cn) = (parent.normalized_name(), child.normalized_name());
            let by_name = pn.chars().count() >= 2 && pn.len() < cn.len() && cn.contains(&pn);

            let (weight, method) = if by_category {
                (HIERARCHY_WEIGHT, "hierarchy")
            } else if by_name {
                (SUBSUMPTION_WEIGHT, "name_subsumption")
            } else {
                continue;
            };
            relations.push(
                Relation::new(&parent.id, &child.id, CONTAINS_CONCEPT, weight).with_property("method", method),
            );
            connections.link(&parent.id, &child.id);
        }
    }

    relations
}

/// Re-weights every relation from its prior, endpoint importance, a
/// type-specific multiplier and context support (70/30 blend).
pub fn recalculate_strength(
    relations: Vec<Relation>,
    entities: &HashMap<&str, &Entity>,
    index: &CooccurrenceIndex,
) -> Vec<Relation> {
    relations
        .into_iter()
        .map(|mut r| {
            let (Some(source), Some(target)) = (entities.get(r.source.as_str()), entities.get(r.target.as_str())) else {
                return r;
            };
            let prior = safe_number(r.weight, DEFAULT_TYPE_MULTIPLIER);
            let importance = (0.5 + safe_sqrt(source.weight * target.weight) / 10.0).clamp(0.5, 1.0);
            let strength = safe_number(prior * importance * type_multiplier(&r.relation_type), prior);
            let support = clamp_unit(index.support(&r.source, &r.target));
            r.weight = clamp_relation_weight(round_to(0.7 * strength + 0.3 * support, 3));
            r.properties.insert("confidence".into(), r.weight.into());
            r
        })
        .collect()
}

pub fn drop_low_quality(relations: Vec<Relation>, entities: &HashMap<&str, &Entity>) -> Vec<Relation> {
    relations
        .into_iter()
        .filter(|r| {
            r.source != r.target
                && entities.contains_key(r.source.as_str())
                && entities.contains_key(r.target.as_str())
                && r.weight >= MIN_RELATION_WEIGHT
                && !(r.relation_type == RELATED_TO && r.weight < MIN_RELATED_TO_WEIGHT)
        })
        .collect()
}

/// Upgrades generic `related_to` edges from endpoint categories, keeping the
/// original type in `original_type`.
pub fn optimize_types(relations: Vec<Relation>, entities: &HashMap<&str, &Entity>) -> Vec<Relation> {
    let upgraded = relations
        .into_iter()
        .map(|mut r| {
            if r.relation_type != RELATED_TO {
                return r;
            }
            let (Some(source), Some(target)) = (entities.get(r.source.as_str()), entities.get(r.target.as_str())) else {
                return r;
            };

            let upgrade = if is_tool(source) && target.node_type == NodeType::Concept {
                Some("applied_to")
            } else if is_tool(target) && source.node_type == NodeType::Concept {
                std::mem::swap(&mut r.source, &mut r.target);
                Some("applied_to")
            } else if source.category == category::PROFESSIONAL_TERM && target.category == category::PROFESSIONAL_TERM {
                Some("concept_associated")
            } else if source.category == category::CORE_CONCEPT || target.category == category::CORE_CONCEPT {
                Some("core_related")
            } else {
                None
            };

            if let Some(new_type) = upgrade {
                r.properties.insert("original_type".into(), RELATED_TO.into());
                r.relation_type = new_type.to_string();
            }
            r
        })
        .collect();

    dedupe_relations(upgraded)
}

/// Full quality pass. Output weights lie in `[0.1, 1.0]`, endpoints exist
/// and there are no self-loops; sorted by weight descending.
pub fn enhance(relations: Vec<Relation>, entities: &[Entity], index: &CooccurrenceIndex) -> Vec<Relation> {
    let by_id: HashMap<&str, &Entity> = entities.iter().map(|e| (e.id.as_str(), e)).collect();

    let relations = infer_semantic(relations, entities, index);
    let relations = detect_hierarchy(relations, entities, index);
    let relations = recalculate_strength(relations, &by_id, index);
    let relations = drop_low_quality(relations, &by_id);
    let mut relations = optimize_types(relations, &by_id);

    relations.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    relations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(name: &str, cat: &str, weight: f64) -> Entity {
        Entity::new(name, NodeType::Concept, cat, weight)
    }

    fn tool(name: &str) -> Entity {
        Entity::new(name, NodeType::Tool, category::TOOL, 3.0)
    }

    #[test]
    fn test_inference_requires_support() {
        let entities = vec![tool("Tableau"), concept("cohort analysis", category::PROFESSIONAL_TERM, 2.5)];
        let near = CooccurrenceIndex::build("Tableau renders cohort analysis.", &entities);
        let inferred = infer_semantic(Vec::new(), &entities, &near);
        assert_eq!(inferred.len(), 1);
        assert_eq!(inferred[0].relation_type, "tool_implements_concept");
        assert_eq!(inferred[0].source, entities[0].id);

        let apart = CooccurrenceIndex::build("Tableau. cohort analysis.", &entities);
        assert!(infer_semantic(Vec::new(), &entities, &apart).is_empty());
    }

    #[test]
    fn test_hierarchy_by_name_subsumption() {
        let entities = vec![
            concept("营销", category::KEY_PHRASE, 1.0),
            concept("内容营销", category::KEY_PHRASE, 2.0),
        ];
        let index = CooccurrenceIndex::default();
        let relations = detect_hierarchy(Vec::new(), &entities, &index);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].source, entities[0].id);
        assert_eq!(relations[0].relation_type, CONTAINS_CONCEPT);
    }

    #[test]
    fn test_strength_and_filter_bounds() {
        let entities = vec![concept("a1", category::CORE_CONCEPT, 5.0), concept("b1", category::CORE_CONCEPT, f64::NAN)];
        let by_id: HashMap<&str, &Entity> = entities.iter().map(|e| (e.id.as_str(), e)).collect();
        let relations = vec![
            Relation::new(&entities[0].id, &entities[1].id, "causes", 7.0),
            Relation::new(&entities[0].id, &entities[1].id, RELATED_TO, 0.3),
            Relation::new(&entities[0].id, &entities[0].id, "causes", 0.9),
            Relation::new(&entities[0].id, "ghost", "causes", 0.9),
        ];
        let index = CooccurrenceIndex::default();
        let strengthened = recalculate_strength(relations, &by_id, &index);
        let kept = drop_low_quality(strengthened, &by_id);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].relation_type, "causes");
        assert!((0.1..=1.0).contains(&kept[0].weight));
    }

    #[test]
    fn test_related_to_upgrade_records_original() {
        let entities = vec![tool("Python"), concept("数据清洗", category::KEY_PHRASE, 1.0)];
        let by_id: HashMap<&str, &Entity> = entities.iter().map(|e| (e.id.as_str(), e)).collect();
        let relations = vec![Relation::new(&entities[1].id, &entities[0].id, RELATED_TO, 0.8)];
        let out = optimize_types(relations, &by_id);
        assert_eq!(out[0].relation_type, "applied_to");
        assert_eq!(out[0].source, entities[0].id);
        assert_eq!(out[0].properties["original_type"], RELATED_TO);
    }

    #[test]
    fn test_type_multiplier_default() {
        assert_eq!(type_multiplier("causes"), 1.0);
        assert_eq!(type_multiplier("mystery"), 0.5);
    }
}
