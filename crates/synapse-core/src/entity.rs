use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Open key-value bag carried by entities and relations.
pub type Properties = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Entity,
    Concept,
    Tool,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Entity => "entity",
            NodeType::Concept => "concept",
            NodeType::Tool => "tool",
        }
    }
}

/// Well-known entity categories. Categories stay free-form strings because
/// domain tables may introduce their own.
pub mod category {
    pub const CORE_CONCEPT: &str = "core_concept";
    pub const PROFESSIONAL_TERM: &str = "professional_term";
    pub const BUSINESS_CONCEPT: &str = "business_concept";
    pub const TOOL: &str = "tool";
    pub const ENTITY: &str = "entity";
    pub const KEY_PHRASE: &str = "key_phrase";
    pub const PERSON: &str = "person";
    pub const ORGANIZATION: &str = "organization";
    pub const PRODUCT: &str = "product";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub category: String,
    pub weight: f64,
    #[serde(default)]
    pub properties: Properties,
}

impl Entity {
    /// Creates an entity whose id is derived from the normalized name, so the
    /// same surface form always maps to the same node across extractions.
    pub fn new(name: impl Into<String>, node_type: NodeType, category: impl Into<String>, weight: f64) -> Self {
        let name = name.into();
        Self {
            id: entity_id_for(&name),
            name,
            node_type,
            category: category.into(),
            weight,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Document labels this entity was seen in: the `documents` list plus a
    /// single `document` label.
    pub fn documents(&self) -> BTreeSet<String> {
        let mut docs: BTreeSet<String> = self
            .properties
            .get("documents")
            .and_then(serde_json::Value::as_array)
            .map(|list| list.iter().filter_map(|d| d.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if let Some(doc) = self.properties.get("document").and_then(serde_json::Value::as_str) {
            docs.insert(doc.to_string());
        }
        docs
    }
}

/// Case- and whitespace-insensitive key used for deduplication.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

pub fn entity_id_for(name: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, normalize_name(name).as_bytes()).to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub weight: f64,
    #[serde(default)]
    pub properties: Properties,
}

impl Relation {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation_type: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type: relation_type.into(),
            weight,
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Identity of a link for diffing: `(source, target, type)`.
    pub fn key(&self) -> LinkKey {
        LinkKey {
            source: self.source.clone(),
            target: self.target.clone(),
            relation_type: self.relation_type.clone(),
        }
    }

    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    pub source: String,
    pub target: String,
    pub relation_type: String,
}

/// Non-fatal input-quality conditions reported through `metadata.error`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextIssue {
    TextTooShort,
    LowQualityText,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphMetadata {
    pub domain: String,
    pub detected_domain: Option<String>,
    pub domain_confidence: f64,
    pub text_length: usize,
    /// Ratio of distinct characters to text length.
    pub text_quality: f64,
    pub entity_count: usize,
    pub relation_count: usize,
    pub error: Option<TextIssue>,
    pub generated_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub change_count: u64,
}

impl Default for GraphMetadata {
    fn default() -> Self {
        Self {
            domain: "general".into(),
            detected_domain: None,
            domain_confidence: 0.0,
            text_length: 0,
            text_quality: 0.0,
            entity_count: 0,
            relation_count: 0,
            error: None,
            generated_at: Utc::now(),
            updated_at: None,
            change_count: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Graph {
    pub nodes: Vec<Entity>,
    pub links: Vec<Relation>,
    pub metadata: GraphMetadata,
}

impl Graph {
    pub fn new(nodes: Vec<Entity>, links: Vec<Relation>) -> Self {
        let metadata = GraphMetadata {
            entity_count: nodes.len(),
            relation_count: links.len(),
            ..GraphMetadata::default()
        };
        Self { nodes, links, metadata }
    }

    /// Empty graph tagged with an input-quality condition.
    pub fn rejected(issue: TextIssue, text_length: usize, text_quality: f64) -> Self {
        Self {
            nodes: Vec::new(),
            links: Vec::new(),
            metadata: GraphMetadata {
                text_length,
                text_quality,
                error: Some(issue),
                ..GraphMetadata::default()
            },
        }
    }

    pub fn node(&self, id: &str) -> Option<&Entity> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Entity> {
        let key = normalize_name(name);
        self.nodes.iter().find(|n| n.normalized_name() == key)
    }

    pub fn refresh_counts(&mut self) {
        self.metadata.entity_count = self.nodes.len();
        self.metadata.relation_count = self.links.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_is_stable_across_case_and_spacing() {
        let a = Entity::new("Content Marketing", NodeType::Concept, category::KEY_PHRASE, 1.0);
        let b = Entity::new("content  marketing", NodeType::Concept, category::KEY_PHRASE, 2.0);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, entity_id_for("marketing"));
    }

    #[test]
    fn test_entity_serializes_type_field() {
        let e = Entity::new("Python", NodeType::Tool, category::TOOL, 2.5);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "tool");
        assert_eq!(json["category"], "tool");
    }

    #[test]
    fn test_rejected_graph_metadata_error() {
        let g = Graph::rejected(TextIssue::TextTooShort, 5, 1.0);
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json["metadata"]["error"], "text_too_short");
        assert!(g.nodes.is_empty() && g.links.is_empty());
    }

    #[test]
    fn test_relation_key_and_connects() {
        let r = Relation::new("a", "b", "used_for", 0.6);
        assert_eq!(r.key().relation_type, "used_for");
        assert!(r.connects("b", "a"));
        assert!(!r.connects("a", "c"));
    }
}
