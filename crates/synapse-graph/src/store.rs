use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use async_trait::async_trait;
use neo4rs::{query, Graph as Neo4jGraph, Query};
use uuid::Uuid;

use synapse_core::analysis::{CentralityScore, Community};
use synapse_core::config::AcceleratorConfig;
use synapse_core::entity::{Entity, Graph, NodeType, Properties, Relation};
use synapse_core::error::{Result, SynapseError};
use synapse_core::graph::{GraphAccelerator, StoreStatistics};

/// Timeout for all Neo4j operations (seconds).
const NEO4J_TIMEOUT_SECS: u64 = 5;

/// Neo4j-backed accelerator. Graphs are stored as `SynapseEntity` nodes and
/// `RELATES` relationships tagged with their graph id. Centrality uses plain
/// Cypher; PageRank, betweenness and Louvain communities need the GDS plugin.
pub struct Neo4jAccelerator {
    graph: Option<Neo4jGraph>,
}

impl Neo4jAccelerator {
    pub async fn new(config: &AcceleratorConfig) -> Self {
        match Neo4jGraph::new(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password).await {
            Ok(graph) => {
                tracing::info!(uri = %config.neo4j_uri, "Connected to Neo4j");
                Self { graph: Some(graph) }
            }
            Err(e) => {
                tracing::warn!(uri = %config.neo4j_uri, error = %e, "Failed to connect to Neo4j, analytics stay in-memory");
                Self { graph: None }
            }
        }
    }

    /// An accelerator that never connects; every call reports unavailable.
    pub fn disconnected() -> Self {
        Self { graph: None }
    }

    fn graph(&self) -> Result<&Neo4jGraph> {
        self.graph.as_ref().ok_or_else(|| SynapseError::Graph("Neo4j not connected".into()))
    }

    pub fn is_connected(&self) -> bool {
        self.graph.is_some()
    }

    async fn count(&self, q: Query, what: &str) -> Result<u64> {
        let mut stream = timed(self.graph()?.execute(q))
            .await?
            .map_err(|e| SynapseError::Graph(format!("Failed to count {}: {}", what, e)))?;

        match stream.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get("cnt")
                    .map_err(|e| SynapseError::Graph(format!("Failed to get count: {}", e)))?;
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(SynapseError::Graph(format!("Error counting {}: {}", what, e))),
        }
    }

    /// Projects the graph into GDS under a throwaway name and runs `stream`
    /// against it. The projection is dropped whether or not `stream` succeeds.
    async fn with_projection(&self, graph_id: &str, stream_cypher: &str) -> Result<Vec<(String, f64)>> {
        let db = self.graph()?;
        let name = format!("synapse_{}", Uuid::new_v4().simple());

        let project = query(
            "MATCH (s:SynapseEntity {graph_id: $graph_id}) \
             OPTIONAL MATCH (s)-[r:RELATES]->(t:SynapseEntity {graph_id: $graph_id}) \
             WITH gds.graph.project($name, s, t, {relationshipProperties: r {.weight}}) AS g \
             RETURN g.graphName AS graph",
        )
        .param("graph_id", graph_id.to_string())
        .param("name", name.clone());
        timed(db.run(project))
            .await?
            .map_err(|e| SynapseError::Graph(format!("GDS projection failed: {}", e)))?;

        let result = async {
            let mut stream = timed(db.execute(query(stream_cypher).param("name", name.clone())))
                .await?
                .map_err(|e| SynapseError::Graph(format!("GDS algorithm failed: {}", e)))?;
            let mut rows = Vec::new();
            while let Ok(Some(row)) = stream.next().await {
                let id: String = row
                    .get("id")
                    .map_err(|e| SynapseError::Graph(format!("Missing id in GDS row: {}", e)))?;
                let value: f64 = row
                    .get("value")
                    .or_else(|_| row.get::<i64>("value").map(|v| v as f64))
                    .map_err(|e| SynapseError::Graph(format!("Missing value in GDS row: {}", e)))?;
                rows.push((id, value));
            }
            Ok::<_, SynapseError>(rows)
        }
        .await;

        let drop = query("CALL gds.graph.drop($name, false) YIELD graphName RETURN graphName")
            .param("name", name.clone());
        if let Err(e) = timed(db.run(drop)).await.and_then(|r| {
            r.map_err(|e| SynapseError::Graph(e.to_string()))
        }) {
            tracing::warn!(projection = %name, error = %e, "Failed to drop GDS projection");
        }

        result
    }
}

/// Wrap any async operation with a timeout, converting timeout to SynapseError::Graph.
async fn timed<T, F: Future<Output = T>>(op: F) -> std::result::Result<T, SynapseError> {
    tokio::time::timeout(std::time::Duration::from_secs(NEO4J_TIMEOUT_SECS), op)
        .await
        .map_err(|_| {
            tracing::warn!("Neo4j operation timed out after {}s", NEO4J_TIMEOUT_SECS);
            SynapseError::Graph(format!("Neo4j operation timed out after {}s", NEO4J_TIMEOUT_SECS))
        })
}

fn parse_node_type(value: &str) -> NodeType {
    match value {
        "tool" => NodeType::Tool,
        "entity" => NodeType::Entity,
        _ => NodeType::Concept,
    }
}

fn parse_properties(json: &str) -> Properties {
    serde_json::from_str(json).unwrap_or_default()
}

#[async_trait]
impl GraphAccelerator for Neo4jAccelerator {
    async fn is_available(&self) -> bool {
        let Ok(db) = self.graph() else {
            return false;
        };
        matches!(timed(db.run(query("RETURN 1"))).await, Ok(Ok(())))
    }

    async fn store_graph(&self, graph_id: &str, graph: &Graph) -> Result<()> {
        let mut txn = timed(self.graph()?.start_txn())
            .await?
            .map_err(|e| SynapseError::Graph(format!("Failed to start transaction: {}", e)))?;

        // Snapshots replace whatever was stored under the same id.
        timed(txn.run(
            query("MATCH (n:SynapseEntity {graph_id: $graph_id}) DETACH DELETE n")
                .param("graph_id", graph_id.to_string()),
        ))
        .await?
        .map_err(|e| SynapseError::Graph(format!("Failed to clear graph {}: {}", graph_id, e)))?;

        for node in &graph.nodes {
            let properties_json = serde_json::to_string(&node.properties)?;
            let q = query(
                "MERGE (n:SynapseEntity {graph_id: $graph_id, id: $id}) \
                 SET n.name = $name, n.type = $type, n.category = $category, \
                   n.weight = $weight, n.properties = $properties",
            )
            .param("graph_id", graph_id.to_string())
            .param("id", node.id.clone())
            .param("name", node.name.clone())
            .param("type", node.node_type.as_str())
            .param("category", node.category.clone())
            .param("weight", node.weight)
            .param("properties", properties_json);

            timed(txn.run(q))
                .await?
                .map_err(|e| SynapseError::Graph(format!("Failed to store node {}: {}", node.id, e)))?;
        }

        for link in &graph.links {
            let properties_json = serde_json::to_string(&link.properties)?;
            let q = query(
                "MATCH (a:SynapseEntity {graph_id: $graph_id, id: $source}) \
                 MATCH (b:SynapseEntity {graph_id: $graph_id, id: $target}) \
                 MERGE (a)-[r:RELATES {type: $type}]->(b) \
                 SET r.weight = $weight, r.properties = $properties",
            )
            .param("graph_id", graph_id.to_string())
            .param("source", link.source.clone())
            .param("target", link.target.clone())
            .param("type", link.relation_type.clone())
            .param("weight", link.weight)
            .param("properties", properties_json);

            timed(txn.run(q)).await?.map_err(|e| {
                SynapseError::Graph(format!(
                    "Failed to store link {} -> {}: {}",
                    link.source, link.target, e
                ))
            })?;
        }

        timed(txn.commit())
            .await?
            .map_err(|e| SynapseError::Graph(format!("Failed to commit transaction: {}", e)))?;

        tracing::info!(
            graph_id,
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            "Stored graph in Neo4j"
        );
        Ok(())
    }

    async fn load_graph(&self, graph_id: &str) -> Result<Option<Graph>> {
        let db = self.graph()?;
        let mut stream = timed(db.execute(
            query(
                "MATCH (n:SynapseEntity {graph_id: $graph_id}) \
                 RETURN n.id AS id, n.name AS name, n.type AS type, n.category AS category, \
                   n.weight AS weight, n.properties AS properties",
            )
            .param("graph_id", graph_id.to_string()),
        ))
        .await?
        .map_err(|e| SynapseError::Graph(format!("Failed to load nodes: {}", e)))?;

        let mut nodes = Vec::new();
        while let Ok(Some(row)) = stream.next().await {
            let id: String = match row.get("id") {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed node row");
                    continue;
                }
            };
            let name: String = row.get("name").unwrap_or_default();
            let node_type: String = row.get("type").unwrap_or_default();
            let properties: String = row.get("properties").unwrap_or_else(|_| "{}".to_string());
            nodes.push(Entity {
                id,
                name,
                node_type: parse_node_type(&node_type),
                category: row.get("category").unwrap_or_default(),
                weight: row.get("weight").unwrap_or(1.0),
                properties: parse_properties(&properties),
            });
        }

        if nodes.is_empty() {
            return Ok(None);
        }

        let mut stream = timed(db.execute(
            query(
                "MATCH (a:SynapseEntity {graph_id: $graph_id})-[r:RELATES]->(b:SynapseEntity {graph_id: $graph_id}) \
                 RETURN a.id AS source, b.id AS target, r.type AS type, r.weight AS weight, \
                   r.properties AS properties",
            )
            .param("graph_id", graph_id.to_string()),
        ))
        .await?
        .map_err(|e| SynapseError::Graph(format!("Failed to load links: {}", e)))?;

        let mut links = Vec::new();
        while let Ok(Some(row)) = stream.next().await {
            let (Ok(source), Ok(target)) = (row.get::<String>("source"), row.get::<String>("target")) else {
                tracing::warn!("Skipping malformed link row");
                continue;
            };
            let relation_type: String = row.get("type").unwrap_or_else(|_| "related_to".to_string());
            let properties: String = row.get("properties").unwrap_or_else(|_| "{}".to_string());
            let mut link = Relation::new(source, target, relation_type, row.get("weight").unwrap_or(0.5));
            link.properties = parse_properties(&properties);
            links.push(link);
        }

        tracing::debug!(graph_id, nodes = nodes.len(), links = links.len(), "Loaded graph from Neo4j");
        Ok(Some(Graph::new(nodes, links)))
    }

    async fn centrality(&self, graph_id: &str) -> Result<Vec<CentralityScore>> {
        let mut stream = timed(self.graph()?.execute(
            query(
                "MATCH (n:SynapseEntity {graph_id: $graph_id}) \
                 OPTIONAL MATCH (n)-[o:RELATES]->(:SynapseEntity {graph_id: $graph_id}) \
                 WITH n, count(o) AS out_degree \
                 OPTIONAL MATCH (n)<-[i:RELATES]-(:SynapseEntity {graph_id: $graph_id}) \
                 RETURN n.id AS id, n.name AS name, out_degree, count(i) AS in_degree",
            )
            .param("graph_id", graph_id.to_string()),
        ))
        .await?
        .map_err(|e| SynapseError::Graph(format!("Failed to compute degree: {}", e)))?;

        let mut scores = Vec::new();
        while let Ok(Some(row)) = stream.next().await {
            let Ok(id) = row.get::<String>("id") else {
                continue;
            };
            let out_degree = row.get::<i64>("out_degree").unwrap_or(0).max(0) as usize;
            let in_degree = row.get::<i64>("in_degree").unwrap_or(0).max(0) as usize;
            scores.push(CentralityScore {
                id,
                name: row.get("name").unwrap_or_default(),
                degree: in_degree + out_degree,
                in_degree,
                out_degree,
                normalized_degree: 0.0,
                betweenness: None,
                pagerank: None,
            });
        }

        let denominator = scores.len().saturating_sub(1).max(1) as f64;
        for score in &mut scores {
            score.normalized_degree = score.degree as f64 / denominator;
        }

        let pagerank = self
            .with_projection(
                graph_id,
                "CALL gds.pageRank.stream($name) YIELD nodeId, score \
                 RETURN gds.util.asNode(nodeId).id AS id, score AS value",
            )
            .await;
        let betweenness = self
            .with_projection(
                graph_id,
                "CALL gds.betweenness.stream($name) YIELD nodeId, score \
                 RETURN gds.util.asNode(nodeId).id AS id, score AS value",
            )
            .await;

        match (pagerank, betweenness) {
            (Ok(pr), Ok(bc)) => {
                let pr: HashMap<String, f64> = pr.into_iter().collect();
                let bc: HashMap<String, f64> = bc.into_iter().collect();
                for score in &mut scores {
                    score.pagerank = pr.get(&score.id).copied();
                    score.betweenness = bc.get(&score.id).copied();
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::debug!(graph_id, error = %e, "GDS centrality unavailable, degree only");
            }
        }

        scores.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.name.cmp(&b.name)));
        Ok(scores)
    }

    async fn communities(&self, graph_id: &str) -> Result<Vec<Community>> {
        let assignments = self
            .with_projection(
                graph_id,
                "CALL gds.louvain.stream($name) YIELD nodeId, communityId \
                 RETURN gds.util.asNode(nodeId).id AS id, communityId AS value",
            )
            .await?;

        let mut grouped: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        for (id, community) in assignments {
            grouped.entry(community as i64).or_default().push(id);
        }

        // Coherence and theme depend on the in-memory graph and are filled in
        // by the caller.
        Ok(grouped
            .into_values()
            .filter(|members| members.len() >= 2)
            .enumerate()
            .map(|(id, members)| Community {
                id,
                members,
                member_names: Vec::new(),
                dominant_category: String::new(),
                coherence: 0.0,
                theme: String::new(),
            })
            .collect())
    }

    async fn statistics(&self, graph_id: &str) -> Result<StoreStatistics> {
        let node_count = self
            .count(
                query("MATCH (n:SynapseEntity {graph_id: $graph_id}) RETURN count(n) AS cnt")
                    .param("graph_id", graph_id.to_string()),
                "nodes",
            )
            .await?;
        let link_count = self
            .count(
                query(
                    "MATCH (:SynapseEntity {graph_id: $graph_id})-[r:RELATES]->(:SynapseEntity {graph_id: $graph_id}) \
                     RETURN count(r) AS cnt",
                )
                .param("graph_id", graph_id.to_string()),
                "links",
            )
            .await?;
        Ok(StoreStatistics { node_count, link_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disconnected_accelerator_is_unavailable() {
        let accelerator = Neo4jAccelerator::disconnected();
        assert!(!accelerator.is_connected());
        assert!(!accelerator.is_available().await);
        assert!(accelerator.statistics("g").await.is_err());
        assert!(accelerator.store_graph("g", &Graph::default()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_operation_times_out() {
        let started = tokio::time::Instant::now();
        let err = timed(std::future::pending::<()>()).await.unwrap_err();
        assert!(matches!(err, SynapseError::Graph(_)));
        assert!(started.elapsed() >= std::time::Duration::from_secs(NEO4J_TIMEOUT_SECS));
        assert_eq!(timed(async { 7 }).await.unwrap(), 7);
    }

    #[test]
    fn test_parse_node_type_defaults_to_concept() {
        assert_eq!(parse_node_type("tool"), NodeType::Tool);
        assert_eq!(parse_node_type("entity"), NodeType::Entity);
        assert_eq!(parse_node_type("unknown"), NodeType::Concept);
    }

    #[test]
    fn test_parse_properties_tolerates_garbage() {
        assert!(parse_properties("not json").is_empty());
        assert_eq!(parse_properties(r#"{"source":"pattern"}"#)["source"], "pattern");
    }
}
