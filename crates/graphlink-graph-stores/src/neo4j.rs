//! Neo4j graph store implementation.
//! Memgraph speaks the same Bolt protocol and Cypher dialect and is served by
//! the same adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{query, BoltType, Graph, Query, Row};
use tracing::debug;

use graphlink_core::error::{GraphLinkError, GraphLinkResult};
use graphlink_core::traits::{GraphStore, GraphStoreConfig, GraphStoreProvider, ENTITY_LABEL};
use graphlink_core::types::{
    Correspondence, CorrespondenceRecord, GraphNode, GraphSummary, NodeId, NodeRef, Population,
    Properties,
};

/// Neo4j (or Memgraph) graph store.
pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    /// Connect to the store described by `config`.
    pub async fn new(config: GraphStoreConfig) -> GraphLinkResult<Self> {
        let default_user = match config.provider {
            GraphStoreProvider::Memgraph => "memgraph",
            _ => "neo4j",
        };
        let username = config.username.clone().unwrap_or_else(|| default_user.to_string());
        let password = config.password.clone().unwrap_or_default();

        let mut builder = neo4rs::ConfigBuilder::default()
            .uri(config.url.as_str())
            .user(username.as_str())
            .password(password.as_str());
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let neo_config = builder
            .build()
            .map_err(|e| GraphLinkError::graph_connection(format!("Invalid Bolt config: {}", e)))?;

        let graph = Graph::connect(neo_config).await.map_err(|e| {
            GraphLinkError::graph_connection(format!("Failed to connect to {}: {}", config.url, e))
        })?;

        Ok(Self { graph })
    }

    async fn fetch(&self, q: Query, what: &str) -> GraphLinkResult<Vec<Row>> {
        let mut result = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphLinkError::graph_store(format!("Failed to {}: {}", what, e)))?;

        let mut rows = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| GraphLinkError::graph_store(format!("Failed to fetch row: {}", e)))?
        {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn fetch_count(&self, q: Query, column: &str, what: &str) -> GraphLinkResult<u64> {
        let rows = self.fetch(q, what).await?;
        match rows.first() {
            Some(row) => Ok(get::<i64>(row, column)?.max(0) as u64),
            None => Ok(0),
        }
    }
}

fn get<T: serde::de::DeserializeOwned>(row: &Row, column: &str) -> GraphLinkResult<T> {
    row.get::<T>(column)
        .map_err(|e| GraphLinkError::invalid_row(format!("column {}: {}", column, e)))
}

/// Backtick-quote a label or relationship type for interpolation.
fn escape(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn population_filter(population: Population) -> String {
    match population {
        Population::Entity => format!("n:{}", escape(ENTITY_LABEL)),
        Population::Domain => format!("NOT n:{}", escape(ENTITY_LABEL)),
    }
}

fn node_id(id: &NodeId) -> GraphLinkResult<i64> {
    id.as_str()
        .parse()
        .map_err(|_| GraphLinkError::validation(format!("Not a Bolt node id: {}", id)))
}

fn node_ref(row: &Row, id_column: &str, labels_column: &str) -> GraphLinkResult<NodeRef> {
    Ok(NodeRef {
        id: NodeId::from(get::<i64>(row, id_column)?),
        labels: get(row, labels_column)?,
    })
}

fn parse_timestamp(value: &str) -> GraphLinkResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| GraphLinkError::invalid_row(format!("bad timestamp {:?}: {}", value, e)))
}

fn counts(rows: &[Row], key: &str) -> GraphLinkResult<Vec<(String, u64)>> {
    let mut counts = rows
        .iter()
        .map(|row| Ok((get::<String>(row, key)?, get::<i64>(row, "count")?.max(0) as u64)))
        .collect::<GraphLinkResult<Vec<_>>>()?;
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(counts)
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn entity_labels(&self) -> GraphLinkResult<Vec<String>> {
        let q = query(&format!(
            "MATCH (e:{}) UNWIND labels(e) AS label RETURN DISTINCT label",
            escape(ENTITY_LABEL)
        ));
        self.fetch(q, "list entity labels")
            .await?
            .iter()
            .map(|row| get(row, "label"))
            .collect()
    }

    async fn property_keys(
        &self,
        label: &str,
        population: Population,
    ) -> GraphLinkResult<Vec<String>> {
        let q = query(&format!(
            "MATCH (n:{}) WHERE {} UNWIND keys(n) AS key RETURN DISTINCT key",
            escape(label),
            population_filter(population)
        ));
        self.fetch(q, "list property keys")
            .await?
            .iter()
            .map(|row| get(row, "key"))
            .collect()
    }

    async fn nodes(&self, label: &str, population: Population) -> GraphLinkResult<Vec<GraphNode>> {
        let q = query(&format!(
            "MATCH (n:{}) WHERE {} RETURN id(n) AS id, labels(n) AS labels, properties(n) AS properties",
            escape(label),
            population_filter(population)
        ));
        self.fetch(q, "load nodes")
            .await?
            .iter()
            .map(|row| {
                Ok(GraphNode {
                    id: NodeId::from(get::<i64>(row, "id")?),
                    labels: get(row, "labels")?,
                    properties: get::<Properties>(row, "properties")?,
                })
            })
            .collect()
    }

    async fn upsert_correspondences(
        &self,
        relationship_type: &str,
        edges: &[Correspondence],
    ) -> GraphLinkResult<u64> {
        if edges.is_empty() {
            return Ok(0);
        }

        let rows = edges
            .iter()
            .map(|edge| {
                let mut row: HashMap<String, BoltType> = HashMap::new();
                row.insert("entity_id".into(), node_id(&edge.entity_id)?.into());
                row.insert("domain_id".into(), node_id(&edge.domain_id)?.into());
                row.insert("similarity".into(), edge.similarity.into());
                row.insert("entity_key".into(), edge.entity_key.clone().into());
                row.insert("domain_key".into(), edge.domain_key.clone().into());
                Ok(row)
            })
            .collect::<GraphLinkResult<Vec<_>>>()?;

        // One statement per batch, so the batch commits atomically.
        let q = query(&format!(
            r#"
            UNWIND $rows AS row
            MATCH (e) WHERE id(e) = row.entity_id
            MATCH (d) WHERE id(d) = row.domain_id
            MERGE (e)-[r:{}]->(d)
            ON CREATE SET
                r.created_at = $now,
                r.similarity = row.similarity,
                r.entity_key = row.entity_key,
                r.domain_key = row.domain_key
            ON MATCH SET
                r.updated_at = $now
            RETURN count(r) AS count
            "#,
            escape(relationship_type)
        ))
        .param("rows", rows)
        .param("now", Utc::now().to_rfc3339());

        let count = self.fetch_count(q, "count", "upsert correspondences").await?;
        debug!(count, relationship_type, "upserted correspondences");
        Ok(count)
    }

    async fn delete_correspondences(
        &self,
        relationship_type: &str,
        label: Option<String>,
    ) -> GraphLinkResult<u64> {
        let source = match &label {
            Some(label) => format!("(e:{})", escape(label)),
            None => "(e)".to_string(),
        };
        let q = query(&format!(
            "MATCH {}-[r:{}]->() WITH r DELETE r RETURN count(*) AS deleted_count",
            source,
            escape(relationship_type)
        ));
        self.fetch_count(q, "deleted_count", "delete correspondences")
            .await
    }

    async fn correspondences(
        &self,
        relationship_type: &str,
    ) -> GraphLinkResult<Vec<CorrespondenceRecord>> {
        let q = query(&format!(
            r#"
            MATCH (e)-[r:{}]->(d)
            RETURN id(e) AS entity_id, labels(e) AS entity_labels,
                   id(d) AS domain_id, labels(d) AS domain_labels,
                   r.similarity AS similarity,
                   r.entity_key AS entity_key, r.domain_key AS domain_key,
                   r.created_at AS created_at, r.updated_at AS updated_at
            "#,
            escape(relationship_type)
        ));
        self.fetch(q, "list correspondences")
            .await?
            .iter()
            .map(|row| {
                let created_at: Option<String> = get(row, "created_at")?;
                let updated_at: Option<String> = get(row, "updated_at")?;
                Ok(CorrespondenceRecord {
                    entity: node_ref(row, "entity_id", "entity_labels")?,
                    domain: node_ref(row, "domain_id", "domain_labels")?,
                    similarity: get::<Option<f64>>(row, "similarity")?.unwrap_or_default(),
                    entity_key: get::<Option<String>>(row, "entity_key")?.unwrap_or_default(),
                    domain_key: get::<Option<String>>(row, "domain_key")?.unwrap_or_default(),
                    created_at: match created_at {
                        Some(ts) => parse_timestamp(&ts)?,
                        None => DateTime::<Utc>::default(),
                    },
                    updated_at: updated_at.as_deref().map(parse_timestamp).transpose()?,
                })
            })
            .collect()
    }

    async fn unmatched_entities(&self, relationship_type: &str) -> GraphLinkResult<Vec<NodeRef>> {
        let q = query(&format!(
            "MATCH (e:{}) WHERE NOT (e)-[:{}]->() RETURN id(e) AS id, labels(e) AS labels",
            escape(ENTITY_LABEL),
            escape(relationship_type)
        ));
        self.fetch(q, "list unmatched entities")
            .await?
            .iter()
            .map(|row| node_ref(row, "id", "labels"))
            .collect()
    }

    async fn graph_summary(&self) -> GraphLinkResult<GraphSummary> {
        let total_nodes = self
            .fetch_count(query("MATCH (n) RETURN count(n) AS count"), "count", "count nodes")
            .await?;
        let orphan_nodes = self
            .fetch_count(
                query("MATCH (n) WHERE NOT (n)--() RETURN count(n) AS count"),
                "count",
                "count orphan nodes",
            )
            .await?;

        let relationship_rows = self
            .fetch(
                query("MATCH ()-[r]->() RETURN type(r) AS rel_type, count(r) AS count"),
                "count relationships",
            )
            .await?;
        let label_rows = self
            .fetch(
                query("MATCH (n) UNWIND labels(n) AS label RETURN label, count(*) AS count"),
                "count labels",
            )
            .await?;

        Ok(GraphSummary {
            total_nodes,
            orphan_nodes,
            connected_nodes: total_nodes.saturating_sub(orphan_nodes),
            relationship_counts: counts(&relationship_rows, "rel_type")?,
            nodes_by_label: counts(&label_rows, "label")?,
        })
    }
}
