//! SQLite <-> petgraph synchronization.
//!
//! Provides functions to load graph data from SQLite into petgraph
//! and persist changes back to SQLite.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use graphlink_core::error::{GraphLinkError, GraphLinkResult};
use graphlink_core::types::Properties;

use super::db_err;
use super::petgraph_ops::{PropertyGraph, StoredEdge, StoredNode};

/// A relationship row after an upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedRelationship {
    pub db_id: i64,
    /// Whether the row was inserted rather than refreshed.
    pub created: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Load the entire graph from SQLite into petgraph.
///
/// This is called on startup to hydrate the in-memory graph.
pub fn load_graph(conn: &Connection, graph: &mut PropertyGraph) -> GraphLinkResult<()> {
    graph.clear();

    let mut stmt = conn
        .prepare("SELECT id, labels, properties FROM nodes ORDER BY id")
        .map_err(db_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(db_err)?;

    for row in rows {
        let (id, labels, properties) = row.map_err(db_err)?;
        let node = StoredNode::new(id, serde_json::from_str(&labels)?)
            .with_properties(serde_json::from_str(&properties)?);
        graph.add_node(node);
    }

    let mut stmt = conn
        .prepare(
            "SELECT id, source_id, target_id, relationship_type, properties, created_at, updated_at \
             FROM relationships ORDER BY id",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })
        .map_err(db_err)?;

    for row in rows {
        let (id, source_id, target_id, relationship_type, properties, created_at, updated_at) =
            row.map_err(db_err)?;
        let edge = StoredEdge::new(id, relationship_type)
            .with_properties(serde_json::from_str(&properties)?)
            .with_timestamps(
                parse_timestamp(&created_at)?,
                updated_at.as_deref().map(parse_timestamp).transpose()?,
            );
        graph.add_edge(source_id, target_id, edge);
    }

    Ok(())
}

/// Insert a node. Returns its database ID.
pub fn insert_node(
    conn: &Connection,
    labels: &[String],
    properties: &Properties,
) -> GraphLinkResult<i64> {
    conn.execute(
        "INSERT INTO nodes (labels, properties) VALUES (?1, ?2)",
        params![serde_json::to_string(labels)?, serde_json::to_string(properties)?],
    )
    .map_err(db_err)?;
    Ok(conn.last_insert_rowid())
}

/// Merge a relationship on (source, target, type).
///
/// A new row gets `properties` and `created_at = now`. An existing row keeps
/// its properties and only has `updated_at` set to `now`.
pub fn upsert_relationship(
    conn: &Connection,
    source_id: i64,
    target_id: i64,
    relationship_type: &str,
    properties: &Properties,
    now: DateTime<Utc>,
) -> GraphLinkResult<SavedRelationship> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM relationships WHERE source_id = ?1 AND target_id = ?2 AND relationship_type = ?3",
            params![source_id, target_id, relationship_type],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)?;

    let now_str = now.to_rfc3339();
    conn.execute(
        r#"
        INSERT INTO relationships (source_id, target_id, relationship_type, properties, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(source_id, target_id, relationship_type) DO UPDATE SET
            updated_at = ?5
        "#,
        params![
            source_id,
            target_id,
            relationship_type,
            serde_json::to_string(properties)?,
            now_str
        ],
    )
    .map_err(db_err)?;

    let (db_id, created_at, updated_at): (i64, String, Option<String>) = conn
        .query_row(
            "SELECT id, created_at, updated_at FROM relationships \
             WHERE source_id = ?1 AND target_id = ?2 AND relationship_type = ?3",
            params![source_id, target_id, relationship_type],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .map_err(db_err)?;

    Ok(SavedRelationship {
        db_id,
        created: existing.is_none(),
        created_at: parse_timestamp(&created_at)?,
        updated_at: updated_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

/// Delete relationships by ID. Returns the number of rows removed.
pub fn delete_relationships(conn: &Connection, ids: &[i64]) -> GraphLinkResult<usize> {
    let mut stmt = conn
        .prepare("DELETE FROM relationships WHERE id = ?1")
        .map_err(db_err)?;
    let mut deleted = 0;
    for id in ids {
        deleted += stmt.execute(params![id]).map_err(db_err)?;
    }
    Ok(deleted)
}

fn parse_timestamp(value: &str) -> GraphLinkResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| GraphLinkError::invalid_row(format!("bad timestamp {:?}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedded::schema::init_schema;
    use serde_json::json;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn props(value: serde_json::Value) -> Properties {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_insert_and_load_nodes() {
        let conn = setup_test_db();
        let labels = vec!["__Entity__".to_string(), "Product".to_string()];
        let id = insert_node(&conn, &labels, &props(json!({"Product_Name": "Malmo Desk"}))).unwrap();

        let mut graph = PropertyGraph::new();
        load_graph(&conn, &mut graph).unwrap();

        let node = graph.node(id).unwrap();
        assert_eq!(node.labels, labels);
        assert_eq!(node.properties["Product_Name"], "Malmo Desk");
    }

    #[test]
    fn test_upsert_keeps_properties_and_sets_updated_at() {
        let conn = setup_test_db();
        let a = insert_node(&conn, &["Product".to_string()], &Properties::new()).unwrap();
        let b = insert_node(&conn, &["Product".to_string()], &Properties::new()).unwrap();

        let first = upsert_relationship(
            &conn,
            a,
            b,
            "CORRESPONDS_TO",
            &props(json!({"similarity": 0.9})),
            Utc::now(),
        )
        .unwrap();
        assert!(first.created);
        assert!(first.updated_at.is_none());

        let second = upsert_relationship(
            &conn,
            a,
            b,
            "CORRESPONDS_TO",
            &props(json!({"similarity": 0.5})),
            Utc::now(),
        )
        .unwrap();
        assert!(!second.created);
        assert_eq!(second.db_id, first.db_id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at.is_some());

        let mut graph = PropertyGraph::new();
        load_graph(&conn, &mut graph).unwrap();
        let records = graph.correspondences("CORRESPONDS_TO");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].similarity, 0.9);
    }

    #[test]
    fn test_delete_relationships() {
        let conn = setup_test_db();
        let a = insert_node(&conn, &["Part".to_string()], &Properties::new()).unwrap();
        let b = insert_node(&conn, &["Part".to_string()], &Properties::new()).unwrap();
        let saved =
            upsert_relationship(&conn, a, b, "CORRESPONDS_TO", &Properties::new(), Utc::now())
                .unwrap();

        assert_eq!(delete_relationships(&conn, &[saved.db_id, 999]).unwrap(), 1);
        assert_eq!(delete_relationships(&conn, &[]).unwrap(), 0);
    }
}
