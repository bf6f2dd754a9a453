//! SQLite schema for the embedded graph store.
//!
//! Two tables hold the property graph:
//! - `nodes`: labels and properties, both as JSON
//! - `relationships`: typed edges with JSON properties and timestamps

use rusqlite::Connection;

use graphlink_core::error::GraphLinkResult;

use super::db_err;

/// SQL for the nodes table.
pub const CREATE_NODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    labels TEXT NOT NULL DEFAULT '[]',
    properties TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
"#;

/// SQL for the relationships table.
///
/// One edge per (source, target, type); re-writing the same edge only
/// touches `updated_at`.
pub const CREATE_RELATIONSHIPS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS relationships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    target_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    relationship_type TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT,
    UNIQUE(source_id, target_id, relationship_type)
)
"#;

/// Index for efficient traversal from source.
pub const CREATE_RELATIONSHIPS_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_id)
"#;

/// Index for efficient traversal to target.
pub const CREATE_RELATIONSHIPS_TARGET_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_id)
"#;

/// Index for relationship type filtering.
pub const CREATE_RELATIONSHIPS_TYPE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_relationships_type ON relationships(relationship_type)
"#;

/// Initialize the graph schema in the given database connection.
///
/// Safe to call multiple times (idempotent).
pub fn init_schema(conn: &Connection) -> GraphLinkResult<()> {
    conn.execute("PRAGMA foreign_keys = ON", []).map_err(db_err)?;

    conn.execute(CREATE_NODES_TABLE, []).map_err(db_err)?;
    conn.execute(CREATE_RELATIONSHIPS_TABLE, []).map_err(db_err)?;

    conn.execute(CREATE_RELATIONSHIPS_SOURCE_INDEX, []).map_err(db_err)?;
    conn.execute(CREATE_RELATIONSHIPS_TARGET_INDEX, []).map_err(db_err)?;
    conn.execute(CREATE_RELATIONSHIPS_TYPE_INDEX, []).map_err(db_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"nodes".to_string()));
        assert!(tables.contains(&"relationships".to_string()));
    }

    #[test]
    fn test_init_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='nodes'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_relationship_unique_per_type() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute("INSERT INTO nodes (labels) VALUES ('[\"Product\"]')", [])
            .unwrap();
        conn.execute("INSERT INTO nodes (labels) VALUES ('[\"Product\"]')", [])
            .unwrap();

        let insert = "INSERT INTO relationships (source_id, target_id, relationship_type, created_at) \
                      VALUES (1, 2, ?1, datetime('now'))";
        conn.execute(insert, ["CORRESPONDS_TO"]).unwrap();
        assert!(conn.execute(insert, ["CORRESPONDS_TO"]).is_err());
        conn.execute(insert, ["SUPPLIED_BY"]).unwrap();
    }

    #[test]
    fn test_relationship_cascade_delete() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute("INSERT INTO nodes (labels) VALUES ('[]')", []).unwrap();
        conn.execute("INSERT INTO nodes (labels) VALUES ('[]')", []).unwrap();
        conn.execute(
            "INSERT INTO relationships (source_id, target_id, relationship_type, created_at) \
             VALUES (1, 2, 'CORRESPONDS_TO', datetime('now'))",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM nodes WHERE id = 1", []).unwrap();

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
