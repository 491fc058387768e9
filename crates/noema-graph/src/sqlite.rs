//! SQLite-backed graph engine: one database file per dataset when the
//! embedded file provider is active.

use async_trait::async_trait;
use noema_types::{GraphEdgeRecord, GraphEngine, GraphEngineError, GraphNodeRecord};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// Embedded graph engine persisting to a single SQLite file.
pub struct SqliteGraphEngine {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

impl SqliteGraphEngine {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, GraphEngineError> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| GraphEngineError::Other(e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                slug TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                node_type TEXT NOT NULL,
                attributes TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS edges (
                source_slug TEXT NOT NULL,
                destination_slug TEXT NOT NULL,
                relationship_name TEXT NOT NULL,
                PRIMARY KEY (source_slug, relationship_name, destination_slug)
            );

            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_slug);
            CREATE INDEX IF NOT EXISTS idx_edges_destination ON edges(destination_slug);
            "#,
        )
        .map_err(|e| GraphEngineError::Other(e.to_string()))?;

        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, GraphEngineError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| GraphEngineError::Other(format!("failed to acquire lock: {}", e)))?;
        f(&conn).map_err(|e| GraphEngineError::Other(e.to_string()))
    }
}

#[async_trait]
impl GraphEngine for SqliteGraphEngine {
    async fn add_nodes(&self, nodes: &[GraphNodeRecord]) -> Result<(), GraphEngineError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            for node in nodes {
                let attributes = serde_json::to_string(&node.attributes)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                tx.execute(
                    "INSERT OR REPLACE INTO nodes (slug, label, node_type, attributes, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![node.slug.to_string(), node.label, node.node_type, attributes, now],
                )?;
            }
            tx.commit()
        })
    }

    async fn add_edges(&self, edges: &[GraphEdgeRecord]) -> Result<(), GraphEngineError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            for edge in edges {
                tx.execute(
                    "INSERT OR IGNORE INTO edges (source_slug, destination_slug, relationship_name) VALUES (?1, ?2, ?3)",
                    rusqlite::params![
                        edge.source.to_string(),
                        edge.destination.to_string(),
                        edge.relationship_name
                    ],
                )?;
            }
            tx.commit()
        })
    }

    async fn get_nodes(&self, slugs: &[Uuid]) -> Result<Vec<GraphNodeRecord>, GraphEngineError> {
        if slugs.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<String> = slugs.iter().map(|s| s.to_string()).collect();
        let placeholders: Vec<String> = ids.iter().map(|_| "?".to_string()).collect();
        let sql = format!(
            "SELECT slug, label, node_type, attributes FROM nodes WHERE slug IN ({})",
            placeholders.join(",")
        );

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::ToSql> =
                ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
            let rows = stmt.query_map(params.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;

            let mut nodes = Vec::new();
            for row in rows {
                let (slug, label, node_type, attributes_json) = row?;
                let slug = Uuid::parse_str(&slug)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                let attributes: HashMap<String, serde_json::Value> =
                    serde_json::from_str(&attributes_json).unwrap_or_default();
                nodes.push(GraphNodeRecord {
                    slug,
                    label,
                    node_type,
                    attributes,
                });
            }
            Ok(nodes)
        })
    }

    async fn delete_nodes(&self, slugs: &[Uuid]) -> Result<usize, GraphEngineError> {
        if slugs.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = slugs.iter().map(|s| s.to_string()).collect();
        let placeholders = ids.iter().map(|_| "?".to_string()).collect::<Vec<_>>().join(",");

        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let params: Vec<&dyn rusqlite::ToSql> =
                ids.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
            tx.execute(
                &format!(
                    "DELETE FROM edges WHERE source_slug IN ({0}) OR destination_slug IN ({0})",
                    placeholders
                ),
                rusqlite::params_from_iter(ids.iter().chain(ids.iter())),
            )?;
            let removed = tx.execute(
                &format!("DELETE FROM nodes WHERE slug IN ({})", placeholders),
                params.as_slice(),
            )?;
            tx.commit()?;
            Ok(removed)
        })
    }

    async fn prune(&self) -> Result<(), GraphEngineError> {
        self.with_conn(|conn| {
            conn.execute_batch("DELETE FROM edges; DELETE FROM nodes;")?;
            Ok(())
        })
    }
}
