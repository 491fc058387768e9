//! SQLite-backed metadata store shared by the ownership ledger, the legacy
//! ledger, and the dataset database directory.

use noema_types::MetadataError;
use std::path::Path;
use uuid::Uuid;

/// Relational metadata store.
///
/// `open`/`in_memory_without_schema` leave the database untouched so a fresh
/// install is observable (prune treats missing tables as nothing to do);
/// `setup` creates the schema and is idempotent.
pub struct MetadataStore {
    conn: std::sync::Mutex<rusqlite::Connection>,
}

impl MetadataStore {
    /// Open the store at the given path without touching the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let conn =
            rusqlite::Connection::open(path).map_err(|e| MetadataError::Other(e.to_string()))?;
        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    /// Open the store and create the schema.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let store = Self::open(path)?;
        store.setup()?;
        Ok(store)
    }

    /// In-memory store with the schema created; test and dev convenience.
    pub fn in_memory() -> Result<Self, MetadataError> {
        let store = Self::in_memory_without_schema()?;
        store.setup()?;
        Ok(store)
    }

    /// In-memory store with no tables, modelling a fresh install.
    pub fn in_memory_without_schema() -> Result<Self, MetadataError> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| MetadataError::Other(e.to_string()))?;
        Ok(Self {
            conn: std::sync::Mutex::new(conn),
        })
    }

    /// Create all relational tables. Idempotent.
    pub fn setup(&self) -> Result<(), MetadataError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS nodes (
                    id TEXT PRIMARY KEY,
                    slug TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    data_id TEXT NOT NULL,
                    dataset_id TEXT NOT NULL,
                    label TEXT NOT NULL,
                    node_type TEXT NOT NULL,
                    indexed_fields TEXT NOT NULL,
                    attributes TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_nodes_dataset_slug ON nodes(dataset_id, slug);
                CREATE INDEX IF NOT EXISTS idx_nodes_dataset_data ON nodes(dataset_id, data_id);

                CREATE TABLE IF NOT EXISTS edges (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    data_id TEXT NOT NULL,
                    dataset_id TEXT NOT NULL,
                    source_node_id TEXT NOT NULL,
                    destination_node_id TEXT NOT NULL,
                    relationship_name TEXT NOT NULL,
                    label TEXT NOT NULL,
                    props TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_edges_dataset_data ON edges(dataset_id, data_id);
                CREATE INDEX IF NOT EXISTS idx_edges_triple
                    ON edges(source_node_id, relationship_name, destination_node_id);

                CREATE TABLE IF NOT EXISTS legacy_graph_ledger (
                    id TEXT PRIMARY KEY,
                    node_label TEXT,
                    source_node_id TEXT NOT NULL,
                    destination_node_id TEXT NOT NULL,
                    creator_function TEXT NOT NULL,
                    deleted_at TEXT,
                    user_id TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_legacy_source ON legacy_graph_ledger(source_node_id);
                CREATE INDEX IF NOT EXISTS idx_legacy_destination
                    ON legacy_graph_ledger(destination_node_id);

                CREATE TABLE IF NOT EXISTS dataset_databases (
                    dataset_id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    graph_database_name TEXT NOT NULL,
                    graph_database_provider TEXT NOT NULL,
                    graph_database_url TEXT NOT NULL,
                    graph_database_key TEXT,
                    graph_database_connection_info TEXT NOT NULL,
                    graph_dataset_database_handler TEXT NOT NULL,
                    vector_database_name TEXT NOT NULL,
                    vector_database_provider TEXT NOT NULL,
                    vector_database_url TEXT NOT NULL,
                    vector_database_key TEXT,
                    vector_database_connection_info TEXT NOT NULL,
                    vector_dataset_database_handler TEXT NOT NULL
                );
                "#,
            )
        })
    }

    /// Drop every relational table. Prune-only path.
    pub fn drop_all_tables(&self) -> Result<(), MetadataError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                DROP TABLE IF EXISTS nodes;
                DROP TABLE IF EXISTS edges;
                DROP TABLE IF EXISTS legacy_graph_ledger;
                DROP TABLE IF EXISTS dataset_databases;
                "#,
            )
        })
    }

    pub(crate) fn with_conn<T, F>(&self, f: F) -> Result<T, MetadataError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MetadataError::Other(format!("failed to acquire lock: {}", e)))?;
        f(&conn).map_err(map_sqlite_err)
    }

    pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, rusqlite::Error> {
        Uuid::parse_str(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
    }
}

fn map_sqlite_err(e: rusqlite::Error) -> MetadataError {
    let msg = e.to_string();
    if msg.contains("no such table") {
        MetadataError::TableMissing(msg)
    } else {
        MetadataError::Other(msg)
    }
}
