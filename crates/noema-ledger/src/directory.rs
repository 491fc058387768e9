//! Dataset database directory: the persisted mapping from dataset to the
//! connection descriptors its handlers produced. Exactly one row per
//! dataset; a missing table is reported as `TableMissing` so prune can treat
//! a fresh install as "nothing to do".

use crate::store::MetadataStore;
use noema_types::{DatasetDatabase, MetadataError};
use std::collections::HashMap;
use uuid::Uuid;

const DATASET_DATABASE_COLUMNS: &str = "dataset_id, owner_id, \
    graph_database_name, graph_database_provider, graph_database_url, graph_database_key, \
    graph_database_connection_info, graph_dataset_database_handler, \
    vector_database_name, vector_database_provider, vector_database_url, vector_database_key, \
    vector_database_connection_info, vector_dataset_database_handler";

fn dataset_database_from_row(row: &rusqlite::Row) -> Result<DatasetDatabase, rusqlite::Error> {
    let graph_info: HashMap<String, serde_json::Value> =
        serde_json::from_str(&row.get::<_, String>(6)?).unwrap_or_default();
    let vector_info: HashMap<String, serde_json::Value> =
        serde_json::from_str(&row.get::<_, String>(12)?).unwrap_or_default();
    Ok(DatasetDatabase {
        dataset_id: MetadataStore::parse_uuid(&row.get::<_, String>(0)?)?,
        owner_id: MetadataStore::parse_uuid(&row.get::<_, String>(1)?)?,
        graph_database_name: row.get(2)?,
        graph_database_provider: row.get(3)?,
        graph_database_url: row.get(4)?,
        graph_database_key: row.get(5)?,
        graph_database_connection_info: graph_info,
        graph_dataset_database_handler: row.get(7)?,
        vector_database_name: row.get(8)?,
        vector_database_provider: row.get(9)?,
        vector_database_url: row.get(10)?,
        vector_database_key: row.get(11)?,
        vector_database_connection_info: vector_info,
        vector_dataset_database_handler: row.get(13)?,
    })
}

impl MetadataStore {
    /// Persist the routing row for a dataset. The row is created once; a
    /// second insert for the same dataset is ignored, preserving the
    /// one-row-per-dataset invariant.
    pub async fn insert_dataset_database(
        &self,
        row: &DatasetDatabase,
    ) -> Result<(), MetadataError> {
        let graph_info = serde_json::to_string(&row.graph_database_connection_info)
            .map_err(|e| MetadataError::Other(e.to_string()))?;
        let vector_info = serde_json::to_string(&row.vector_database_connection_info)
            .map_err(|e| MetadataError::Other(e.to_string()))?;
        let row = row.clone();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO dataset_databases (\
                    dataset_id, owner_id, \
                    graph_database_name, graph_database_provider, graph_database_url, \
                    graph_database_key, graph_database_connection_info, graph_dataset_database_handler, \
                    vector_database_name, vector_database_provider, vector_database_url, \
                    vector_database_key, vector_database_connection_info, vector_dataset_database_handler) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                rusqlite::params![
                    row.dataset_id.to_string(),
                    row.owner_id.to_string(),
                    row.graph_database_name,
                    row.graph_database_provider,
                    row.graph_database_url,
                    row.graph_database_key,
                    graph_info,
                    row.graph_dataset_database_handler,
                    row.vector_database_name,
                    row.vector_database_provider,
                    row.vector_database_url,
                    row.vector_database_key,
                    vector_info,
                    row.vector_dataset_database_handler,
                ],
            )?;
            Ok(())
        })
    }

    pub async fn get_dataset_database(
        &self,
        dataset_id: Uuid,
    ) -> Result<Option<DatasetDatabase>, MetadataError> {
        let id = dataset_id.to_string();
        let sql = format!(
            "SELECT {DATASET_DATABASE_COLUMNS} FROM dataset_databases WHERE dataset_id = ?1"
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row([&id], dataset_database_from_row) {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    /// Every routing row; prune iterates this to tear down per-dataset
    /// backends.
    pub async fn all_dataset_databases(&self) -> Result<Vec<DatasetDatabase>, MetadataError> {
        let sql = format!("SELECT {DATASET_DATABASE_COLUMNS} FROM dataset_databases");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], dataset_database_from_row)?;
            rows.collect()
        })
    }

    /// Remove the routing row on dataset teardown.
    pub async fn delete_dataset_database(&self, dataset_id: Uuid) -> Result<(), MetadataError> {
        let id = dataset_id.to_string();
        self.with_conn(|conn| {
            conn.execute("DELETE FROM dataset_databases WHERE dataset_id = ?1", [&id])?;
            Ok(())
        })
    }
}
