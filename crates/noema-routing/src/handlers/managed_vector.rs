//! Managed relational-vector provider.
//!
//! Provisions a dedicated vector database per dataset through an admin
//! connection: the admin catalog records every provisioned database, and the
//! new database gets its schema bootstrapped before the descriptor is
//! returned.

use crate::config::StorageConfig;
use async_trait::async_trait;
use noema_types::{
    ConnectionDescriptor, DatasetDatabase, DatasetDatabaseHandler, RoutingError, User,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const HANDLER_KEY: &str = "sqlite_vec_managed";
const PROVIDER: &str = "sqlite_vec";

pub struct ManagedVectorHandler {
    config: StorageConfig,
}

impl ManagedVectorHandler {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    fn admin_catalog_path(&self) -> PathBuf {
        self.config.databases_root.join("vector_admin.db")
    }

    fn open_admin(&self) -> Result<rusqlite::Connection, RoutingError> {
        let conn = rusqlite::Connection::open(self.admin_catalog_path())
            .map_err(|e| RoutingError::Other(e.to_string()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS provisioned_databases (
                dataset_id TEXT PRIMARY KEY,
                database_path TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
        .map_err(|e| RoutingError::Other(e.to_string()))?;
        Ok(conn)
    }

    fn bootstrap_database(path: &Path) -> Result<(), RoutingError> {
        let conn =
            rusqlite::Connection::open(path).map_err(|e| RoutingError::Other(e.to_string()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS points (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                vector BLOB NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_points_collection ON points(collection);
            "#,
        )
        .map_err(|e| RoutingError::Other(e.to_string()))
    }
}

#[async_trait]
impl DatasetDatabaseHandler for ManagedVectorHandler {
    async fn create_dataset(
        &self,
        dataset_id: Uuid,
        user: &User,
    ) -> Result<ConnectionDescriptor, RoutingError> {
        if self.config.vector_provider != PROVIDER {
            return Err(RoutingError::UnsupportedProvider(format!(
                "{HANDLER_KEY} requires vector provider '{PROVIDER}', configured '{}'",
                self.config.vector_provider
            )));
        }

        let dir = self.config.databases_root.join("vector");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RoutingError::Other(e.to_string()))?;
        let path = dir.join(format!("{dataset_id}.vecdb"));

        let admin = self.open_admin()?;
        Self::bootstrap_database(&path)?;
        admin
            .execute(
                "INSERT OR IGNORE INTO provisioned_databases (dataset_id, database_path, owner_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    dataset_id.to_string(),
                    path.display().to_string(),
                    user.id.to_string(),
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| RoutingError::Other(e.to_string()))?;

        tracing::debug!(%dataset_id, path = %path.display(), "provisioned managed vector database");

        let mut connection_info = HashMap::new();
        connection_info.insert(
            "admin_catalog".to_string(),
            serde_json::Value::String(self.admin_catalog_path().display().to_string()),
        );

        Ok(ConnectionDescriptor {
            database_name: dataset_id.to_string(),
            provider: PROVIDER.to_string(),
            url: path.display().to_string(),
            key: None,
            connection_info,
            handler: HANDLER_KEY.to_string(),
        })
    }

    async fn resolve_connection_info(
        &self,
        dataset_database: DatasetDatabase,
    ) -> Result<DatasetDatabase, RoutingError> {
        Ok(dataset_database)
    }

    async fn delete_dataset(&self, dataset_database: &DatasetDatabase) -> Result<(), RoutingError> {
        if self.admin_catalog_path().exists() {
            let admin = self.open_admin()?;
            admin
                .execute(
                    "DELETE FROM provisioned_databases WHERE dataset_id = ?1",
                    [dataset_database.dataset_id.to_string()],
                )
                .map_err(|e| RoutingError::Other(e.to_string()))?;
        }
        match tokio::fs::remove_file(&dataset_database.vector_database_url).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RoutingError::Other(e.to_string())),
        }
    }
}
