//! Embedded file graph provider: one SQLite database file per dataset, no
//! network step. The file is created lazily by the engine on first open.

use crate::config::StorageConfig;
use async_trait::async_trait;
use noema_types::{
    ConnectionDescriptor, DatasetDatabase, DatasetDatabaseHandler, RoutingError, User,
};
use std::collections::HashMap;
use uuid::Uuid;

pub const HANDLER_KEY: &str = "sqlite_embedded";
const PROVIDER: &str = "sqlite";

pub struct EmbeddedGraphHandler {
    config: StorageConfig,
}

impl EmbeddedGraphHandler {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DatasetDatabaseHandler for EmbeddedGraphHandler {
    async fn create_dataset(
        &self,
        dataset_id: Uuid,
        _user: &User,
    ) -> Result<ConnectionDescriptor, RoutingError> {
        if self.config.graph_provider != PROVIDER {
            return Err(RoutingError::UnsupportedProvider(format!(
                "{HANDLER_KEY} requires graph provider '{PROVIDER}', configured '{}'",
                self.config.graph_provider
            )));
        }

        let dir = self.config.databases_root.join("graph");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RoutingError::Other(e.to_string()))?;
        let path = dir.join(format!("{dataset_id}.db"));

        tracing::debug!(%dataset_id, path = %path.display(), "provisioned embedded graph database");

        Ok(ConnectionDescriptor {
            database_name: dataset_id.to_string(),
            provider: PROVIDER.to_string(),
            url: path.display().to_string(),
            key: None,
            connection_info: HashMap::new(),
            handler: HANDLER_KEY.to_string(),
        })
    }

    async fn resolve_connection_info(
        &self,
        dataset_database: DatasetDatabase,
    ) -> Result<DatasetDatabase, RoutingError> {
        // File path is the whole connection; nothing to expand.
        Ok(dataset_database)
    }

    async fn delete_dataset(&self, dataset_database: &DatasetDatabase) -> Result<(), RoutingError> {
        match tokio::fs::remove_file(&dataset_database.graph_database_url).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RoutingError::Other(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &std::path::Path, provider: &str) -> StorageConfig {
        let mut config = StorageConfig::shared_memory();
        config.graph_provider = provider.to_string();
        config.databases_root = root.to_path_buf();
        config
    }

    #[tokio::test]
    async fn create_fails_fast_on_provider_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let handler = EmbeddedGraphHandler::new(config(dir.path(), "neo4j"));
        let user = User::new(Uuid::new_v4());

        let err = handler.create_dataset(Uuid::new_v4(), &user).await.unwrap_err();
        assert!(matches!(err, RoutingError::UnsupportedProvider(_)));
        // Fail-fast means no filesystem side effects at all.
        assert!(!dir.path().join("graph").exists());
    }

    #[tokio::test]
    async fn create_then_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let handler = EmbeddedGraphHandler::new(config(dir.path(), "sqlite"));
        let user = User::new(Uuid::new_v4());
        let dataset_id = Uuid::new_v4();

        let descriptor = handler.create_dataset(dataset_id, &user).await.unwrap();
        assert_eq!(descriptor.provider, "sqlite");
        assert_eq!(descriptor.handler, HANDLER_KEY);
        assert!(dir.path().join("graph").exists());

        let row = DatasetDatabase::from_descriptors(
            dataset_id,
            user.id,
            descriptor.clone(),
            descriptor,
        );
        // Deleting a never-materialized file is a no-op, and so is deleting twice.
        handler.delete_dataset(&row).await.unwrap();
        handler.delete_dataset(&row).await.unwrap();
    }
}
