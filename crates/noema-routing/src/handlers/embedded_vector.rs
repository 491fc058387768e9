//! Embedded directory vector provider: one directory per dataset.

use crate::config::StorageConfig;
use async_trait::async_trait;
use noema_types::{
    ConnectionDescriptor, DatasetDatabase, DatasetDatabaseHandler, RoutingError, User,
};
use std::collections::HashMap;
use uuid::Uuid;

pub const HANDLER_KEY: &str = "lancedb_embedded";
const PROVIDER: &str = "lancedb";

pub struct EmbeddedVectorHandler {
    config: StorageConfig,
}

impl EmbeddedVectorHandler {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DatasetDatabaseHandler for EmbeddedVectorHandler {
    async fn create_dataset(
        &self,
        dataset_id: Uuid,
        _user: &User,
    ) -> Result<ConnectionDescriptor, RoutingError> {
        if self.config.vector_provider != PROVIDER {
            return Err(RoutingError::UnsupportedProvider(format!(
                "{HANDLER_KEY} requires vector provider '{PROVIDER}', configured '{}'",
                self.config.vector_provider
            )));
        }

        let path = self
            .config
            .databases_root
            .join("vector")
            .join(format!("{dataset_id}.lance"));
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| RoutingError::Other(e.to_string()))?;

        tracing::debug!(%dataset_id, path = %path.display(), "provisioned embedded vector database");

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
        Ok(dataset_database)
    }

    async fn delete_dataset(&self, dataset_database: &DatasetDatabase) -> Result<(), RoutingError> {
        match tokio::fs::remove_dir_all(&dataset_database.vector_database_url).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RoutingError::Other(e.to_string())),
        }
    }
}
