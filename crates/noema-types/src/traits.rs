//! Traits for the storage backends and the dataset database lifecycle.

use crate::{
    ConnectionDescriptor, DatasetDatabase, GraphEngineError, RoutingError, User, VectorEngineError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

/// Physical node record as stored by a graph engine, keyed by slug.
#[derive(Debug, Clone)]
pub struct GraphNodeRecord {
    pub slug: Uuid,
    pub label: String,
    pub node_type: String,
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Physical edge record; identity is the full triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdgeRecord {
    pub source: Uuid,
    pub destination: Uuid,
    pub relationship_name: String,
}

/// Graph store abstraction. Content is keyed by slug, so identical content
/// ingested from different scopes lands on the same physical record.
#[async_trait]
pub trait GraphEngine: Send + Sync {
    /// Insert or replace nodes by slug.
    async fn add_nodes(&self, nodes: &[GraphNodeRecord]) -> Result<(), GraphEngineError>;

    /// Insert edges; duplicates of an existing triple are ignored.
    async fn add_edges(&self, edges: &[GraphEdgeRecord]) -> Result<(), GraphEngineError>;

    /// Fetch the records that physically exist for the given slugs.
    async fn get_nodes(&self, slugs: &[Uuid]) -> Result<Vec<GraphNodeRecord>, GraphEngineError>;

    /// Delete nodes by slug along with their incident edges. Deleting an
    /// absent slug is a no-op; returns the number of nodes removed.
    async fn delete_nodes(&self, slugs: &[Uuid]) -> Result<usize, GraphEngineError>;

    /// Destroy all stored content. Operator/test path only.
    async fn prune(&self) -> Result<(), GraphEngineError>;
}

/// One embedded record in a vector collection. The embedding itself is
/// computed outside this core; deletion only needs the id.
#[derive(Debug, Clone)]
pub struct DataPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

impl DataPoint {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            vector: Vec::new(),
            payload: HashMap::new(),
        }
    }
}

/// Vector store abstraction. Collections follow the platform naming
/// convention: `{NodeType}_{indexed_field}` for entities, plus the fixed
/// `EdgeType_relationship_name` and `Triplet_text` collections.
#[async_trait]
pub trait VectorEngine: Send + Sync {
    async fn create_collection(&self, collection: &str) -> Result<(), VectorEngineError>;

    async fn has_collection(&self, collection: &str) -> Result<bool, VectorEngineError>;

    /// Upsert points, creating the collection when missing.
    async fn index_data_points(
        &self,
        collection: &str,
        points: &[DataPoint],
    ) -> Result<(), VectorEngineError>;

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<Vec<DataPoint>, VectorEngineError>;

    /// Delete points by id; absent ids are no-ops. Fails with
    /// `CollectionNotFound` when the collection itself does not exist.
    async fn delete_data_points(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<usize, VectorEngineError>;

    /// Destroy all collections. Operator/test path only.
    async fn prune(&self) -> Result<(), VectorEngineError>;
}

/// Provider-specific lifecycle of a dataset's backing database.
///
/// `create_dataset` must validate that the currently configured provider
/// matches the handler's own identity and fail with
/// `RoutingError::UnsupportedProvider` before performing any file or network
/// I/O otherwise.
#[async_trait]
pub trait DatasetDatabaseHandler: Send + Sync {
    /// Provision a backend for the dataset and return its connection
    /// descriptor for persistence.
    async fn create_dataset(
        &self,
        dataset_id: Uuid,
        user: &User,
    ) -> Result<ConnectionDescriptor, RoutingError>;

    /// Expand or decrypt live credentials for use. The resolved row must
    /// never be persisted back and never cached beyond the current
    /// connection attempt.
    async fn resolve_connection_info(
        &self,
        dataset_database: DatasetDatabase,
    ) -> Result<DatasetDatabase, RoutingError>;

    /// Tear down the backend provisioned for this dataset.
    async fn delete_dataset(&self, dataset_database: &DatasetDatabase) -> Result<(), RoutingError>;
}
