//! Entities persisted by the relational metadata store.

use crate::ids;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A semantic graph node tracked by the ownership ledger.
///
/// `id` is deterministic per owning scope while `slug` is the
/// content-addressed identity shared by every scope that ingested the same
/// content. The graph and vector engines key physical records by `slug`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub slug: Uuid,
    pub user_id: Uuid,
    pub data_id: Uuid,
    pub dataset_id: Uuid,
    pub label: String,
    pub node_type: String,
    /// Attribute names embedded in the vector store for this node type.
    pub indexed_fields: Vec<String>,
    pub attributes: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Node {
    pub fn new(
        user_id: Uuid,
        dataset_id: Uuid,
        data_id: Uuid,
        slug: Uuid,
        label: impl Into<String>,
        node_type: impl Into<String>,
        indexed_fields: Vec<String>,
    ) -> Self {
        Self {
            id: ids::node_id(user_id, dataset_id, data_id, slug),
            slug,
            user_id,
            data_id,
            dataset_id,
            label: label.into(),
            node_type: node_type.into(),
            indexed_fields,
            attributes: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Vector collections this node is indexed in, one per indexed field,
    /// named `{node_type}_{field}`.
    pub fn vector_collections(&self) -> Vec<String> {
        self.indexed_fields
            .iter()
            .map(|field| format!("{}_{}", self.node_type, field))
            .collect()
    }
}

/// A semantic relationship between two nodes, tracked by the ownership
/// ledger. Source and destination reference node slugs; the physical
/// identity of an edge is the (source, relationship, destination) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub data_id: Uuid,
    pub dataset_id: Uuid,
    pub source_node_id: Uuid,
    pub destination_node_id: Uuid,
    pub relationship_name: String,
    pub label: String,
    pub props: HashMap<String, serde_json::Value>,
}

impl Edge {
    pub fn new(
        user_id: Uuid,
        dataset_id: Uuid,
        data_id: Uuid,
        source_node_id: Uuid,
        relationship_name: impl Into<String>,
        destination_node_id: Uuid,
    ) -> Self {
        let relationship_name = relationship_name.into();
        Self {
            id: ids::edge_id(
                user_id,
                dataset_id,
                data_id,
                source_node_id,
                &relationship_name,
                destination_node_id,
            ),
            user_id,
            data_id,
            dataset_id,
            source_node_id,
            destination_node_id,
            label: relationship_name.clone(),
            relationship_name,
            props: HashMap::new(),
        }
    }

    /// Id of this edge's derived triplet embedding in `Triplet_text`.
    pub fn triplet_id(&self) -> Uuid {
        ids::triplet_id(
            self.source_node_id,
            &self.relationship_name,
            self.destination_node_id,
        )
    }
}

/// One row of the append-only legacy ledger, recorded before ownership
/// tracking existed. Nodes are encoded as self-loops with a non-null
/// `node_label`; rows are immutable except for the `deleted_at` marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyLedgerEntry {
    pub id: Uuid,
    pub node_label: Option<String>,
    pub source_node_id: Uuid,
    pub destination_node_id: Uuid,
    pub creator_function: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl LegacyLedgerEntry {
    /// Entry recording a node (self-loop convention).
    pub fn node(slug: Uuid, label: impl Into<String>, creator_function: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_label: Some(label.into()),
            source_node_id: slug,
            destination_node_id: slug,
            creator_function: creator_function.into(),
            deleted_at: None,
            user_id,
            created_at: Utc::now(),
        }
    }

    /// Entry recording an edge between two node slugs.
    pub fn edge(source: Uuid, destination: Uuid, creator_function: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_label: None,
            source_node_id: source,
            destination_node_id: destination,
            creator_function: creator_function.into(),
            deleted_at: None,
            user_id,
            created_at: Utc::now(),
        }
    }
}

/// The user on whose behalf datasets are provisioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
}

impl User {
    pub fn new(id: Uuid) -> Self {
        Self { id, email: None }
    }
}

/// Which side of a dataset's backend a descriptor or handler covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseSide {
    Graph,
    Vector,
}

/// Connection details produced by a handler's `create_dataset`, covering one
/// side (graph or vector) of a dataset's backend. `connection_info` may hold
/// encrypted values or secret references, never live secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub database_name: String,
    pub provider: String,
    pub url: String,
    pub key: Option<String>,
    pub connection_info: HashMap<String, serde_json::Value>,
    /// Registry key of the handler that created this side.
    pub handler: String,
}

/// Persisted routing row: exactly one per dataset, mapping the dataset to
/// the graph and vector backends provisioned for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDatabase {
    pub dataset_id: Uuid,
    pub owner_id: Uuid,
    pub graph_database_name: String,
    pub graph_database_provider: String,
    pub graph_database_url: String,
    pub graph_database_key: Option<String>,
    pub graph_database_connection_info: HashMap<String, serde_json::Value>,
    pub graph_dataset_database_handler: String,
    pub vector_database_name: String,
    pub vector_database_provider: String,
    pub vector_database_url: String,
    pub vector_database_key: Option<String>,
    pub vector_database_connection_info: HashMap<String, serde_json::Value>,
    pub vector_dataset_database_handler: String,
}

impl DatasetDatabase {
    pub fn from_descriptors(
        dataset_id: Uuid,
        owner_id: Uuid,
        graph: ConnectionDescriptor,
        vector: ConnectionDescriptor,
    ) -> Self {
        Self {
            dataset_id,
            owner_id,
            graph_database_name: graph.database_name,
            graph_database_provider: graph.provider,
            graph_database_url: graph.url,
            graph_database_key: graph.key,
            graph_database_connection_info: graph.connection_info,
            graph_dataset_database_handler: graph.handler,
            vector_database_name: vector.database_name,
            vector_database_provider: vector.provider,
            vector_database_url: vector.url,
            vector_database_key: vector.key,
            vector_database_connection_info: vector.connection_info,
            vector_dataset_database_handler: vector.handler,
        }
    }

    pub fn handler_key(&self, side: DatabaseSide) -> &str {
        match side {
            DatabaseSide::Graph => &self.graph_dataset_database_handler,
            DatabaseSide::Vector => &self.vector_dataset_database_handler,
        }
    }
}

/// How ownership queries scope their anti-join. Decided once at startup from
/// the storage configuration and never toggled per request: mixing modes
/// mid-lifecycle corrupts the sharing invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipScope {
    /// Per-dataset physical stores: uniqueness is checked within the dataset.
    Scoped,
    /// One shared physical store for all tenants: uniqueness is checked
    /// across the whole ledger.
    Global,
}

impl OwnershipScope {
    pub fn is_isolated(self) -> bool {
        matches!(self, OwnershipScope::Scoped)
    }
}
