//! In-memory graph engine.

use async_trait::async_trait;
use noema_types::{GraphEdgeRecord, GraphEngine, GraphEngineError, GraphNodeRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory implementation of `GraphEngine`. Nodes are keyed by slug;
/// edges are held as a deduplicated triple list.
#[derive(Default)]
pub struct InMemoryGraphEngine {
    nodes: Arc<RwLock<HashMap<Uuid, GraphNodeRecord>>>,
    edges: Arc<RwLock<Vec<GraphEdgeRecord>>>,
}

impl InMemoryGraphEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes; test helper.
    pub async fn node_count(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// Number of stored edges; test helper.
    pub async fn edge_count(&self) -> usize {
        self.edges.read().await.len()
    }
}

#[async_trait]
impl GraphEngine for InMemoryGraphEngine {
    async fn add_nodes(&self, nodes: &[GraphNodeRecord]) -> Result<(), GraphEngineError> {
        let mut guard = self.nodes.write().await;
        for node in nodes {
            guard.insert(node.slug, node.clone());
        }
        Ok(())
    }

    async fn add_edges(&self, edges: &[GraphEdgeRecord]) -> Result<(), GraphEngineError> {
        let mut guard = self.edges.write().await;
        for edge in edges {
            if !guard.contains(edge) {
                guard.push(edge.clone());
            }
        }
        Ok(())
    }

    async fn get_nodes(&self, slugs: &[Uuid]) -> Result<Vec<GraphNodeRecord>, GraphEngineError> {
        let guard = self.nodes.read().await;
        Ok(slugs.iter().filter_map(|s| guard.get(s).cloned()).collect())
    }

    async fn delete_nodes(&self, slugs: &[Uuid]) -> Result<usize, GraphEngineError> {
        let mut nodes = self.nodes.write().await;
        let mut edges = self.edges.write().await;
        let mut removed = 0;
        for slug in slugs {
            if nodes.remove(slug).is_some() {
                removed += 1;
            }
            edges.retain(|e| e.source != *slug && e.destination != *slug);
        }
        Ok(removed)
    }

    async fn prune(&self) -> Result<(), GraphEngineError> {
        self.nodes.write().await.clear();
        self.edges.write().await.clear();
        Ok(())
    }
}
