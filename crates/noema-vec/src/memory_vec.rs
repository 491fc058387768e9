//! In-memory vector engine.

use async_trait::async_trait;
use noema_types::{DataPoint, VectorEngine, VectorEngineError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

type Collections = HashMap<String, HashMap<Uuid, DataPoint>>;

/// In-memory implementation of `VectorEngine`: collection name -> id -> point.
#[derive(Default)]
pub struct InMemoryVectorEngine {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryVectorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of existing collections; test helper.
    pub async fn collection_names(&self) -> Vec<String> {
        self.collections.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl VectorEngine for InMemoryVectorEngine {
    async fn create_collection(&self, collection: &str) -> Result<(), VectorEngineError> {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    async fn has_collection(&self, collection: &str) -> Result<bool, VectorEngineError> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn index_data_points(
        &self,
        collection: &str,
        points: &[DataPoint],
    ) -> Result<(), VectorEngineError> {
        let mut guard = self.collections.write().await;
        let map = guard.entry(collection.to_string()).or_default();
        for point in points {
            map.insert(point.id, point.clone());
        }
        Ok(())
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<Vec<DataPoint>, VectorEngineError> {
        let guard = self.collections.read().await;
        let map = guard
            .get(collection)
            .ok_or_else(|| VectorEngineError::CollectionNotFound(collection.to_string()))?;
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    async fn delete_data_points(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<usize, VectorEngineError> {
        let mut guard = self.collections.write().await;
        let map = guard
            .get_mut(collection)
            .ok_or_else(|| VectorEngineError::CollectionNotFound(collection.to_string()))?;
        let mut removed = 0;
        for id in ids {
            if map.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn prune(&self) -> Result<(), VectorEngineError> {
        self.collections.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_collection_fails_with_collection_not_found() {
        let engine = InMemoryVectorEngine::new();
        let err = engine
            .delete_data_points("Triplet_text", &[Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorEngineError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn index_then_delete_is_idempotent() {
        let engine = InMemoryVectorEngine::new();
        let id = Uuid::new_v4();
        engine
            .index_data_points("Entity_name", &[DataPoint::new(id)])
            .await
            .unwrap();

        assert_eq!(engine.delete_data_points("Entity_name", &[id]).await.unwrap(), 1);
        // Absent ids are no-ops, not errors.
        assert_eq!(engine.delete_data_points("Entity_name", &[id]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn prune_drops_all_collections() {
        let engine = InMemoryVectorEngine::new();
        engine.create_collection("Entity_name").await.unwrap();
        engine.prune().await.unwrap();
        assert!(!engine.has_collection("Entity_name").await.unwrap());
    }
}
