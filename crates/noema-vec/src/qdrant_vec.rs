//! Qdrant-backed vector engine (requires feature "qdrant").

use async_trait::async_trait;
use noema_types::{DataPoint, VectorEngine, VectorEngineError};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, GetPointsBuilder, PointStruct,
    UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Payload;
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const VECTOR_SIZE: u64 = 1536;

/// Qdrant-backed implementation of `VectorEngine`.
pub struct QdrantVectorEngine {
    client: Arc<Qdrant>,
}

impl QdrantVectorEngine {
    pub fn new(url: &str) -> Result<Self, VectorEngineError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorEngineError::Other(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl VectorEngine for QdrantVectorEngine {
    async fn create_collection(&self, collection: &str) -> Result<(), VectorEngineError> {
        let exists = self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| VectorEngineError::Other(e.to_string()))?;
        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(collection).vectors_config(
                        VectorParamsBuilder::new(
                            VECTOR_SIZE,
                            qdrant_client::qdrant::Distance::Cosine,
                        ),
                    ),
                )
                .await
                .map_err(|e| VectorEngineError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn has_collection(&self, collection: &str) -> Result<bool, VectorEngineError> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(|e| VectorEngineError::Other(e.to_string()))
    }

    async fn index_data_points(
        &self,
        collection: &str,
        points: &[DataPoint],
    ) -> Result<(), VectorEngineError> {
        self.create_collection(collection).await?;
        let points: Vec<PointStruct> = points
            .iter()
            .map(|p| {
                let payload_json = serde_json::Value::Object(
                    p.payload
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                );
                let payload = Payload::try_from(payload_json).unwrap_or_default();
                PointStruct::new(p.id.to_string(), p.vector.clone(), payload)
            })
            .collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection.to_string(), points).wait(true))
            .await
            .map_err(|e| VectorEngineError::Other(e.to_string()))?;
        Ok(())
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<Vec<DataPoint>, VectorEngineError> {
        if !self.has_collection(collection).await? {
            return Err(VectorEngineError::CollectionNotFound(collection.to_string()));
        }
        let point_ids: Vec<qdrant_client::qdrant::PointId> = ids
            .iter()
            .map(|id| qdrant_client::qdrant::PointId::from(id.to_string()))
            .collect();
        let resp = self
            .client
            .get_points(
                GetPointsBuilder::new(collection.to_string(), point_ids)
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| VectorEngineError::Other(e.to_string()))?;

        let mut points = Vec::new();
        for p in resp.result {
            let id = p
                .id
                .as_ref()
                .and_then(|id| {
                    id.point_id_options.as_ref().map(|o| match o {
                        qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u) => u.clone(),
                        qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => n.to_string(),
                    })
                })
                .unwrap_or_default();
            let id = Uuid::parse_str(&id).map_err(|e| VectorEngineError::Other(e.to_string()))?;
            let payload: HashMap<String, serde_json::Value> = p
                .payload
                .into_iter()
                .map(|(k, v)| {
                    let val = match v.kind.as_ref() {
                        Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => {
                            serde_json::Value::String(s.clone())
                        }
                        Some(qdrant_client::qdrant::value::Kind::DoubleValue(f)) => {
                            serde_json::Number::from_f64(*f)
                                .map(serde_json::Value::Number)
                                .unwrap_or(serde_json::Value::Null)
                        }
                        Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)) => {
                            serde_json::Value::Number(serde_json::Number::from(*i))
                        }
                        Some(qdrant_client::qdrant::value::Kind::BoolValue(b)) => {
                            serde_json::Value::Bool(*b)
                        }
                        _ => serde_json::Value::Null,
                    };
                    (k, val)
                })
                .collect();
            points.push(DataPoint {
                id,
                vector: Vec::new(),
                payload,
            });
        }
        Ok(points)
    }

    async fn delete_data_points(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<usize, VectorEngineError> {
        if !self.has_collection(collection).await? {
            return Err(VectorEngineError::CollectionNotFound(collection.to_string()));
        }
        let point_ids: Vec<qdrant_client::qdrant::PointId> = ids
            .iter()
            .map(|id| qdrant_client::qdrant::PointId::from(id.to_string()))
            .collect();
        let count = point_ids.len();
        self.client
            .delete_points(DeletePointsBuilder::new(collection.to_string()).points(point_ids))
            .await
            .map_err(|e| VectorEngineError::Other(e.to_string()))?;
        Ok(count)
    }

    async fn prune(&self) -> Result<(), VectorEngineError> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorEngineError::Other(e.to_string()))?;
        for collection in collections.collections {
            self.client
                .delete_collection(collection.name.clone())
                .await
                .map_err(|e| VectorEngineError::Other(e.to_string()))?;
        }
        Ok(())
    }
}
