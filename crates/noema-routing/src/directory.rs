//! Directory operations: lazily provision a dataset's backends on first
//! write, resolve live credentials at use time, and tear backends down.

use crate::config::StorageConfig;
use crate::registry::HandlerRegistry;
use noema_ledger::MetadataStore;
use noema_types::{DatasetDatabase, RoutingError, User};
use uuid::Uuid;

/// Return the dataset's routing row, provisioning its graph and vector
/// backends through the configured handlers when the dataset is seen for the
/// first time. The row is persisted once; the stored descriptors carry no
/// live secrets.
pub async fn ensure_dataset_database(
    store: &MetadataStore,
    registry: &HandlerRegistry,
    config: &StorageConfig,
    dataset_id: Uuid,
    user: &User,
) -> Result<DatasetDatabase, RoutingError> {
    if let Some(existing) = store.get_dataset_database(dataset_id).await? {
        return Ok(existing);
    }

    let graph = registry.get(&config.graph_handler)?;
    let graph_descriptor = graph.handler.create_dataset(dataset_id, user).await?;
    let vector = registry.get(&config.vector_handler)?;
    let vector_descriptor = vector.handler.create_dataset(dataset_id, user).await?;

    let row =
        DatasetDatabase::from_descriptors(dataset_id, user.id, graph_descriptor, vector_descriptor);
    store.insert_dataset_database(&row).await?;
    tracing::info!(%dataset_id, "dataset database provisioned");
    Ok(row)
}

/// Resolve live credentials for both sides of the row. The result is for the
/// current connection attempt only and must not be persisted or cached.
pub async fn resolve_dataset_database(
    registry: &HandlerRegistry,
    row: DatasetDatabase,
) -> Result<DatasetDatabase, RoutingError> {
    let graph = registry.get(&row.graph_dataset_database_handler)?;
    let row = graph.handler.resolve_connection_info(row).await?;
    let vector = registry.get(&row.vector_dataset_database_handler)?;
    vector.handler.resolve_connection_info(row).await
}

/// Tear down both provisioned backends and remove the routing row.
pub async fn teardown_dataset_database(
    store: &MetadataStore,
    registry: &HandlerRegistry,
    dataset_id: Uuid,
) -> Result<(), RoutingError> {
    let Some(row) = store.get_dataset_database(dataset_id).await? else {
        return Ok(());
    };

    let graph = registry.get(&row.graph_dataset_database_handler)?;
    graph.handler.delete_dataset(&row).await?;
    let vector = registry.get(&row.vector_dataset_database_handler)?;
    vector.handler.delete_dataset(&row).await?;

    store.delete_dataset_database(dataset_id).await?;
    tracing::info!(%dataset_id, "dataset database torn down");
    Ok(())
}
