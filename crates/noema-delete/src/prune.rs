//! Prune: destroy everything.
//!
//! Operator/test-only. Performs no permission checks and must never be
//! reachable from a network-facing API.

use noema_ledger::MetadataStore;
use noema_routing::{HandlerRegistry, StorageConfig};
use noema_types::{DatabaseSide, DeletionError, GraphEngine, MetadataError, VectorEngine};

#[derive(Debug, Clone, Copy, Default)]
pub struct PruneOptions {
    /// Destroy graph store content (shared store or per-dataset backends).
    pub graph: bool,
    /// Destroy vector store content.
    pub vector: bool,
    /// Drop all relational tables.
    pub metadata: bool,
    /// Remove the derived on-disk cache.
    pub cache: bool,
}

impl PruneOptions {
    pub fn everything() -> Self {
        Self {
            graph: true,
            vector: true,
            metadata: true,
            cache: true,
        }
    }
}

/// Wipe the system. With isolation disabled the shared engines are pruned
/// directly; with isolation enabled every DatasetDatabase row is torn down
/// through the handler that created it. A missing DatasetDatabase table
/// (fresh install) means there is nothing to prune, not an error.
pub async fn prune_system<G, V>(
    store: &MetadataStore,
    registry: &HandlerRegistry,
    config: &StorageConfig,
    graph: &G,
    vector: &V,
    opts: PruneOptions,
) -> Result<(), DeletionError>
where
    G: GraphEngine,
    V: VectorEngine,
{
    if opts.graph || opts.vector {
        if config.dataset_isolation {
            let rows = match store.all_dataset_databases().await {
                Ok(rows) => rows,
                Err(MetadataError::TableMissing(_)) => {
                    tracing::info!("dataset database table missing; nothing to prune");
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            };
            for row in rows {
                if opts.graph {
                    let handler = registry.get(row.handler_key(DatabaseSide::Graph))?;
                    handler.handler.delete_dataset(&row).await?;
                }
                if opts.vector {
                    let handler = registry.get(row.handler_key(DatabaseSide::Vector))?;
                    handler.handler.delete_dataset(&row).await?;
                }
                if opts.graph && opts.vector {
                    store.delete_dataset_database(row.dataset_id).await?;
                }
                tracing::info!(dataset_id = %row.dataset_id, "dataset backends pruned");
            }
        } else {
            if opts.graph {
                graph.prune().await?;
            }
            if opts.vector {
                vector.prune().await?;
            }
        }
    }

    if opts.metadata {
        store.drop_all_tables()?;
        tracing::info!("relational metadata dropped");
    }

    if opts.cache {
        match tokio::fs::remove_dir_all(&config.cache_root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(DeletionError::Metadata(MetadataError::Other(e.to_string()))),
        }
    }

    Ok(())
}
