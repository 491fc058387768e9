//! Deletion engine: scoped cross-store deletes.

use crate::legacy_check::LegacyChecker;
use noema_ledger::MetadataStore;
use noema_types::{
    edge_type_id, DeletionError, Edge, GraphEngine, Node, OwnershipScope, VectorEngine,
    VectorEngineError,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const EDGE_TYPE_COLLECTION: &str = "EdgeType_relationship_name";
const TRIPLET_COLLECTION: &str = "Triplet_text";

/// What a deletion actually did. Engine counts cover physical records;
/// ownership counts cover relational rows (legacy rows included).
#[derive(Debug, Default, Clone)]
pub struct DeletionReport {
    pub nodes_deleted: usize,
    pub edges_deleted: usize,
    pub legacy_nodes_skipped: usize,
    pub legacy_edges_skipped: usize,
    pub ownership_nodes_deleted: usize,
    pub ownership_edges_deleted: usize,
}

struct PhysicalOutcome {
    nodes_deleted: usize,
    edges_deleted: usize,
    legacy_nodes_skipped: usize,
    legacy_edges_skipped: usize,
    /// Slugs of the non-legacy nodes, for the legacy-ledger soft-mark.
    live_slugs: Vec<Uuid>,
}

/// Deletes a scope's uniquely-owned content from the graph engine, the
/// vector engine, and the ownership ledger, in that order. The anti-join
/// scope is fixed at construction and must match the process-wide isolation
/// mode.
pub struct DeletionEngine<G, V> {
    store: Arc<MetadataStore>,
    graph: G,
    vector: V,
    scope: OwnershipScope,
}

impl<G, V> DeletionEngine<G, V>
where
    G: GraphEngine,
    V: VectorEngine,
{
    pub fn new(store: Arc<MetadataStore>, graph: G, vector: V, scope: OwnershipScope) -> Self {
        Self {
            store,
            graph,
            vector,
            scope,
        }
    }

    /// Delete one data item's uniquely-owned content from all stores.
    ///
    /// A scope with no uniquely-owned nodes is a no-op: content shared with
    /// other data items stays, and so do the scope's ownership rows until
    /// the last referencing scope is deleted. Safe to re-invoke after a
    /// partial failure.
    pub async fn delete_data(
        &self,
        dataset_id: Uuid,
        data_id: Uuid,
        user_id: Uuid,
    ) -> Result<DeletionReport, DeletionError> {
        if !self.store.has_related_to_data(dataset_id, data_id).await? {
            tracing::debug!(%dataset_id, %data_id, "nothing related to data; skipping");
            return Ok(DeletionReport::default());
        }

        let nodes = match self.scope {
            OwnershipScope::Scoped => self.store.nodes_related_to_data(dataset_id, data_id).await?,
            OwnershipScope::Global => {
                self.store
                    .nodes_related_to_data_global(dataset_id, data_id)
                    .await?
            }
        };
        if nodes.is_empty() {
            tracing::debug!(%dataset_id, %data_id, "no uniquely owned nodes; skipping");
            return Ok(DeletionReport::default());
        }
        let edges = match self.scope {
            OwnershipScope::Scoped => self.store.edges_related_to_data(dataset_id, data_id).await?,
            OwnershipScope::Global => {
                self.store
                    .edges_related_to_data_global(dataset_id, data_id)
                    .await?
            }
        };

        let outcome = self.delete_physical(nodes, edges).await?;
        let (ownership_nodes, ownership_edges) =
            self.store.delete_rows_for_data(dataset_id, data_id).await?;
        self.store
            .mark_legacy_deleted_for_slugs(&outcome.live_slugs)
            .await?;

        let report = DeletionReport {
            nodes_deleted: outcome.nodes_deleted,
            edges_deleted: outcome.edges_deleted,
            legacy_nodes_skipped: outcome.legacy_nodes_skipped,
            legacy_edges_skipped: outcome.legacy_edges_skipped,
            ownership_nodes_deleted: ownership_nodes,
            ownership_edges_deleted: ownership_edges,
        };
        tracing::info!(%dataset_id, %data_id, %user_id,
            nodes = report.nodes_deleted, edges = report.edges_deleted, "data deleted");
        Ok(report)
    }

    /// Delete a whole dataset's content from all stores.
    ///
    /// Unlike `delete_data`, the dataset's ownership rows are removed even
    /// when nothing is uniquely owned: a dataset may consist entirely of
    /// content shared with other datasets, but its ownership must still
    /// disappear.
    pub async fn delete_dataset(
        &self,
        dataset_id: Uuid,
        user_id: Uuid,
    ) -> Result<DeletionReport, DeletionError> {
        let nodes = match self.scope {
            OwnershipScope::Scoped => self.store.nodes_related_to_dataset(dataset_id).await?,
            OwnershipScope::Global => {
                self.store.nodes_related_to_dataset_global(dataset_id).await?
            }
        };

        let mut report = DeletionReport::default();
        let live_slugs = if nodes.is_empty() {
            Vec::new()
        } else {
            let edges = match self.scope {
                OwnershipScope::Scoped => self.store.edges_related_to_dataset(dataset_id).await?,
                OwnershipScope::Global => {
                    self.store.edges_related_to_dataset_global(dataset_id).await?
                }
            };
            let outcome = self.delete_physical(nodes, edges).await?;
            report.nodes_deleted = outcome.nodes_deleted;
            report.edges_deleted = outcome.edges_deleted;
            report.legacy_nodes_skipped = outcome.legacy_nodes_skipped;
            report.legacy_edges_skipped = outcome.legacy_edges_skipped;
            outcome.live_slugs
        };

        let (ownership_nodes, ownership_edges) =
            self.store.delete_rows_for_dataset(dataset_id).await?;
        report.ownership_nodes_deleted = ownership_nodes;
        report.ownership_edges_deleted = ownership_edges;
        self.store.mark_legacy_deleted_for_slugs(&live_slugs).await?;

        tracing::info!(%dataset_id, %user_id,
            nodes = report.nodes_deleted,
            ownership_rows = report.ownership_nodes_deleted + report.ownership_edges_deleted,
            "dataset deleted");
        Ok(report)
    }

    /// Steps 3-6: legacy partition, then graph and vector deletes for the
    /// non-legacy subset.
    async fn delete_physical(
        &self,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Result<PhysicalOutcome, DeletionError> {
        let checker = LegacyChecker::new(&self.store, &self.graph, self.scope.is_isolated());
        let node_flags = checker.nodes_are_legacy(&nodes).await?;
        let edge_flags = checker.edges_are_legacy(&edges).await?;

        let legacy_nodes_skipped = node_flags.iter().filter(|f| **f).count();
        let legacy_edges_skipped = edge_flags.iter().filter(|f| **f).count();
        let live_nodes: Vec<&Node> = nodes
            .iter()
            .zip(&node_flags)
            .filter(|(_, legacy)| !**legacy)
            .map(|(n, _)| n)
            .collect();
        let live_edges: Vec<&Edge> = edges
            .iter()
            .zip(&edge_flags)
            .filter(|(_, legacy)| !**legacy)
            .map(|(e, _)| e)
            .collect();

        let mut live_slugs: Vec<Uuid> = live_nodes.iter().map(|n| n.slug).collect();
        live_slugs.sort_unstable();
        live_slugs.dedup();

        let nodes_deleted = self.graph.delete_nodes(&live_slugs).await?;

        // One vector bucket per {node_type}_{indexed_field} collection.
        let mut buckets: HashMap<String, Vec<Uuid>> = HashMap::new();
        for node in &live_nodes {
            for collection in node.vector_collections() {
                buckets.entry(collection).or_default().push(node.slug);
            }
        }
        for (collection, mut ids) in buckets {
            ids.sort_unstable();
            ids.dedup();
            self.vector.delete_data_points(&collection, &ids).await?;
        }

        if !live_edges.is_empty() {
            let mut edge_type_ids: Vec<Uuid> = live_edges
                .iter()
                .map(|e| edge_type_id(&e.relationship_name))
                .collect();
            edge_type_ids.sort_unstable();
            edge_type_ids.dedup();
            self.vector
                .delete_data_points(EDGE_TYPE_COLLECTION, &edge_type_ids)
                .await?;

            let mut triplet_ids: Vec<Uuid> = live_edges.iter().map(|e| e.triplet_id()).collect();
            triplet_ids.sort_unstable();
            triplet_ids.dedup();
            match self
                .vector
                .delete_data_points(TRIPLET_COLLECTION, &triplet_ids)
                .await
            {
                Ok(_) => {}
                // Deployments without triplet search have no such collection.
                Err(VectorEngineError::CollectionNotFound(collection)) => {
                    tracing::debug!(%collection, "triplet collection absent; skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(PhysicalOutcome {
            nodes_deleted,
            edges_deleted: live_edges.len(),
            legacy_nodes_skipped,
            legacy_edges_skipped,
            live_slugs,
        })
    }
}
