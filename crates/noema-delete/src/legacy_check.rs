//! Legacy compatibility checks.
//!
//! Content recorded only in the legacy ledger predates ownership tracking,
//! so whether it is shared with another scope is undecidable. Anything
//! flagged here is excluded from physical deletion for the rest of the
//! pipeline: a conservative skip, never a conservative delete.

use noema_ledger::MetadataStore;
use noema_types::{DeletionError, Edge, GraphEngine, Node};
use std::collections::HashSet;
use uuid::Uuid;

pub struct LegacyChecker<'a, G> {
    store: &'a MetadataStore,
    graph: &'a G,
    isolation: bool,
}

impl<'a, G> LegacyChecker<'a, G>
where
    G: GraphEngine,
{
    pub fn new(store: &'a MetadataStore, graph: &'a G, isolation: bool) -> Self {
        Self {
            store,
            graph,
            isolation,
        }
    }

    /// Per node, whether an undeleted legacy entry matches its slug
    /// (self-loop convention). Under isolation the ledger can carry stale
    /// rows for content that no longer exists in this dataset's graph, so a
    /// flag is only trusted after the node is confirmed present in the graph
    /// engine.
    pub async fn nodes_are_legacy(&self, nodes: &[Node]) -> Result<Vec<bool>, DeletionError> {
        if nodes.is_empty() {
            return Ok(vec![]);
        }
        let slugs: Vec<Uuid> = nodes.iter().map(|n| n.slug).collect();
        let legacy = self.store.undeleted_legacy_node_slugs(&slugs).await?;
        let mut flags: Vec<bool> = nodes.iter().map(|n| legacy.contains(&n.slug)).collect();

        if self.isolation && flags.iter().any(|f| *f) {
            let flagged: Vec<Uuid> = nodes
                .iter()
                .zip(&flags)
                .filter(|(_, flag)| **flag)
                .map(|(n, _)| n.slug)
                .collect();
            let confirmed: HashSet<Uuid> = self
                .graph
                .get_nodes(&flagged)
                .await?
                .into_iter()
                .map(|record| record.slug)
                .collect();
            for (node, flag) in nodes.iter().zip(flags.iter_mut()) {
                if *flag && !confirmed.contains(&node.slug) {
                    tracing::debug!(slug = %node.slug, "stale legacy entry; node absent from graph");
                    *flag = false;
                }
            }
        }

        Ok(flags)
    }

    /// Per edge, whether an undeleted legacy entry's `creator_function` ends
    /// with the edge's relationship name.
    pub async fn edges_are_legacy(&self, edges: &[Edge]) -> Result<Vec<bool>, DeletionError> {
        if edges.is_empty() {
            return Ok(vec![]);
        }
        let names: Vec<String> = edges.iter().map(|e| e.relationship_name.clone()).collect();
        Ok(self.store.undeleted_legacy_edge_matches(&names).await?)
    }
}
