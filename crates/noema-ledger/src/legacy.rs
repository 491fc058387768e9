//! Legacy ledger: the append-only record of graph content written before
//! ownership tracking existed. Consulted read-only to veto unsafe deletes;
//! the only mutation ever applied is the `deleted_at` soft-delete marker.

use crate::store::MetadataStore;
use noema_types::{LegacyLedgerEntry, MetadataError};
use std::collections::HashSet;
use uuid::Uuid;

impl MetadataStore {
    /// Append entries to the legacy ledger. Used by migration tooling and
    /// tests; the engine itself never writes new history.
    pub async fn record_legacy_entries(
        &self,
        entries: &[LegacyLedgerEntry],
    ) -> Result<(), MetadataError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            for entry in entries {
                tx.execute(
                    "INSERT INTO legacy_graph_ledger (id, node_label, source_node_id, destination_node_id, creator_function, deleted_at, user_id, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        entry.id.to_string(),
                        entry.node_label,
                        entry.source_node_id.to_string(),
                        entry.destination_node_id.to_string(),
                        entry.creator_function,
                        entry.deleted_at.map(|t| t.to_rfc3339()),
                        entry.user_id.to_string(),
                        entry.created_at.to_rfc3339(),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Subset of the given slugs that have an undeleted node entry
    /// (self-loop convention: source == destination == slug, non-null label).
    pub async fn undeleted_legacy_node_slugs(
        &self,
        slugs: &[Uuid],
    ) -> Result<HashSet<Uuid>, MetadataError> {
        if slugs.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<String> = slugs.iter().map(|s| s.to_string()).collect();
        let placeholders = ids.iter().map(|_| "?".to_string()).collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT source_node_id FROM legacy_graph_ledger \
             WHERE deleted_at IS NULL AND node_label IS NOT NULL \
               AND source_node_id = destination_node_id \
               AND source_node_id IN ({placeholders})"
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                MetadataStore::parse_uuid(&row.get::<_, String>(0)?)
            })?;
            rows.collect()
        })
    }

    /// For each relationship name, whether an undeleted edge entry's
    /// `creator_function` ends with it (suffix match).
    pub async fn undeleted_legacy_edge_matches(
        &self,
        relationship_names: &[String],
    ) -> Result<Vec<bool>, MetadataError> {
        if relationship_names.is_empty() {
            return Ok(vec![]);
        }
        let names = relationship_names.to_vec();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT EXISTS (SELECT 1 FROM legacy_graph_ledger \
                 WHERE deleted_at IS NULL AND node_label IS NULL \
                   AND creator_function LIKE '%' || ?1)",
            )?;
            let mut out = Vec::with_capacity(names.len());
            for name in &names {
                let found: bool = stmt.query_row([name], |row| row.get(0))?;
                out.push(found);
            }
            Ok(out)
        })
    }

    /// Soft-mark every undeleted entry touching one of the given slugs, so
    /// later legacy checks no longer veto their deletion. Returns the number
    /// of entries marked.
    pub async fn mark_legacy_deleted_for_slugs(
        &self,
        slugs: &[Uuid],
    ) -> Result<usize, MetadataError> {
        if slugs.is_empty() {
            return Ok(0);
        }
        let now = chrono::Utc::now().to_rfc3339();
        let ids: Vec<String> = slugs.iter().map(|s| s.to_string()).collect();
        let placeholders = ids.iter().map(|_| "?".to_string()).collect::<Vec<_>>().join(",");
        let sql = format!(
            "UPDATE legacy_graph_ledger SET deleted_at = ? \
             WHERE deleted_at IS NULL \
               AND (source_node_id IN ({placeholders}) OR destination_node_id IN ({placeholders}))"
        );
        self.with_conn(|conn| {
            let params: Vec<&dyn rusqlite::ToSql> = std::iter::once(&now as &dyn rusqlite::ToSql)
                .chain(ids.iter().map(|s| s as &dyn rusqlite::ToSql))
                .chain(ids.iter().map(|s| s as &dyn rusqlite::ToSql))
                .collect();
            conn.execute(&sql, params.as_slice())
        })
    }
}
