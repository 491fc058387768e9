//! Ownership ledger: which (user, dataset, data) scope introduced each
//! node/edge, and which rows a scope uniquely owns.
//!
//! "Uniquely owned" is computed with a `NOT EXISTS` anti-join over the
//! content identity (node slug, edge triple). The scoped variants restrict
//! the anti-join to the same dataset (per-dataset physical stores); the
//! global variants check the whole ledger (one shared store for all
//! tenants). The variant in use is fixed at startup.

use crate::store::MetadataStore;
use chrono::{DateTime, Utc};
use noema_types::{Edge, MetadataError, Node};
use std::collections::HashMap;
use uuid::Uuid;

const NODE_COLUMNS: &str =
    "id, slug, user_id, data_id, dataset_id, label, node_type, indexed_fields, attributes, created_at";
const EDGE_COLUMNS: &str =
    "id, user_id, data_id, dataset_id, source_node_id, destination_node_id, relationship_name, label, props";

fn node_from_row(row: &rusqlite::Row) -> Result<Node, rusqlite::Error> {
    let indexed_fields: Vec<String> =
        serde_json::from_str(&row.get::<_, String>(7)?).unwrap_or_default();
    let attributes: HashMap<String, serde_json::Value> =
        serde_json::from_str(&row.get::<_, String>(8)?).unwrap_or_default();
    let created_at = DateTime::parse_from_rfc3339(&row.get::<_, String>(9)?)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    Ok(Node {
        id: MetadataStore::parse_uuid(&row.get::<_, String>(0)?)?,
        slug: MetadataStore::parse_uuid(&row.get::<_, String>(1)?)?,
        user_id: MetadataStore::parse_uuid(&row.get::<_, String>(2)?)?,
        data_id: MetadataStore::parse_uuid(&row.get::<_, String>(3)?)?,
        dataset_id: MetadataStore::parse_uuid(&row.get::<_, String>(4)?)?,
        label: row.get(5)?,
        node_type: row.get(6)?,
        indexed_fields,
        attributes,
        created_at,
    })
}

fn edge_from_row(row: &rusqlite::Row) -> Result<Edge, rusqlite::Error> {
    let props: HashMap<String, serde_json::Value> =
        serde_json::from_str(&row.get::<_, String>(8)?).unwrap_or_default();
    Ok(Edge {
        id: MetadataStore::parse_uuid(&row.get::<_, String>(0)?)?,
        user_id: MetadataStore::parse_uuid(&row.get::<_, String>(1)?)?,
        data_id: MetadataStore::parse_uuid(&row.get::<_, String>(2)?)?,
        dataset_id: MetadataStore::parse_uuid(&row.get::<_, String>(3)?)?,
        source_node_id: MetadataStore::parse_uuid(&row.get::<_, String>(4)?)?,
        destination_node_id: MetadataStore::parse_uuid(&row.get::<_, String>(5)?)?,
        relationship_name: row.get(6)?,
        label: row.get(7)?,
        props,
    })
}

impl MetadataStore {
    /// Insert-or-ignore keyed by the deterministic id: re-ingesting content
    /// already owned by the scope is silently skipped. Returns the number of
    /// rows actually inserted.
    pub async fn upsert_nodes(&self, nodes: &[Node]) -> Result<usize, MetadataError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut inserted = 0;
            for node in nodes {
                let indexed_fields = serde_json::to_string(&node.indexed_fields)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                let attributes = serde_json::to_string(&node.attributes)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                inserted += tx.execute(
                    "INSERT OR IGNORE INTO nodes (id, slug, user_id, data_id, dataset_id, label, node_type, indexed_fields, attributes, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    rusqlite::params![
                        node.id.to_string(),
                        node.slug.to_string(),
                        node.user_id.to_string(),
                        node.data_id.to_string(),
                        node.dataset_id.to_string(),
                        node.label,
                        node.node_type,
                        indexed_fields,
                        attributes,
                        node.created_at.to_rfc3339(),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    /// Insert-or-ignore for edges; see `upsert_nodes`.
    pub async fn upsert_edges(&self, edges: &[Edge]) -> Result<usize, MetadataError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let mut inserted = 0;
            for edge in edges {
                let props = serde_json::to_string(&edge.props)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                inserted += tx.execute(
                    "INSERT OR IGNORE INTO edges (id, user_id, data_id, dataset_id, source_node_id, destination_node_id, relationship_name, label, props) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        edge.id.to_string(),
                        edge.user_id.to_string(),
                        edge.data_id.to_string(),
                        edge.dataset_id.to_string(),
                        edge.source_node_id.to_string(),
                        edge.destination_node_id.to_string(),
                        edge.relationship_name,
                        edge.label,
                        props,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(inserted)
        })
    }

    /// Nodes uniquely owned by (dataset, data): no other data item in the
    /// same dataset holds the slug.
    pub async fn nodes_related_to_data(
        &self,
        dataset_id: Uuid,
        data_id: Uuid,
    ) -> Result<Vec<Node>, MetadataError> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes n \
             WHERE n.dataset_id = ?1 AND n.data_id = ?2 \
               AND NOT EXISTS (SELECT 1 FROM nodes o \
                   WHERE o.slug = n.slug AND o.dataset_id = ?1 AND o.data_id <> ?2)"
        );
        self.query_nodes(&sql, &[dataset_id, data_id]).await
    }

    /// Global variant of `nodes_related_to_data`: the slug must not occur
    /// anywhere else in the ledger, across all datasets.
    pub async fn nodes_related_to_data_global(
        &self,
        dataset_id: Uuid,
        data_id: Uuid,
    ) -> Result<Vec<Node>, MetadataError> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes n \
             WHERE n.dataset_id = ?1 AND n.data_id = ?2 \
               AND NOT EXISTS (SELECT 1 FROM nodes o \
                   WHERE o.slug = n.slug AND (o.dataset_id <> ?1 OR o.data_id <> ?2))"
        );
        self.query_nodes(&sql, &[dataset_id, data_id]).await
    }

    /// Nodes owned by the dataset. With a dedicated per-dataset store the
    /// whole dataset is the unique-ownership scope, so every row qualifies.
    pub async fn nodes_related_to_dataset(
        &self,
        dataset_id: Uuid,
    ) -> Result<Vec<Node>, MetadataError> {
        let sql = format!("SELECT {NODE_COLUMNS} FROM nodes n WHERE n.dataset_id = ?1");
        self.query_nodes(&sql, &[dataset_id]).await
    }

    /// Global variant of `nodes_related_to_dataset`: the slug must not occur
    /// in any other dataset.
    pub async fn nodes_related_to_dataset_global(
        &self,
        dataset_id: Uuid,
    ) -> Result<Vec<Node>, MetadataError> {
        let sql = format!(
            "SELECT {NODE_COLUMNS} FROM nodes n \
             WHERE n.dataset_id = ?1 \
               AND NOT EXISTS (SELECT 1 FROM nodes o \
                   WHERE o.slug = n.slug AND o.dataset_id <> ?1)"
        );
        self.query_nodes(&sql, &[dataset_id]).await
    }

    /// Edges uniquely owned by (dataset, data); identity is the full
    /// (source, relationship, destination) triple.
    pub async fn edges_related_to_data(
        &self,
        dataset_id: Uuid,
        data_id: Uuid,
    ) -> Result<Vec<Edge>, MetadataError> {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM edges e \
             WHERE e.dataset_id = ?1 AND e.data_id = ?2 \
               AND NOT EXISTS (SELECT 1 FROM edges o \
                   WHERE o.source_node_id = e.source_node_id \
                     AND o.destination_node_id = e.destination_node_id \
                     AND o.relationship_name = e.relationship_name \
                     AND o.dataset_id = ?1 AND o.data_id <> ?2)"
        );
        self.query_edges(&sql, &[dataset_id, data_id]).await
    }

    pub async fn edges_related_to_data_global(
        &self,
        dataset_id: Uuid,
        data_id: Uuid,
    ) -> Result<Vec<Edge>, MetadataError> {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM edges e \
             WHERE e.dataset_id = ?1 AND e.data_id = ?2 \
               AND NOT EXISTS (SELECT 1 FROM edges o \
                   WHERE o.source_node_id = e.source_node_id \
                     AND o.destination_node_id = e.destination_node_id \
                     AND o.relationship_name = e.relationship_name \
                     AND (o.dataset_id <> ?1 OR o.data_id <> ?2))"
        );
        self.query_edges(&sql, &[dataset_id, data_id]).await
    }

    pub async fn edges_related_to_dataset(
        &self,
        dataset_id: Uuid,
    ) -> Result<Vec<Edge>, MetadataError> {
        let sql = format!("SELECT {EDGE_COLUMNS} FROM edges e WHERE e.dataset_id = ?1");
        self.query_edges(&sql, &[dataset_id]).await
    }

    pub async fn edges_related_to_dataset_global(
        &self,
        dataset_id: Uuid,
    ) -> Result<Vec<Edge>, MetadataError> {
        let sql = format!(
            "SELECT {EDGE_COLUMNS} FROM edges e \
             WHERE e.dataset_id = ?1 \
               AND NOT EXISTS (SELECT 1 FROM edges o \
                   WHERE o.source_node_id = e.source_node_id \
                     AND o.destination_node_id = e.destination_node_id \
                     AND o.relationship_name = e.relationship_name \
                     AND o.dataset_id <> ?1)"
        );
        self.query_edges(&sql, &[dataset_id]).await
    }

    /// Cheap existence check used to short-circuit the deletion path before
    /// running the anti-join queries.
    pub async fn has_related_to_data(
        &self,
        dataset_id: Uuid,
        data_id: Uuid,
    ) -> Result<bool, MetadataError> {
        let dataset = dataset_id.to_string();
        let data = data_id.to_string();
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 WHERE EXISTS (SELECT 1 FROM nodes WHERE dataset_id = ?1 AND data_id = ?2) \
                        OR EXISTS (SELECT 1 FROM edges WHERE dataset_id = ?1 AND data_id = ?2)",
                    rusqlite::params![dataset, data],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            Ok(found.is_some())
        })
    }

    /// Unconditionally delete every ownership row for the (dataset, data)
    /// scope. Returns (nodes, edges) counts.
    pub async fn delete_rows_for_data(
        &self,
        dataset_id: Uuid,
        data_id: Uuid,
    ) -> Result<(usize, usize), MetadataError> {
        let dataset = dataset_id.to_string();
        let data = data_id.to_string();
        self.with_conn(|conn| {
            let nodes = conn.execute(
                "DELETE FROM nodes WHERE dataset_id = ?1 AND data_id = ?2",
                rusqlite::params![dataset, data],
            )?;
            let edges = conn.execute(
                "DELETE FROM edges WHERE dataset_id = ?1 AND data_id = ?2",
                rusqlite::params![dataset, data],
            )?;
            Ok((nodes, edges))
        })
    }

    /// Unconditionally delete every ownership row for the dataset.
    pub async fn delete_rows_for_dataset(
        &self,
        dataset_id: Uuid,
    ) -> Result<(usize, usize), MetadataError> {
        let dataset = dataset_id.to_string();
        self.with_conn(|conn| {
            let nodes = conn.execute(
                "DELETE FROM nodes WHERE dataset_id = ?1",
                rusqlite::params![dataset],
            )?;
            let edges = conn.execute(
                "DELETE FROM edges WHERE dataset_id = ?1",
                rusqlite::params![dataset],
            )?;
            Ok((nodes, edges))
        })
    }

    /// Remaining (nodes, edges) row counts for a (dataset, data) scope.
    pub async fn count_rows_for_data(
        &self,
        dataset_id: Uuid,
        data_id: Uuid,
    ) -> Result<(usize, usize), MetadataError> {
        let dataset = dataset_id.to_string();
        let data = data_id.to_string();
        self.with_conn(|conn| {
            let nodes: i64 = conn.query_row(
                "SELECT COUNT(*) FROM nodes WHERE dataset_id = ?1 AND data_id = ?2",
                rusqlite::params![dataset, data],
                |row| row.get(0),
            )?;
            let edges: i64 = conn.query_row(
                "SELECT COUNT(*) FROM edges WHERE dataset_id = ?1 AND data_id = ?2",
                rusqlite::params![dataset, data],
                |row| row.get(0),
            )?;
            Ok((nodes as usize, edges as usize))
        })
    }

    /// Remaining (nodes, edges) row counts for a dataset.
    pub async fn count_rows_for_dataset(
        &self,
        dataset_id: Uuid,
    ) -> Result<(usize, usize), MetadataError> {
        let dataset = dataset_id.to_string();
        self.with_conn(|conn| {
            let nodes: i64 = conn.query_row(
                "SELECT COUNT(*) FROM nodes WHERE dataset_id = ?1",
                rusqlite::params![dataset],
                |row| row.get(0),
            )?;
            let edges: i64 = conn.query_row(
                "SELECT COUNT(*) FROM edges WHERE dataset_id = ?1",
                rusqlite::params![dataset],
                |row| row.get(0),
            )?;
            Ok((nodes as usize, edges as usize))
        })
    }

    async fn query_nodes(&self, sql: &str, params: &[Uuid]) -> Result<Vec<Node>, MetadataError> {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        let sql = sql.to_string();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(params.iter()),
                node_from_row,
            )?;
            rows.collect()
        })
    }

    async fn query_edges(&self, sql: &str, params: &[Uuid]) -> Result<Vec<Edge>, MetadataError> {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        let sql = sql.to_string();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(params.iter()),
                edge_from_row,
            )?;
            rows.collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noema_types::node_slug;

    fn node(user: Uuid, dataset: Uuid, data: Uuid, name: &str) -> Node {
        Node::new(
            user,
            dataset,
            data,
            node_slug(name),
            name,
            "Entity",
            vec!["name".to_string()],
        )
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = MetadataStore::in_memory().unwrap();
        let (user, dataset, data) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let n = node(user, dataset, data, "apple");

        assert_eq!(store.upsert_nodes(&[n.clone()]).await.unwrap(), 1);
        assert_eq!(store.upsert_nodes(&[n]).await.unwrap(), 0);

        let (nodes, _) = store.count_rows_for_data(dataset, data).await.unwrap();
        assert_eq!(nodes, 1);
    }

    #[tokio::test]
    async fn shared_slug_is_excluded_from_both_data_scopes() {
        let store = MetadataStore::in_memory().unwrap();
        let user = Uuid::new_v4();
        let dataset = Uuid::new_v4();
        let data_a = Uuid::new_v4();
        let data_b = Uuid::new_v4();

        // "apple" is shared by both data items; "pear" is unique to A.
        store
            .upsert_nodes(&[
                node(user, dataset, data_a, "apple"),
                node(user, dataset, data_b, "apple"),
                node(user, dataset, data_a, "pear"),
            ])
            .await
            .unwrap();

        let unique_a = store.nodes_related_to_data(dataset, data_a).await.unwrap();
        assert_eq!(unique_a.len(), 1);
        assert_eq!(unique_a[0].slug, node_slug("pear"));

        let unique_b = store.nodes_related_to_data(dataset, data_b).await.unwrap();
        assert!(unique_b.is_empty());
    }

    #[tokio::test]
    async fn global_anti_join_sees_other_datasets() {
        let store = MetadataStore::in_memory().unwrap();
        let user = Uuid::new_v4();
        let dataset_a = Uuid::new_v4();
        let dataset_b = Uuid::new_v4();
        let data_a = Uuid::new_v4();
        let data_b = Uuid::new_v4();

        store
            .upsert_nodes(&[
                node(user, dataset_a, data_a, "apple"),
                node(user, dataset_b, data_b, "apple"),
            ])
            .await
            .unwrap();

        // Scoped query only checks within dataset_a, so "apple" is unique there.
        let scoped = store.nodes_related_to_data(dataset_a, data_a).await.unwrap();
        assert_eq!(scoped.len(), 1);

        // Global query sees the copy in dataset_b.
        let global = store
            .nodes_related_to_data_global(dataset_a, data_a)
            .await
            .unwrap();
        assert!(global.is_empty());

        let global_dataset = store
            .nodes_related_to_dataset_global(dataset_a)
            .await
            .unwrap();
        assert!(global_dataset.is_empty());

        // Scoped dataset query returns the whole dataset.
        let scoped_dataset = store.nodes_related_to_dataset(dataset_a).await.unwrap();
        assert_eq!(scoped_dataset.len(), 1);
    }

    #[tokio::test]
    async fn edge_uniqueness_uses_the_full_triple() {
        let store = MetadataStore::in_memory().unwrap();
        let user = Uuid::new_v4();
        let dataset = Uuid::new_v4();
        let data_a = Uuid::new_v4();
        let data_b = Uuid::new_v4();
        let (a, b) = (node_slug("a"), node_slug("b"));

        store
            .upsert_edges(&[
                Edge::new(user, dataset, data_a, a, "knows", b),
                Edge::new(user, dataset, data_b, a, "knows", b),
                Edge::new(user, dataset, data_a, a, "likes", b),
            ])
            .await
            .unwrap();

        let unique_a = store.edges_related_to_data(dataset, data_a).await.unwrap();
        assert_eq!(unique_a.len(), 1);
        assert_eq!(unique_a[0].relationship_name, "likes");
    }

    #[tokio::test]
    async fn delete_rows_for_data_is_unconditional() {
        let store = MetadataStore::in_memory().unwrap();
        let user = Uuid::new_v4();
        let dataset = Uuid::new_v4();
        let data_a = Uuid::new_v4();
        let data_b = Uuid::new_v4();

        store
            .upsert_nodes(&[
                node(user, dataset, data_a, "apple"),
                node(user, dataset, data_b, "apple"),
            ])
            .await
            .unwrap();

        // "apple" is shared, so nothing is uniquely owned -- but the scope's
        // ownership rows still disappear.
        let (nodes, _) = store.delete_rows_for_data(dataset, data_a).await.unwrap();
        assert_eq!(nodes, 1);
        let (remaining, _) = store.count_rows_for_data(dataset, data_a).await.unwrap();
        assert_eq!(remaining, 0);
        let (other, _) = store.count_rows_for_data(dataset, data_b).await.unwrap();
        assert_eq!(other, 1);
    }

    #[tokio::test]
    async fn has_related_to_data_sees_nodes_and_edges() {
        let store = MetadataStore::in_memory().unwrap();
        let user = Uuid::new_v4();
        let dataset = Uuid::new_v4();
        let data = Uuid::new_v4();

        assert!(!store.has_related_to_data(dataset, data).await.unwrap());

        store
            .upsert_edges(&[Edge::new(
                user,
                dataset,
                data,
                node_slug("a"),
                "knows",
                node_slug("b"),
            )])
            .await
            .unwrap();
        assert!(store.has_related_to_data(dataset, data).await.unwrap());
    }
}
