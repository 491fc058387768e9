//! Integration tests: end-to-end deletion, idempotence, sharing invariant,
//! legacy skip, dataset deletes, prune.

use async_trait::async_trait;
use noema_delete::{prune_system, DeletionEngine, PruneOptions};
use noema_graph::InMemoryGraphEngine;
use noema_ledger::MetadataStore;
use noema_routing::{ensure_dataset_database, HandlerRegistry, StorageConfig};
use noema_types::{
    edge_type_id, node_slug, DataPoint, Edge, GraphEdgeRecord, GraphEngine, GraphEngineError,
    GraphNodeRecord, LegacyLedgerEntry, Node, OwnershipScope, User, VectorEngine,
    VectorEngineError,
};
use noema_vec::InMemoryVectorEngine;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Graph engine wrapper recording every delete call.
#[derive(Clone)]
struct RecordingGraph {
    inner: Arc<InMemoryGraphEngine>,
    deletes: Arc<Mutex<Vec<Vec<Uuid>>>>,
}

impl RecordingGraph {
    fn new() -> Self {
        Self {
            inner: Arc::new(InMemoryGraphEngine::new()),
            deletes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn delete_calls(&self) -> Vec<Vec<Uuid>> {
        self.deletes.lock().unwrap().clone()
    }

    fn deleted_slugs(&self) -> Vec<Uuid> {
        self.delete_calls().into_iter().flatten().collect()
    }
}

#[async_trait]
impl GraphEngine for RecordingGraph {
    async fn add_nodes(&self, nodes: &[GraphNodeRecord]) -> Result<(), GraphEngineError> {
        self.inner.add_nodes(nodes).await
    }

    async fn add_edges(&self, edges: &[GraphEdgeRecord]) -> Result<(), GraphEngineError> {
        self.inner.add_edges(edges).await
    }

    async fn get_nodes(&self, slugs: &[Uuid]) -> Result<Vec<GraphNodeRecord>, GraphEngineError> {
        self.inner.get_nodes(slugs).await
    }

    async fn delete_nodes(&self, slugs: &[Uuid]) -> Result<usize, GraphEngineError> {
        self.deletes.lock().unwrap().push(slugs.to_vec());
        self.inner.delete_nodes(slugs).await
    }

    async fn prune(&self) -> Result<(), GraphEngineError> {
        self.inner.prune().await
    }
}

/// Vector engine wrapper recording every delete call.
#[derive(Clone)]
struct RecordingVector {
    inner: Arc<InMemoryVectorEngine>,
    deletes: Arc<Mutex<Vec<(String, Vec<Uuid>)>>>,
}

impl RecordingVector {
    fn new() -> Self {
        Self {
            inner: Arc::new(InMemoryVectorEngine::new()),
            deletes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn delete_calls(&self) -> Vec<(String, Vec<Uuid>)> {
        self.deletes.lock().unwrap().clone()
    }

    fn deleted_ids(&self) -> Vec<Uuid> {
        self.delete_calls().into_iter().flat_map(|(_, ids)| ids).collect()
    }
}

#[async_trait]
impl VectorEngine for RecordingVector {
    async fn create_collection(&self, collection: &str) -> Result<(), VectorEngineError> {
        self.inner.create_collection(collection).await
    }

    async fn has_collection(&self, collection: &str) -> Result<bool, VectorEngineError> {
        self.inner.has_collection(collection).await
    }

    async fn index_data_points(
        &self,
        collection: &str,
        points: &[DataPoint],
    ) -> Result<(), VectorEngineError> {
        self.inner.index_data_points(collection, points).await
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<Vec<DataPoint>, VectorEngineError> {
        self.inner.retrieve(collection, ids).await
    }

    async fn delete_data_points(
        &self,
        collection: &str,
        ids: &[Uuid],
    ) -> Result<usize, VectorEngineError> {
        self.deletes
            .lock()
            .unwrap()
            .push((collection.to_string(), ids.to_vec()));
        self.inner.delete_data_points(collection, ids).await
    }

    async fn prune(&self) -> Result<(), VectorEngineError> {
        self.inner.prune().await
    }
}

fn entity(user: Uuid, dataset: Uuid, data: Uuid, name: &str) -> Node {
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

fn graph_record(node: &Node) -> GraphNodeRecord {
    GraphNodeRecord {
        slug: node.slug,
        label: node.label.clone(),
        node_type: node.node_type.clone(),
        attributes: HashMap::new(),
    }
}

/// Mirror what the ingestion pipeline would have written to the engines.
async fn seed_engines(
    graph: &RecordingGraph,
    vector: &RecordingVector,
    nodes: &[Node],
    edges: &[Edge],
    with_triplets: bool,
) {
    let records: Vec<GraphNodeRecord> = nodes.iter().map(graph_record).collect();
    graph.add_nodes(&records).await.unwrap();

    let edge_records: Vec<GraphEdgeRecord> = edges
        .iter()
        .map(|e| GraphEdgeRecord {
            source: e.source_node_id,
            destination: e.destination_node_id,
            relationship_name: e.relationship_name.clone(),
        })
        .collect();
    graph.add_edges(&edge_records).await.unwrap();

    for node in nodes {
        for collection in node.vector_collections() {
            vector
                .index_data_points(&collection, &[DataPoint::new(node.slug)])
                .await
                .unwrap();
        }
    }
    if !edges.is_empty() {
        for edge in edges {
            vector
                .index_data_points(
                    "EdgeType_relationship_name",
                    &[DataPoint::new(edge_type_id(&edge.relationship_name))],
                )
                .await
                .unwrap();
            if with_triplets {
                vector
                    .index_data_points("Triplet_text", &[DataPoint::new(edge.triplet_id())])
                    .await
                    .unwrap();
            }
        }
    }
}

struct Fixture {
    store: Arc<MetadataStore>,
    graph: RecordingGraph,
    vector: RecordingVector,
    engine: DeletionEngine<RecordingGraph, RecordingVector>,
}

fn fixture(scope: OwnershipScope) -> Fixture {
    let store = Arc::new(MetadataStore::in_memory().unwrap());
    let graph = RecordingGraph::new();
    let vector = RecordingVector::new();
    let engine = DeletionEngine::new(store.clone(), graph.clone(), vector.clone(), scope);
    Fixture {
        store,
        graph,
        vector,
        engine,
    }
}

#[tokio::test]
async fn end_to_end_data_deletion() {
    let f = fixture(OwnershipScope::Global);
    let (user, dataset, data) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let nodes = vec![
        entity(user, dataset, data, "apple"),
        entity(user, dataset, data, "pear"),
        entity(user, dataset, data, "plum"),
    ];
    let edges = vec![
        Edge::new(user, dataset, data, node_slug("apple"), "grows_near", node_slug("pear")),
        Edge::new(user, dataset, data, node_slug("pear"), "grows_near", node_slug("plum")),
    ];
    f.store.upsert_nodes(&nodes).await.unwrap();
    f.store.upsert_edges(&edges).await.unwrap();
    seed_engines(&f.graph, &f.vector, &nodes, &edges, true).await;

    let report = f.engine.delete_data(dataset, data, user).await.unwrap();
    assert_eq!(report.nodes_deleted, 3);
    assert_eq!(report.edges_deleted, 2);
    assert_eq!(report.ownership_nodes_deleted, 3);
    assert_eq!(report.ownership_edges_deleted, 2);

    // Zero remaining ownership rows for the scope.
    assert_eq!(f.store.count_rows_for_data(dataset, data).await.unwrap(), (0, 0));

    // Exactly one graph delete call, carrying each unique slug once.
    let graph_calls = f.graph.delete_calls();
    assert_eq!(graph_calls.len(), 1);
    assert_eq!(graph_calls[0].len(), 3);
    assert_eq!(f.graph.inner.node_count().await, 0);
    assert_eq!(f.graph.inner.edge_count().await, 0);

    // Entity bucket plus the fixed edge-type and triplet collections.
    let vector_calls = f.vector.delete_calls();
    let collections: Vec<&str> = vector_calls.iter().map(|(c, _)| c.as_str()).collect();
    assert!(collections.contains(&"Entity_name"));
    assert!(collections.contains(&"EdgeType_relationship_name"));
    assert!(collections.contains(&"Triplet_text"));
    let entity_ids = &vector_calls
        .iter()
        .find(|(c, _)| c == "Entity_name")
        .unwrap()
        .1;
    assert_eq!(entity_ids.len(), 3);
    // Both edges share one relationship name, so its edge-type point is
    // deleted exactly once.
    let edge_type_ids = &vector_calls
        .iter()
        .find(|(c, _)| c == "EdgeType_relationship_name")
        .unwrap()
        .1;
    assert_eq!(edge_type_ids.len(), 1);
    assert!(f
        .vector
        .retrieve("Entity_name", &[node_slug("apple")])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn second_delete_is_a_noop() {
    let f = fixture(OwnershipScope::Global);
    let (user, dataset, data) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let nodes = vec![entity(user, dataset, data, "apple")];
    f.store.upsert_nodes(&nodes).await.unwrap();
    seed_engines(&f.graph, &f.vector, &nodes, &[], false).await;

    f.engine.delete_data(dataset, data, user).await.unwrap();
    let calls_after_first = f.graph.delete_calls().len();

    let report = f.engine.delete_data(dataset, data, user).await.unwrap();
    assert_eq!(report.nodes_deleted, 0);
    assert_eq!(report.ownership_nodes_deleted, 0);
    // No further engine traffic at all.
    assert_eq!(f.graph.delete_calls().len(), calls_after_first);
}

#[tokio::test]
async fn shared_content_survives_until_its_last_owner_is_deleted() {
    let f = fixture(OwnershipScope::Global);
    let user = Uuid::new_v4();
    let dataset = Uuid::new_v4();
    let (data_a, data_b) = (Uuid::new_v4(), Uuid::new_v4());

    // "apple" is ingested by both data items; "pear" only by A.
    let nodes_a = vec![
        entity(user, dataset, data_a, "apple"),
        entity(user, dataset, data_a, "pear"),
    ];
    let nodes_b = vec![entity(user, dataset, data_b, "apple")];
    f.store.upsert_nodes(&nodes_a).await.unwrap();
    f.store.upsert_nodes(&nodes_b).await.unwrap();
    seed_engines(&f.graph, &f.vector, &nodes_a, &[], false).await;

    let report = f.engine.delete_data(dataset, data_a, user).await.unwrap();
    assert_eq!(report.nodes_deleted, 1);
    assert!(!f.graph.deleted_slugs().contains(&node_slug("apple")));
    // The shared record is still physically present.
    assert_eq!(f.graph.inner.node_count().await, 1);

    // B is now the sole owner, so deleting B removes "apple" for real.
    let report = f.engine.delete_data(dataset, data_b, user).await.unwrap();
    assert_eq!(report.nodes_deleted, 1);
    assert!(f.graph.deleted_slugs().contains(&node_slug("apple")));
    assert_eq!(f.graph.inner.node_count().await, 0);
}

#[tokio::test]
async fn legacy_content_is_never_physically_deleted() {
    let f = fixture(OwnershipScope::Global);
    let (user, dataset, data) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    // "vintage" is tracked by the ownership ledger but also has an undeleted
    // legacy entry; "fresh" is ordinary tracked content. "orphan" exists
    // only in the legacy ledger and the engines.
    let nodes = vec![
        entity(user, dataset, data, "vintage"),
        entity(user, dataset, data, "fresh"),
    ];
    f.store.upsert_nodes(&nodes).await.unwrap();
    f.store
        .record_legacy_entries(&[
            LegacyLedgerEntry::node(node_slug("vintage"), "vintage", "add_nodes_batch", user),
            LegacyLedgerEntry::node(node_slug("orphan"), "orphan", "add_nodes_batch", user),
        ])
        .await
        .unwrap();
    let mut seeded = nodes.clone();
    seeded.push(entity(user, dataset, Uuid::new_v4(), "orphan"));
    seed_engines(&f.graph, &f.vector, &seeded, &[], false).await;

    let report = f.engine.delete_data(dataset, data, user).await.unwrap();
    assert_eq!(report.legacy_nodes_skipped, 1);
    assert_eq!(report.nodes_deleted, 1);
    // Ownership rows disappear for legacy and non-legacy alike.
    assert_eq!(report.ownership_nodes_deleted, 2);

    // Neither the legacy slug nor the ledger-only orphan ever reached the
    // engines.
    let deleted = f.graph.deleted_slugs();
    assert!(deleted.contains(&node_slug("fresh")));
    assert!(!deleted.contains(&node_slug("vintage")));
    assert!(!deleted.contains(&node_slug("orphan")));
    assert!(!f.vector.deleted_ids().contains(&node_slug("vintage")));
    assert!(!f.vector.deleted_ids().contains(&node_slug("orphan")));

    // The vetoing ledger entries are untouched; only entries for actually
    // deleted content would have been soft-marked.
    let still_legacy = f
        .store
        .undeleted_legacy_node_slugs(&[node_slug("vintage"), node_slug("orphan")])
        .await
        .unwrap();
    assert_eq!(still_legacy.len(), 2);
}

#[tokio::test]
async fn deleting_data_soft_marks_legacy_entries_of_deleted_slugs() {
    let f = fixture(OwnershipScope::Scoped);
    let (user, dataset, data) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    // A stale ledger entry: flagged legacy, but the node no longer exists in
    // the graph engine, so under isolation the veto is dropped.
    let nodes = vec![entity(user, dataset, data, "stale")];
    f.store.upsert_nodes(&nodes).await.unwrap();
    f.store
        .record_legacy_entries(&[LegacyLedgerEntry::node(
            node_slug("stale"),
            "stale",
            "add_nodes_batch",
            user,
        )])
        .await
        .unwrap();
    f.vector
        .index_data_points("Entity_name", &[DataPoint::new(node_slug("stale"))])
        .await
        .unwrap();

    let report = f.engine.delete_data(dataset, data, user).await.unwrap();
    assert_eq!(report.legacy_nodes_skipped, 0);

    // The stale ledger entry got soft-marked, so it can never veto again.
    let still_legacy = f
        .store
        .undeleted_legacy_node_slugs(&[node_slug("stale")])
        .await
        .unwrap();
    assert!(still_legacy.is_empty());
}

#[tokio::test]
async fn missing_triplet_collection_is_tolerated() {
    let f = fixture(OwnershipScope::Global);
    let (user, dataset, data) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let nodes = vec![
        entity(user, dataset, data, "apple"),
        entity(user, dataset, data, "pear"),
    ];
    let edges = vec![Edge::new(
        user,
        dataset,
        data,
        node_slug("apple"),
        "grows_near",
        node_slug("pear"),
    )];
    f.store.upsert_nodes(&nodes).await.unwrap();
    f.store.upsert_edges(&edges).await.unwrap();
    // No Triplet_text collection seeded.
    seed_engines(&f.graph, &f.vector, &nodes, &edges, false).await;

    let report = f.engine.delete_data(dataset, data, user).await.unwrap();
    assert_eq!(report.edges_deleted, 1);
}

#[tokio::test]
async fn dataset_delete_always_clears_ownership_rows() {
    let f = fixture(OwnershipScope::Global);
    let user = Uuid::new_v4();
    let (dataset_a, dataset_b) = (Uuid::new_v4(), Uuid::new_v4());
    let (data_a, data_b) = (Uuid::new_v4(), Uuid::new_v4());

    // Every node of dataset A is shared with dataset B: nothing is uniquely
    // owned, yet A's ownership rows must still disappear.
    let nodes_a = vec![entity(user, dataset_a, data_a, "apple")];
    let nodes_b = vec![entity(user, dataset_b, data_b, "apple")];
    f.store.upsert_nodes(&nodes_a).await.unwrap();
    f.store.upsert_nodes(&nodes_b).await.unwrap();
    seed_engines(&f.graph, &f.vector, &nodes_a, &[], false).await;

    let report = f.engine.delete_dataset(dataset_a, user).await.unwrap();
    assert_eq!(report.nodes_deleted, 0);
    assert_eq!(report.ownership_nodes_deleted, 1);
    assert!(f.graph.delete_calls().is_empty());

    assert_eq!(f.store.count_rows_for_dataset(dataset_a).await.unwrap(), (0, 0));
    assert_eq!(f.store.count_rows_for_dataset(dataset_b).await.unwrap(), (1, 0));
    // The shared record is still physically present for dataset B.
    assert_eq!(f.graph.inner.node_count().await, 1);
}

#[tokio::test]
async fn dataset_delete_in_scoped_mode_takes_the_whole_dataset() {
    let f = fixture(OwnershipScope::Scoped);
    let user = Uuid::new_v4();
    let dataset = Uuid::new_v4();
    let (data_a, data_b) = (Uuid::new_v4(), Uuid::new_v4());

    // "apple" is shared between two data items of the same dataset; a
    // dataset-scoped delete still owns it.
    let nodes = vec![
        entity(user, dataset, data_a, "apple"),
        entity(user, dataset, data_b, "apple"),
        entity(user, dataset, data_b, "pear"),
    ];
    f.store.upsert_nodes(&nodes).await.unwrap();
    seed_engines(&f.graph, &f.vector, &nodes, &[], false).await;

    let report = f.engine.delete_dataset(dataset, user).await.unwrap();
    assert_eq!(report.nodes_deleted, 2);
    assert_eq!(report.ownership_nodes_deleted, 3);
    assert_eq!(f.graph.inner.node_count().await, 0);
}

#[tokio::test]
async fn prune_on_fresh_install_completes() {
    // Fresh install: no tables at all, isolation enabled.
    let store = MetadataStore::in_memory_without_schema().unwrap();
    let mut config = StorageConfig::shared_memory();
    config.graph_provider = "sqlite".to_string();
    config.vector_provider = "lancedb".to_string();
    config.dataset_isolation = true;
    let registry = HandlerRegistry::builtin(&config);
    let graph = InMemoryGraphEngine::new();
    let vector = InMemoryVectorEngine::new();

    prune_system(
        &store,
        &registry,
        &config,
        &graph,
        &vector,
        PruneOptions {
            graph: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn prune_shared_store_wipes_engines_and_metadata() {
    let store = MetadataStore::in_memory().unwrap();
    let config = StorageConfig::shared_memory();
    let registry = HandlerRegistry::builtin(&config);
    let graph = InMemoryGraphEngine::new();
    let vector = InMemoryVectorEngine::new();

    graph
        .add_nodes(&[GraphNodeRecord {
            slug: node_slug("apple"),
            label: "apple".to_string(),
            node_type: "Entity".to_string(),
            attributes: HashMap::new(),
        }])
        .await
        .unwrap();
    vector.create_collection("Entity_name").await.unwrap();

    prune_system(&store, &registry, &config, &graph, &vector, PruneOptions::everything())
        .await
        .unwrap();

    assert_eq!(graph.node_count().await, 0);
    assert!(vector.collection_names().await.is_empty());
    // Relational tables are gone.
    assert!(store.all_dataset_databases().await.is_err());
}

#[tokio::test]
async fn prune_with_isolation_tears_down_every_dataset_backend() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StorageConfig::shared_memory();
    config.graph_provider = "sqlite".to_string();
    config.vector_provider = "lancedb".to_string();
    config.graph_handler = "sqlite_embedded".to_string();
    config.vector_handler = "lancedb_embedded".to_string();
    config.dataset_isolation = true;
    config.databases_root = dir.path().to_path_buf();
    config.cache_root = dir.path().join("cache");
    let registry = HandlerRegistry::builtin(&config);
    let store = MetadataStore::in_memory().unwrap();
    let user = User::new(Uuid::new_v4());

    let row_a = ensure_dataset_database(&store, &registry, &config, Uuid::new_v4(), &user)
        .await
        .unwrap();
    let row_b = ensure_dataset_database(&store, &registry, &config, Uuid::new_v4(), &user)
        .await
        .unwrap();
    std::fs::create_dir_all(&config.cache_root).unwrap();

    let graph = InMemoryGraphEngine::new();
    let vector = InMemoryVectorEngine::new();
    prune_system(&store, &registry, &config, &graph, &vector, PruneOptions::everything())
        .await
        .unwrap();

    for row in [row_a, row_b] {
        assert!(!std::path::Path::new(&row.vector_database_url).exists());
        assert!(!std::path::Path::new(&row.graph_database_url).exists());
    }
    assert!(!config.cache_root.exists());
}
