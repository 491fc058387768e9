//! Deterministic id derivation.
//!
//! All content-addressed ids are UUIDv5 over `NAMESPACE_OID`, so the same
//! input always maps to the same id regardless of which process derived it.

use uuid::Uuid;

/// Content-addressed identity of a semantic node, stable across datasets.
/// Derived from the normalized node name; this is the key under which the
/// graph and vector engines store the physical record.
pub fn node_slug(name: &str) -> Uuid {
    let normalized = name.trim().to_lowercase();
    Uuid::new_v5(&Uuid::NAMESPACE_OID, normalized.as_bytes())
}

/// Per-scope node id. Re-ingesting identical content into the same
/// (user, dataset, data) scope derives the same id, making upserts no-ops.
pub fn node_id(user_id: Uuid, dataset_id: Uuid, data_id: Uuid, slug: Uuid) -> Uuid {
    let input = format!("{}:{}:{}:{}", user_id, dataset_id, data_id, slug);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, input.as_bytes())
}

/// Per-scope edge id, covering the full (source, relationship, destination)
/// triple within the owning scope.
pub fn edge_id(
    user_id: Uuid,
    dataset_id: Uuid,
    data_id: Uuid,
    source: Uuid,
    relationship_name: &str,
    destination: Uuid,
) -> Uuid {
    let input = format!(
        "{}:{}:{}:{}:{}:{}",
        user_id, dataset_id, data_id, source, relationship_name, destination
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, input.as_bytes())
}

/// Id of the deduplicated edge-type data point in the
/// `EdgeType_relationship_name` vector collection.
pub fn edge_type_id(relationship_name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, relationship_name.as_bytes())
}

/// Id of the derived triplet embedding in the `Triplet_text` collection.
pub fn triplet_id(source: Uuid, relationship_name: &str, destination: Uuid) -> Uuid {
    let input = format!("{}:{}:{}", source, relationship_name, destination);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, input.as_bytes())
}
