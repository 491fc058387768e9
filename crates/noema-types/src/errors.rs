//! Error taxonomy shared across the workspace.
//!
//! Every error here aborts the current operation and is surfaced verbatim to
//! the caller, with two exceptions handled at their call sites:
//! `MetadataError::TableMissing` is benign during prune, and
//! `VectorEngineError::CollectionNotFound` is tolerated only for the optional
//! triplet collection. Nothing is retried automatically.

#[derive(Debug, thiserror::Error)]
pub enum GraphEngineError {
    #[error("graph engine error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum VectorEngineError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("vector engine error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// A relational table does not exist yet (fresh install).
    #[error("metadata table missing: {0}")]
    TableMissing(String),
    #[error("metadata store error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// Unknown handler key, or a handler invoked while the active
    /// configuration names a different provider. Raised before any I/O.
    #[error("unsupported dataset database provider: {0}")]
    UnsupportedProvider(String),
    /// The managed backend never reached its ready state within the poll
    /// budget. Fatal; any partially-provisioned resource is left for the
    /// operator.
    #[error("provisioning did not reach running state within {attempts} attempts ({seconds}s)")]
    ProvisioningTimeout { attempts: u32, seconds: u64 },
    /// Token exchange or credential decryption failed. Fatal; there is no
    /// fallback to plaintext or defaults.
    #[error("secret resolution failed: {0}")]
    SecretResolution(String),
    #[error("metadata: {0}")]
    Metadata(#[from] MetadataError),
    #[error("routing error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    #[error("graph: {0}")]
    Graph(#[from] GraphEngineError),
    #[error("vector: {0}")]
    Vector(#[from] VectorEngineError),
    #[error("metadata: {0}")]
    Metadata(#[from] MetadataError),
    #[error("routing: {0}")]
    Routing(#[from] RoutingError),
}
