//! Process-wide storage configuration.
//!
//! The active providers, the isolation mode, and the credential encryption
//! key are decided once at startup. Isolation must never be toggled after
//! that: ownership queries pick their anti-join scope from this value, and
//! mixing scopes mid-lifecycle corrupts the sharing invariant.

use noema_types::{OwnershipScope, RoutingError};
use std::path::PathBuf;

pub(crate) const INSECURE_DEV_ENCRYPTION_KEY: &str = "noema-insecure-dev-key";

/// Storage routing configuration, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Active graph provider: "memory", "sqlite", or "neo4j".
    pub graph_provider: String,
    /// Active vector provider: "memory", "lancedb", or "sqlite_vec".
    pub vector_provider: String,
    /// Registry key of the handler provisioning graph backends.
    pub graph_handler: String,
    /// Registry key of the handler provisioning vector backends.
    pub vector_handler: String,
    /// Root directory for embedded and managed database files.
    pub databases_root: PathBuf,
    /// Root directory of the derived on-disk cache.
    pub cache_root: PathBuf,
    /// Whether each dataset gets a dedicated backend.
    pub dataset_isolation: bool,
    /// Key material for encrypting managed-database credentials.
    pub encryption_key: String,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, RoutingError> {
        let graph_provider =
            std::env::var("NOEMA_GRAPH_PROVIDER").unwrap_or_else(|_| "sqlite".to_string());
        let vector_provider =
            std::env::var("NOEMA_VECTOR_PROVIDER").unwrap_or_else(|_| "lancedb".to_string());
        let databases_root = std::env::var("NOEMA_DATABASES_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".noema/databases"));
        let cache_root = std::env::var("NOEMA_CACHE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".noema/cache"));
        let dataset_isolation = std::env::var("NOEMA_DATASET_ISOLATION")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let encryption_key = match std::env::var("NOEMA_ENCRYPTION_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                tracing::warn!(
                    "NOEMA_ENCRYPTION_KEY is not set; falling back to the insecure built-in \
                     development key. Do not run a production deployment like this."
                );
                INSECURE_DEV_ENCRYPTION_KEY.to_string()
            }
        };

        let config = Self {
            graph_handler: default_graph_handler(&graph_provider),
            vector_handler: default_vector_handler(&vector_provider),
            graph_provider,
            vector_provider,
            databases_root,
            cache_root,
            dataset_isolation,
            encryption_key,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration for a single shared in-process store; test and dev
    /// convenience.
    pub fn shared_memory() -> Self {
        Self {
            graph_provider: "memory".to_string(),
            vector_provider: "memory".to_string(),
            graph_handler: String::new(),
            vector_handler: String::new(),
            databases_root: PathBuf::from(".noema/databases"),
            cache_root: PathBuf::from(".noema/cache"),
            dataset_isolation: false,
            encryption_key: INSECURE_DEV_ENCRYPTION_KEY.to_string(),
        }
    }

    /// Fail startup when isolation is requested but a configured provider
    /// cannot give each dataset its own backend.
    pub fn validate(&self) -> Result<(), RoutingError> {
        if self.dataset_isolation {
            for provider in [&self.graph_provider, &self.vector_provider] {
                if !provider_supports_isolation(provider) {
                    return Err(RoutingError::UnsupportedProvider(format!(
                        "provider '{provider}' does not support per-dataset isolation"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Anti-join scope for ownership queries, derived from the isolation
    /// mode. Fixed at startup.
    pub fn ownership_scope(&self) -> OwnershipScope {
        if self.dataset_isolation {
            OwnershipScope::Scoped
        } else {
            OwnershipScope::Global
        }
    }
}

fn provider_supports_isolation(provider: &str) -> bool {
    matches!(provider, "sqlite" | "neo4j" | "lancedb" | "sqlite_vec")
}

fn default_graph_handler(provider: &str) -> String {
    match provider {
        "neo4j" => "neo4j_aura".to_string(),
        _ => "sqlite_embedded".to_string(),
    }
}

fn default_vector_handler(provider: &str) -> String {
    match provider {
        "sqlite_vec" => "sqlite_vec_managed".to_string(),
        _ => "lancedb_embedded".to_string(),
    }
}
