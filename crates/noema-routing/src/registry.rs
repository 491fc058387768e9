//! Handler registry: provider key -> dataset database lifecycle.
//!
//! An explicit constructed object passed by reference, not a process-global:
//! callers that need runtime extensibility register additional handlers on
//! their own instance.

use crate::config::StorageConfig;
use crate::handlers::{
    EmbeddedGraphHandler, EmbeddedVectorHandler, ManagedCloudGraphHandler, ManagedVectorHandler,
};
use noema_types::{DatasetDatabaseHandler, RoutingError};
use std::collections::HashMap;
use std::sync::Arc;

/// A registered handler plus the provider it serves.
#[derive(Clone)]
pub struct RegisteredHandler {
    pub handler: Arc<dyn DatasetDatabaseHandler>,
    pub provider_name: String,
}

impl std::fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("provider_name", &self.provider_name)
            .finish_non_exhaustive()
    }
}

/// Registry of dataset database handlers, keyed by handler key.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, RegisteredHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the four built-in providers.
    pub fn builtin(config: &StorageConfig) -> Self {
        let mut registry = Self::new();
        registry.register(
            "sqlite_embedded",
            Arc::new(EmbeddedGraphHandler::new(config.clone())),
            "sqlite",
        );
        registry.register(
            "lancedb_embedded",
            Arc::new(EmbeddedVectorHandler::new(config.clone())),
            "lancedb",
        );
        registry.register(
            "sqlite_vec_managed",
            Arc::new(ManagedVectorHandler::new(config.clone())),
            "sqlite_vec",
        );
        registry.register(
            "neo4j_aura",
            Arc::new(ManagedCloudGraphHandler::new(config.clone())),
            "neo4j",
        );
        registry
    }

    /// Register (or replace) a handler under the given key.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        handler: Arc<dyn DatasetDatabaseHandler>,
        provider_name: impl Into<String>,
    ) {
        self.handlers.insert(
            key.into(),
            RegisteredHandler {
                handler,
                provider_name: provider_name.into(),
            },
        );
    }

    pub fn get(&self, key: &str) -> Result<&RegisteredHandler, RoutingError> {
        self.handlers
            .get(key)
            .ok_or_else(|| RoutingError::UnsupportedProvider(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
