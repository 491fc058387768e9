//! Dataset database routing.
//!
//! A dataset is routed to its graph and vector backends through a
//! provider-keyed handler registry. Handlers own the backend lifecycle
//! (create, resolve credentials, delete); the directory module persists the
//! resulting connection descriptors, one row per dataset.

pub mod crypto;
mod config;
mod directory;
mod handlers;
mod registry;

pub use config::StorageConfig;
pub use directory::{ensure_dataset_database, resolve_dataset_database, teardown_dataset_database};
pub use handlers::{
    EmbeddedGraphHandler, EmbeddedVectorHandler, ManagedCloudGraphHandler, ManagedVectorHandler,
};
pub use noema_types::{ConnectionDescriptor, DatasetDatabase, DatasetDatabaseHandler, RoutingError};
pub use registry::{HandlerRegistry, RegisteredHandler};
