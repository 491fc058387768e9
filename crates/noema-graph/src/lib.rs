//! Graph engine implementations.

mod memory;
mod sqlite;

pub use memory::InMemoryGraphEngine;
pub use noema_types::{GraphEdgeRecord, GraphEngine, GraphEngineError, GraphNodeRecord};
pub use sqlite::SqliteGraphEngine;
