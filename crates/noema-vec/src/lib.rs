//! Vector engine implementations.

mod memory_vec;

#[cfg(feature = "qdrant")]
mod qdrant_vec;

pub use memory_vec::InMemoryVectorEngine;
pub use noema_types::{DataPoint, VectorEngine, VectorEngineError};
#[cfg(feature = "qdrant")]
pub use qdrant_vec::QdrantVectorEngine;
