//! Built-in dataset database handlers.

mod aura;
mod embedded_graph;
mod embedded_vector;
mod managed_vector;

pub use aura::ManagedCloudGraphHandler;
pub use embedded_graph::EmbeddedGraphHandler;
pub use embedded_vector::EmbeddedVectorHandler;
pub use managed_vector::ManagedVectorHandler;
