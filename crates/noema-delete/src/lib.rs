//! Cross-store deletion.
//!
//! The deletion engine computes the uniquely-owned subset of a scope from
//! the ownership ledger, vetoes legacy content, deletes from the graph and
//! vector engines, and finally clears the scope's ownership rows. There is
//! no cross-store transaction: every step is idempotent, so re-invoking the
//! same deletion after a partial failure converges.

mod engine;
mod legacy_check;
mod prune;

pub use engine::{DeletionEngine, DeletionReport};
pub use legacy_check::LegacyChecker;
pub use noema_types::DeletionError;
pub use prune::{prune_system, PruneOptions};
