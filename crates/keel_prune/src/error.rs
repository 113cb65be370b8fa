//! Error types for pruning.

use keel_graph::ModuleId;

/// Errors raised by the pruner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PruneError {
    /// No production entries were given.
    #[error("no production entries")]
    NoEntries,

    /// An entry is not a node of the graph.
    #[error("production entry {0:?} is not in the module graph")]
    UnknownEntry(ModuleId),
}
