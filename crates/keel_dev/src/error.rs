//! Error types for development sessions.

use keel_cache::CacheError;
use keel_common::InternalError;
use keel_graph::GraphError;
use keel_prune::PruneError;

/// Errors that stop a development session.
///
/// Module-scoped failures are never reported through this type: they are
/// attached to the module's cache entry and surfaced in the pass report.
#[derive(Debug, thiserror::Error)]
pub enum DevError {
    /// The initial graph could not be built (for example, an entry does not
    /// resolve).
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The persisted cache could not be read or written.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Reachability could not be computed.
    #[error(transparent)]
    Prune(#[from] PruneError),

    /// The file watcher could not be started.
    #[error("cannot watch {path}: {reason}")]
    Watch {
        /// The directory that could not be watched.
        path: std::path::PathBuf,
        /// The backend's message.
        reason: String,
    },

    /// An engine invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}
