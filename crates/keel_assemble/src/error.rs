//! Error types for artifact assembly.

use std::path::PathBuf;

use keel_cache::CacheError;

/// Errors that abort an assembly. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// Writing, reading or removing a file in the output tree failed.
    #[error("cannot write {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A reachable module has no compiled output.
    #[error("module `{key}` has no compiled output")]
    MissingOutput {
        /// Key of the module.
        key: String,
    },

    /// A reachable module never compiled successfully.
    #[error("module `{key}` is not built")]
    NotReady {
        /// Key of the module.
        key: String,
    },

    /// Two outputs map to the same file.
    #[error("two outputs would be written to `{path}`")]
    Conflict {
        /// The contested path, relative to the output root.
        path: String,
    },

    /// The blob store could not serve a compiled unit.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The assembly manifest could not be serialized.
    #[error("cannot serialize assembly manifest: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },
}

impl AssemblyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssemblyError::Io {
            path: path.into(),
            source,
        }
    }
}
